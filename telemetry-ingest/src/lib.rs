pub mod channel;
pub mod codec;
pub mod config;
pub mod mqtt;
pub mod observer;
pub mod query;
pub mod record;
pub mod store;
pub mod supervisor;
pub mod transport;

pub use channel::{ChannelState, IngestionChannel};
pub use codec::{decode, DecodeError};
pub use config::{ChannelConfig, ConfigError};
pub use mqtt::MqttTransport;
pub use observer::{ChannelObserver, TracingObserver};
pub use query::EntityQuery;
pub use record::{
    BinRecord, DrivewayRecord, EntityKind, HouseRecord, Record, StreetRecord, SuburbRecord,
};
pub use store::{LatestPolicy, MessageStore, Retention};
pub use supervisor::{ChannelSupervisor, HealthStatus, Lifecycle};
pub use transport::{Transport, TransportError, TransportEvent};
