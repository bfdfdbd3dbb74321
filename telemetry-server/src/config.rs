use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use thiserror::Error;

use telemetry_ingest::{ChannelConfig, ConfigError, EntityKind, Retention};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub port: u16,

    #[envconfig(default = "test.mosquitto.org")]
    pub mqtt_broker_address: String,

    #[envconfig(default = "1883")]
    pub mqtt_port: u32,

    #[envconfig(default = "telemetry-ingest")]
    pub mqtt_client_id_prefix: String,

    #[envconfig(default = "30000")]
    pub mqtt_keep_alive_ms: Millis,

    #[envconfig(default = "10000")]
    pub mqtt_connect_timeout_ms: Millis,

    #[envconfig(default = "5000")]
    pub reconnect_interval_ms: Millis,

    #[envconfig(default = "1024")]
    pub message_buffer_capacity: usize,

    /// Records kept per entity kind, 0 keeps everything.
    #[envconfig(default = "0")]
    pub store_max_records: usize,

    #[envconfig(nested = true)]
    pub topics: TopicConfig,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retention(&self) -> Retention {
        Retention::from_limit(self.store_max_records)
    }

    /// Validated connection parameters for the channel ingesting `kind`.
    pub fn channel_config(&self, kind: EntityKind) -> Result<ChannelConfig, ConfigError> {
        ChannelConfig::new(
            self.mqtt_broker_address.as_str(),
            self.mqtt_port,
            self.topics.topic(kind),
        )?
        .with_client_id_prefix(self.mqtt_client_id_prefix.as_str())
        .with_reconnect_interval(self.reconnect_interval_ms.0)
        .with_connect_timeout(self.mqtt_connect_timeout_ms.0)
        .with_keep_alive(self.mqtt_keep_alive_ms.0)?
        .with_buffer_capacity(self.message_buffer_capacity)
    }
}

#[derive(Envconfig, Clone)]
pub struct TopicConfig {
    #[envconfig(from = "MQTT_BIN_TOPIC", default = "suburb/model/igention/bins")]
    pub bin: String,

    #[envconfig(from = "MQTT_HOUSE_TOPIC", default = "suburb/model/igention/houses")]
    pub house: String,

    #[envconfig(from = "MQTT_STREET_TOPIC", default = "suburb/model/igention/streets")]
    pub street: String,

    #[envconfig(from = "MQTT_SUBURB_TOPIC", default = "suburb/model/igention/suburbs")]
    pub suburb: String,

    #[envconfig(from = "MQTT_DRIVEWAY_TOPIC", default = "suburb/model/igention/driveways")]
    pub driveway: String,
}

impl TopicConfig {
    pub fn topic(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Bin => &self.bin,
            EntityKind::House => &self.house,
            EntityKind::Street => &self.street,
            EntityKind::Suburb => &self.suburb,
            EntityKind::Driveway => &self.driveway,
        }
    }
}

/// A duration configured as a whole number of milliseconds, e.g. `RECONNECT_INTERVAL_MS=5000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Millis(pub time::Duration);

#[derive(Error, Debug, PartialEq, Eq)]
#[error("expected a whole number of milliseconds, got {0:?}")]
pub struct ParseMillisError(String);

impl FromStr for Millis {
    type Err = ParseMillisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(|ms| Millis(time::Duration::from_millis(ms)))
            .map_err(|_| ParseMillisError(s.to_owned()))
    }
}
