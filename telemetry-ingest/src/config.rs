use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "telemetry-ingest";

/// The MQTT keep-alive interval must be at least this long.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Errors raised while validating channel parameters. These are the only errors that reach
/// the caller constructing a channel: everything that goes wrong at runtime is absorbed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("broker address cannot be empty")]
    InvalidBrokerAddress,
    #[error("{0} is not a valid TCP port")]
    InvalidPort(u32),
    #[error("topic cannot be empty")]
    EmptyTopic,
    #[error("keep alive must be at least {min:?}, got {got:?}")]
    InvalidKeepAlive { min: Duration, got: Duration },
    #[error("message buffer capacity must be greater than zero")]
    InvalidBufferCapacity,
}

/// Connection parameters for one ingestion channel: a (broker, topic) pair plus the
/// tunables of its reconnect loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    broker_address: String,
    port: u16,
    topic: String,
    client_id_prefix: String,
    reconnect_interval: Duration,
    connect_timeout: Duration,
    keep_alive: Duration,
    buffer_capacity: usize,
}

impl ChannelConfig {
    pub fn new(
        broker_address: impl Into<String>,
        port: u32,
        topic: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let broker_address = broker_address.into();
        if broker_address.trim().is_empty() {
            return Err(ConfigError::InvalidBrokerAddress);
        }

        let port = match u16::try_from(port) {
            Ok(p) if p > 0 => p,
            _ => return Err(ConfigError::InvalidPort(port)),
        };

        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        Ok(Self {
            broker_address,
            port,
            topic,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_owned(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        })
    }

    pub fn with_client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Result<Self, ConfigError> {
        if keep_alive < MIN_KEEP_ALIVE {
            return Err(ConfigError::InvalidKeepAlive {
                min: MIN_KEEP_ALIVE,
                got: keep_alive,
            });
        }
        self.keep_alive = keep_alive;
        Ok(self)
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidBufferCapacity);
        }
        self.buffer_capacity = capacity;
        Ok(self)
    }

    pub fn broker_address(&self) -> &str {
        &self.broker_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn client_id_prefix(&self) -> &str {
        &self.client_id_prefix
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}
