use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),
    #[error("timed out after {0:?} waiting for the broker")]
    Timeout(Duration),
    #[error("broker rejected subscription to {topic}")]
    SubscribeRejected { topic: String },
    #[error("not connected to a broker")]
    NotConnected,
    #[error("connection lost: {0}")]
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message { topic: String, payload: Bytes },
    Disconnected { reason: String },
}

/// The connection between an ingestion channel and its broker.
///
/// A transport is owned by exactly one channel control loop at a time, which drives it
/// through connect, subscribe and receive. After a `Disconnected` event or error the loop
/// calls `connect` again on the same transport.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish a fresh session, dropping any previous one.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Subscribe to `topic` and wait for the broker's acknowledgement.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Wait for the next inbound message or for the connection to drop.
    async fn next_event(&mut self) -> TransportEvent;

    /// Gracefully end the session. A no-op when not connected.
    async fn disconnect(&mut self);
}
