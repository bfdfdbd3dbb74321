use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::channel::{ChannelState, IngestionChannel};
use crate::record::Record;
use crate::transport::Transport;

/// The part of a channel the supervisor needs, with the record and transport types erased.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&self);
    async fn stop(&self);
    fn state(&self) -> ChannelState;
}

#[async_trait]
impl<R: Record, T: Transport> Lifecycle for IngestionChannel<R, T> {
    fn name(&self) -> &str {
        IngestionChannel::name(self)
    }

    async fn start(&self) {
        IngestionChannel::start(self).await
    }

    async fn stop(&self) {
        IngestionChannel::stop(self).await
    }

    fn state(&self) -> ChannelState {
        IngestionChannel::state(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub channels: BTreeMap<String, ChannelState>,
}

/// Starts, stops and reports on a set of channels.
#[derive(Default, Clone)]
pub struct ChannelSupervisor {
    channels: Vec<Arc<dyn Lifecycle>>,
}

impl ChannelSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Arc<dyn Lifecycle>) {
        self.channels.push(channel);
    }

    pub async fn start_all(&self) {
        for channel in &self.channels {
            channel.start().await;
        }
    }

    pub async fn stop_all(&self) {
        join_all(self.channels.iter().map(|channel| channel.stop())).await;
    }

    /// Healthy once every registered channel holds an active subscription.
    pub fn health(&self) -> HealthStatus {
        let channels: BTreeMap<String, ChannelState> = self
            .channels
            .iter()
            .map(|channel| (channel.name().to_owned(), channel.state()))
            .collect();

        let healthy = !channels.is_empty()
            && channels
                .values()
                .all(|state| *state == ChannelState::Subscribed);

        HealthStatus { healthy, channels }
    }
}
