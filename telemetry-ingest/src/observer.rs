use tracing::{debug, info, warn};

use crate::channel::ChannelState;
use crate::codec::DecodeError;
use crate::transport::TransportError;

/// Hooks for everything an ingestion channel does that someone might want to see.
///
/// Channels don't log per message or emit metrics themselves; they report to the observer
/// they were built with. Every hook defaults to a no-op.
pub trait ChannelObserver: Send + Sync + 'static {
    fn state_changed(&self, _channel: &str, _from: ChannelState, _to: ChannelState) {}

    fn connect_failed(&self, _channel: &str, _error: &TransportError) {}

    fn subscribe_failed(&self, _channel: &str, _topic: &str, _error: &TransportError) {}

    fn disconnected(&self, _channel: &str, _reason: &str) {}

    fn message_received(&self, _channel: &str, _topic: &str, _payload: &[u8]) {}

    /// A message arrived while the channel had no active subscription.
    fn message_dropped(&self, _channel: &str, _topic: &str, _state: ChannelState) {}

    fn record_stored(&self, _channel: &str, _key: &str, _store_len: usize) {}

    fn decode_failed(&self, _channel: &str, _error: &DecodeError, _payload: &[u8]) {}
}

/// Reports channel activity through `tracing` and the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ChannelObserver for TracingObserver {
    fn state_changed(&self, channel: &str, from: ChannelState, to: ChannelState) {
        info!(channel, %from, %to, "channel state changed");
    }

    fn connect_failed(&self, channel: &str, error: &TransportError) {
        warn!(channel, "failed to connect to broker: {}", error);
        metrics::counter!("telemetry_connect_failures_total", "channel" => channel.to_owned())
            .increment(1);
    }

    fn subscribe_failed(&self, channel: &str, topic: &str, error: &TransportError) {
        warn!(channel, topic, "failed to subscribe: {}", error);
        metrics::counter!("telemetry_subscribe_failures_total", "channel" => channel.to_owned())
            .increment(1);
    }

    fn disconnected(&self, channel: &str, reason: &str) {
        warn!(channel, reason, "disconnected from broker");
        metrics::counter!("telemetry_disconnects_total", "channel" => channel.to_owned())
            .increment(1);
    }

    fn message_received(&self, channel: &str, topic: &str, payload: &[u8]) {
        debug!(channel, topic, bytes = payload.len(), "message received");
        metrics::counter!("telemetry_messages_received_total", "channel" => channel.to_owned())
            .increment(1);
    }

    fn message_dropped(&self, channel: &str, topic: &str, state: ChannelState) {
        debug!(channel, topic, %state, "dropping message received while not subscribed");
    }

    fn record_stored(&self, channel: &str, key: &str, store_len: usize) {
        debug!(channel, key, store_len, "record stored");
        metrics::counter!("telemetry_records_stored_total", "channel" => channel.to_owned())
            .increment(1);
        metrics::gauge!("telemetry_store_records", "channel" => channel.to_owned())
            .set(store_len as f64);
    }

    fn decode_failed(&self, channel: &str, error: &DecodeError, payload: &[u8]) {
        warn!(
            channel,
            payload = %String::from_utf8_lossy(payload),
            "dropping undecodable message: {}",
            error
        );
        metrics::counter!("telemetry_decode_errors_total", "channel" => channel.to_owned())
            .increment(1);
    }
}
