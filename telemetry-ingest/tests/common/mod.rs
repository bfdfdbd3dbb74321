#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use telemetry_ingest::{
    ChannelObserver, ChannelState, DecodeError, Transport, TransportError, TransportEvent,
};

pub const TOPIC: &str = "suburb/model/igention/bins";

#[derive(Default)]
struct BrokerState {
    connect_results: Mutex<VecDeque<Result<(), TransportError>>>,
    subscribe_results: Mutex<VecDeque<Result<(), TransportError>>>,
    refuse_all_connects: Mutex<bool>,
    connects: Mutex<Vec<Instant>>,
    subscriptions: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
}

/// Test side of a [`FakeTransport`]: scripts connect and subscribe outcomes, pushes
/// events and records what the channel did.
#[derive(Clone)]
pub struct FakeBroker {
    state: Arc<BrokerState>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

pub struct FakeTransport {
    state: Arc<BrokerState>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

pub fn fake_broker() -> (FakeBroker, FakeTransport) {
    let state = Arc::new(BrokerState::default());
    let (tx, rx) = mpsc::unbounded_channel();

    (
        FakeBroker {
            state: state.clone(),
            events: tx,
        },
        FakeTransport { state, events: rx },
    )
}

impl FakeBroker {
    pub fn script_connect(&self, result: Result<(), TransportError>) {
        self.state.connect_results.lock().unwrap().push_back(result);
    }

    pub fn script_subscribe(&self, result: Result<(), TransportError>) {
        self.state
            .subscribe_results
            .lock()
            .unwrap()
            .push_back(result);
    }

    pub fn refuse_all_connects(&self) {
        *self.state.refuse_all_connects.lock().unwrap() = true;
    }

    pub fn publish(&self, payload: &str) {
        self.events
            .send(TransportEvent::Message {
                topic: TOPIC.to_owned(),
                payload: Bytes::copy_from_slice(payload.as_bytes()),
            })
            .unwrap();
    }

    pub fn drop_connection(&self, reason: &str) {
        self.events
            .send(TransportEvent::Disconnected {
                reason: reason.to_owned(),
            })
            .unwrap();
    }

    pub fn connects(&self) -> Vec<Instant> {
        self.state.connects.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.state.connects.lock().unwrap().push(Instant::now());

        if *self.state.refuse_all_connects.lock().unwrap() {
            return Err(TransportError::Connect("connection refused".to_owned()));
        }

        let scripted = self.state.connect_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.state
            .subscriptions
            .lock()
            .unwrap()
            .push(topic.to_owned());

        let scripted = self.state.subscribe_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer that remembers what it was told.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(ChannelState, ChannelState)>>,
    pub decode_failures: Mutex<Vec<(DecodeError, Vec<u8>)>>,
    pub subscribe_failures: AtomicUsize,
    pub received: AtomicUsize,
    pub dropped: AtomicUsize,
    pub stored: AtomicUsize,
}

impl ChannelObserver for RecordingObserver {
    fn state_changed(&self, _channel: &str, from: ChannelState, to: ChannelState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn subscribe_failed(&self, _channel: &str, _topic: &str, _error: &TransportError) {
        self.subscribe_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn message_received(&self, _channel: &str, _topic: &str, _payload: &[u8]) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    fn message_dropped(&self, _channel: &str, _topic: &str, _state: ChannelState) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    fn record_stored(&self, _channel: &str, _key: &str, _store_len: usize) {
        self.stored.fetch_add(1, Ordering::SeqCst);
    }

    fn decode_failed(&self, _channel: &str, error: &DecodeError, payload: &[u8]) {
        self.decode_failures
            .lock()
            .unwrap()
            .push((error.clone(), payload.to_vec()));
    }
}

pub async fn wait_for_state(rx: &mut watch::Receiver<ChannelState>, state: ChannelState) {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .expect("channel state sender dropped");
}

/// Poll `check` until it holds, letting the channel tasks run in between.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

pub fn bin_payload(bin_id: &str, timestamp: &str) -> String {
    format!(
        r#"{{"bin_id": "{bin_id}", "timestamp": "{timestamp}", "status": "ok",
            "location": {{"latitude": -37.8, "longitude": 144.9}},
            "house": {{"property_id": "P-1", "address": "1 Main St",
                       "location": {{"latitude": -37.8, "longitude": 144.9}}}}}}"#
    )
}
