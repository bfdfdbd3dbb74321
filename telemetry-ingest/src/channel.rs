use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::codec;
use crate::config::ChannelConfig;
use crate::observer::ChannelObserver;
use crate::record::Record;
use crate::store::MessageStore;
use crate::transport::{Transport, TransportError, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Subscribed,
    ReconnectPending,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Subscribing => "subscribing",
            ChannelState::Subscribed => "subscribed",
            ChannelState::ReconnectPending => "reconnect_pending",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes state transitions to watchers and to the observer.
struct StateReporter {
    name: String,
    tx: watch::Sender<ChannelState>,
    observer: Arc<dyn ChannelObserver>,
}

impl StateReporter {
    fn get(&self) -> ChannelState {
        *self.tx.borrow()
    }

    fn set(&self, to: ChannelState) {
        let from = self.tx.send_replace(to);
        if from != to {
            self.observer.state_changed(&self.name, from, to);
        }
    }
}

enum Slot<T> {
    Idle(T),
    Running {
        shutdown: CancellationToken,
        control: JoinHandle<T>,
    },
    /// The control task panicked and took the transport with it.
    Lost,
}

/// One MQTT subscription feeding one [`MessageStore`].
///
/// `start` spawns a control task that owns the transport and drives the connect,
/// subscribe and reconnect cycle, plus a worker task that decodes and stores payloads in
/// arrival order. `stop` shuts both down and hands the transport back so the channel can
/// be started again.
pub struct IngestionChannel<R: Record, T: Transport> {
    config: ChannelConfig,
    store: Arc<MessageStore<R>>,
    observer: Arc<dyn ChannelObserver>,
    state: Arc<StateReporter>,
    slot: Mutex<Slot<T>>,
}

impl<R: Record, T: Transport> IngestionChannel<R, T> {
    pub fn new(
        config: ChannelConfig,
        transport: T,
        store: Arc<MessageStore<R>>,
        observer: Arc<dyn ChannelObserver>,
    ) -> Self {
        let (tx, _) = watch::channel(ChannelState::Disconnected);
        let state = Arc::new(StateReporter {
            name: R::KIND.as_str().to_owned(),
            tx,
            observer: observer.clone(),
        });

        Self {
            config,
            store,
            observer,
            state,
            slot: Mutex::new(Slot::Idle(transport)),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// A receiver that sees every subsequent state change.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.tx.subscribe()
    }

    pub fn store(&self) -> Arc<MessageStore<R>> {
        self.store.clone()
    }

    /// Start the control loop. Calling this on a running channel does nothing.
    pub async fn start(&self) {
        let mut slot = self.slot.lock().await;

        *slot = match std::mem::replace(&mut *slot, Slot::Lost) {
            Slot::Idle(transport) => {
                let shutdown = CancellationToken::new();
                let control = ControlLoop::<R, T> {
                    config: self.config.clone(),
                    transport,
                    store: self.store.clone(),
                    observer: self.observer.clone(),
                    state: self.state.clone(),
                    shutdown: shutdown.clone(),
                    _record: PhantomData,
                };

                Slot::Running {
                    shutdown,
                    control: tokio::spawn(control.run()),
                }
            }
            running @ Slot::Running { .. } => running,
            Slot::Lost => {
                error!(channel = self.name(), "cannot start channel: transport was lost");
                Slot::Lost
            }
        };
    }

    /// Stop the control loop and wait for queued messages to be stored. Calling this on a
    /// stopped channel does nothing.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;

        *slot = match std::mem::replace(&mut *slot, Slot::Lost) {
            Slot::Running { shutdown, control } => {
                shutdown.cancel();
                let next = match control.await {
                    Ok(transport) => Slot::Idle(transport),
                    Err(e) => {
                        error!(channel = self.name(), "channel control task failed: {}", e);
                        Slot::Lost
                    }
                };
                self.state.set(ChannelState::Disconnected);
                next
            }
            other => other,
        };
    }
}

impl<R: Record, T: Transport> Drop for IngestionChannel<R, T> {
    fn drop(&mut self) {
        if let Slot::Running { shutdown, .. } = self.slot.get_mut() {
            shutdown.cancel();
        }
    }
}

struct ControlLoop<R, T> {
    config: ChannelConfig,
    transport: T,
    store: Arc<MessageStore<R>>,
    observer: Arc<dyn ChannelObserver>,
    state: Arc<StateReporter>,
    shutdown: CancellationToken,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, T: Transport> ControlLoop<R, T> {
    async fn run(mut self) -> T {
        let (tx, rx) = mpsc::channel(self.config.buffer_capacity());
        let worker = tokio::spawn(store_worker(
            rx,
            self.store.clone(),
            self.observer.clone(),
            self.state.name.clone(),
        ));

        let shutdown = self.shutdown.clone();
        loop {
            self.state.set(ChannelState::Connecting);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.session(&tx) => {}
            }

            self.state.set(ChannelState::ReconnectPending);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_interval()) => {}
            }
        }

        self.transport.disconnect().await;
        self.state.set(ChannelState::Disconnected);

        // Closing the queue lets the worker drain what is already buffered and exit.
        drop(tx);
        if let Err(e) = worker.await {
            error!(channel = self.state.name.as_str(), "channel worker task failed: {}", e);
        }

        self.transport
    }

    /// One connect, subscribe and receive cycle. Returns when the connection is lost or
    /// could not be established.
    async fn session(&mut self, tx: &mpsc::Sender<Bytes>) {
        let name = self.state.name.as_str();

        if let Err(e) = self.transport.connect().await {
            self.observer.connect_failed(name, &e);
            return;
        }

        self.state.set(ChannelState::Connected);
        self.state.set(ChannelState::Subscribing);

        match self.transport.subscribe(self.config.topic()).await {
            Ok(()) => self.state.set(ChannelState::Subscribed),
            Err(e @ TransportError::SubscribeRejected { .. }) => {
                self.observer.subscribe_failed(name, self.config.topic(), &e);
                self.state.set(ChannelState::Connected);
            }
            Err(e) => {
                self.observer.subscribe_failed(name, self.config.topic(), &e);
                self.observer.disconnected(name, &e.to_string());
                return;
            }
        }

        loop {
            match self.transport.next_event().await {
                TransportEvent::Message { topic, payload } => {
                    self.observer.message_received(name, &topic, &payload);

                    let state = self.state.get();
                    if state != ChannelState::Subscribed {
                        self.observer.message_dropped(name, &topic, state);
                        continue;
                    }

                    // A full queue parks the broker read loop here until the worker catches
                    // up. Nothing is dropped, and stop still wins the outer select.
                    if tx.send(payload).await.is_err() {
                        return;
                    }
                }
                TransportEvent::Disconnected { reason } => {
                    self.observer.disconnected(name, &reason);
                    return;
                }
            }
        }
    }
}

async fn store_worker<R: Record>(
    mut rx: mpsc::Receiver<Bytes>,
    store: Arc<MessageStore<R>>,
    observer: Arc<dyn ChannelObserver>,
    name: String,
) {
    while let Some(payload) = rx.recv().await {
        match codec::decode::<R>(&payload) {
            Ok(record) => {
                let key = record.key().to_owned();
                store.insert(record);
                observer.record_stored(&name, &key, store.len());
            }
            Err(e) => observer.decode_failed(&name, &e, &payload),
        }
    }
}
