use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::record::EntityKind;
use crate::transport::{Transport, TransportError, TransportEvent};

/// Capacity of the request channel between `AsyncClient` and its event loop.
const REQUEST_CAPACITY: usize = 16;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Publishes that arrived while we were waiting for a SubAck.
    pending: VecDeque<TransportEvent>,
}

/// [`Transport`] over an MQTT 3.1.1 broker, backed by rumqttc.
///
/// rumqttc reconnects on its own when its event loop is polled after an error. We don't
/// want that: the session is dropped on the first error and only re-established by an
/// explicit `connect`, so the channel's state machine stays in charge of reconnects.
pub struct MqttTransport {
    options: MqttOptions,
    connect_timeout: Duration,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(config: &ChannelConfig, kind: EntityKind) -> Self {
        let client_id = format!(
            "{}-{}-{}",
            config.client_id_prefix(),
            kind,
            Uuid::new_v4().simple()
        );

        let mut options = MqttOptions::new(client_id, config.broker_address(), config.port());
        options
            .set_keep_alive(config.keep_alive())
            .set_clean_session(true);

        Self {
            options,
            connect_timeout: config.connect_timeout(),
            session: None,
        }
    }

    pub fn client_id(&self) -> String {
        self.options.client_id()
    }

    async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(TransportError::Connect(format!(
                            "broker refused connection: {code:?}"
                        ))),
                    };
                }
                Ok(event) => debug!("ignoring {:?} before ConnAck", event),
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }

    async fn await_suback(session: &mut Session, topic: &str) -> Result<(), TransportError> {
        loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure));

                    return if rejected {
                        Err(TransportError::SubscribeRejected {
                            topic: topic.to_owned(),
                        })
                    } else {
                        Ok(())
                    };
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    session.pending.push_back(TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return Err(TransportError::Disconnected(
                        "broker sent disconnect".to_owned(),
                    ));
                }
                Ok(_) => {}
                Err(e) => return Err(TransportError::Disconnected(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.session = None;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);

        match timeout(self.connect_timeout, Self::await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {
                self.session = Some(Session {
                    client,
                    eventloop,
                    pending: VecDeque::new(),
                });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Timeout(self.connect_timeout)),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let Some(session) = self.session.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        if let Err(e) = session.client.subscribe(topic, QoS::AtLeastOnce).await {
            self.session = None;
            return Err(TransportError::Disconnected(e.to_string()));
        }

        let result = match timeout(self.connect_timeout, Self::await_suback(session, topic)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.connect_timeout)),
        };

        // A rejected subscription leaves the connection itself usable.
        if matches!(
            result,
            Err(TransportError::Disconnected(_) | TransportError::Timeout(_))
        ) {
            self.session = None;
        }

        result
    }

    async fn next_event(&mut self) -> TransportEvent {
        let Some(session) = self.session.as_mut() else {
            return TransportEvent::Disconnected {
                reason: "not connected".to_owned(),
            };
        };

        if let Some(event) = session.pending.pop_front() {
            return event;
        }

        loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.session = None;
                    return TransportEvent::Disconnected {
                        reason: "broker sent disconnect".to_owned(),
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    self.session = None;
                    return TransportEvent::Disconnected {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if session.client.disconnect().await.is_err() {
            return;
        }

        let drain = async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if timeout(DISCONNECT_TIMEOUT, drain).await.is_err() {
            debug!("timed out flushing disconnect to broker");
        }
    }
}
