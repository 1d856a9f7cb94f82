//! WebSocket push channel with fixed-delay reconnection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::channel::{Handler, PushChannel, Subscriptions};
use crate::config::PushConfig;
use crate::protocol::topics;
use crate::ConsoleError;

/// Wire frame for both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Push channel backed by a WebSocket connection.
///
/// `connect` and `disconnect` are dispatched to local subscribers as the
/// connection comes and goes. Outbound messages are refused while
/// disconnected.
pub struct WebSocketChannel {
    subscriptions: Subscriptions,
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Create the channel and start its connection task
    pub fn spawn(config: &PushConfig, cancel: CancellationToken) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let subscriptions = Subscriptions::new();
        let connected = Arc::new(AtomicBool::new(false));

        let task = ConnectionTask {
            url: config.url.clone(),
            reconnect_delay: config.reconnect_delay,
            max_attempts: config.max_reconnect_attempts,
            subscriptions: subscriptions.clone(),
            connected: Arc::clone(&connected),
        };
        tokio::spawn(task.run(outbound_rx, cancel));

        Arc::new(Self {
            subscriptions,
            outbound,
            connected,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    fn subscribe(&self, topic: &str, handler: Handler) {
        self.subscriptions.add(topic, handler);
    }

    async fn publish(&self, topic: &str, payload: Value) -> crate::Result<()> {
        if !self.is_connected() {
            tracing::warn!("Cannot publish '{}': not connected", topic);
            return Err(ConsoleError::Channel("not connected".to_string()));
        }
        let frame = serde_json::to_string(&Envelope::new(topic, payload))?;
        self.outbound
            .send(frame)
            .map_err(|_| ConsoleError::Channel("connection task stopped".to_string()))
    }
}

struct ConnectionTask {
    url: String,
    reconnect_delay: Duration,
    max_attempts: u32,
    subscriptions: Subscriptions,
    connected: Arc<AtomicBool>,
}

impl ConnectionTask {
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<String>, cancel: CancellationToken) {
        let mut failures: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            tracing::debug!("Connecting to {}", self.url);
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                attempt = connect_async(self.url.as_str()) => attempt,
            };
            match attempt {
                Ok((stream, _)) => {
                    failures = 0;
                    tracing::info!("Connected to {}", self.url);
                    self.connected.store(true, Ordering::SeqCst);
                    self.subscriptions.dispatch(topics::CONNECTED, Value::Null);

                    let (mut writer, mut reader) = stream.split();
                    let stop = loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = writer.close().await;
                                break true;
                            }
                            frame = outbound.recv() => match frame {
                                Some(text) => {
                                    if let Err(e) = writer.send(Message::Text(text)).await {
                                        tracing::warn!("Send failed: {}", e);
                                        break false;
                                    }
                                }
                                None => break true,
                            },
                            message = reader.next() => match message {
                                Some(Ok(Message::Text(text))) => self.dispatch_frame(&text),
                                Some(Ok(Message::Close(_))) | None => break false,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::warn!("Receive failed: {}", e);
                                    break false;
                                }
                            },
                        }
                    };

                    self.connected.store(false, Ordering::SeqCst);
                    self.subscriptions
                        .dispatch(topics::DISCONNECTED, Value::Null);
                    tracing::info!("Disconnected from {}", self.url);
                    if stop {
                        break;
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        "Connection attempt {}/{} to {} failed: {}",
                        failures,
                        self.max_attempts,
                        self.url,
                        e
                    );
                    if failures >= self.max_attempts {
                        tracing::error!(
                            "Giving up on {} after {} attempts",
                            self.url,
                            failures
                        );
                        break;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Push connection task stopped");
    }

    fn dispatch_frame(&self, text: &str) {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => {
                tracing::trace!("Received '{}'", envelope.event);
                self.subscriptions.dispatch(&envelope.event, envelope.data);
            }
            Err(e) => tracing::warn!("Ignoring malformed frame: {}", e),
        }
    }
}
