//! Push channel abstraction: topic subscriptions and outbound requests

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

/// Callback invoked with the payload of every message on a topic
pub type Handler = Arc<dyn Fn(Value) + Send + Sync>;

/// A bidirectional, topic-based message channel to the backend.
///
/// Handlers are invoked synchronously in arrival order and must not block.
#[async_trait]
pub trait PushChannel: Send + Sync {
    fn subscribe(&self, topic: &str, handler: Handler);

    async fn publish(&self, topic: &str, payload: Value) -> crate::Result<()>;
}

/// Topic -> handlers registry shared by channel implementations
#[derive(Clone, Default)]
pub struct Subscriptions {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, topic: &str, handler: Handler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(handler);
    }

    /// Deliver `payload` to every handler of `topic`, returning how many ran
    pub fn dispatch(&self, topic: &str, payload: Value) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            tracing::trace!("No subscribers for '{}'", topic);
        }
        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }
}

/// In-process channel: published messages go straight to local subscribers.
///
/// Used when the live channel is disabled and to inject server messages in
/// tests via [`LoopbackChannel::deliver`].
#[derive(Clone, Default)]
pub struct LoopbackChannel {
    subscriptions: Subscriptions,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message as if the server had sent it
    pub fn deliver(&self, topic: &str, payload: Value) -> usize {
        self.subscriptions.dispatch(topic, payload)
    }
}

#[async_trait]
impl PushChannel for LoopbackChannel {
    fn subscribe(&self, topic: &str, handler: Handler) {
        self.subscriptions.add(topic, handler);
    }

    async fn publish(&self, topic: &str, payload: Value) -> crate::Result<()> {
        tracing::debug!("Loopback publish '{}'", topic);
        self.subscriptions.dispatch(topic, payload);
        Ok(())
    }
}
