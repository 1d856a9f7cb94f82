//! Engine: owns the row collections and serializes every change to them
//!
//! Push messages, operator commands, backend completions and timers all
//! arrive on one queue and are handled one at a time, so the collections
//! are only ever touched from the engine task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::BackendApi;
use crate::channel::{Handler, PushChannel};
use crate::config::{Config, TimingConfig};
use crate::model::{Action, ListContext, Row, RowKey};
use crate::protocol::{topics, PushMessage};
use crate::reorder::{plan_reorder, PriorityPlan, ReorderPolicy};
use crate::rows::RowCollection;
use crate::surface::{RenderSurface, Toast, ToastKind};
use crate::sync::{Effect, SyncEvent, Synchronizer};
use crate::timer::Scheduler;
use crate::ConsoleError;

/// An operator request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drop a batch at a new position in the batch list
    Reorder { key: RowKey, new_index: usize },
    Start(RowKey),
    Pause(RowKey),
    /// Reload a list from the backend
    Resync(ListContext),
}

/// Result of a backend request started by the engine
#[derive(Debug)]
pub enum Completion {
    Priority {
        key: RowKey,
        priority: i64,
        result: crate::Result<()>,
    },
    Lifecycle {
        key: RowKey,
        action: Action,
        result: crate::Result<()>,
    },
    Fetched {
        context: ListContext,
        result: crate::Result<Vec<Row>>,
    },
}

/// Everything the engine reacts to
#[derive(Debug)]
pub enum EngineEvent {
    Push { topic: String, payload: Value },
    Command(Command),
    Completed { request_id: u64, completion: Completion },
    ClearHighlight { context: ListContext, key: RowKey },
}

/// Cloneable sender for feeding the engine from other tasks
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    /// A handle not bound to an engine, with the receiving end of its queue
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, command: Command) -> crate::Result<()> {
        self.tx
            .send(EngineEvent::Command(command))
            .map_err(|_| ConsoleError::Channel("engine stopped".to_string()))
    }

    /// Queue a push message for the engine
    pub fn push(&self, topic: &str, payload: Value) {
        let event = EngineEvent::Push {
            topic: topic.to_string(),
            payload,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!("Dropping '{}' after engine stop", topic);
        }
    }

    /// A channel handler that forwards `topic` into the engine queue
    pub fn handler(&self, topic: &'static str) -> Handler {
        let handle = self.clone();
        Arc::new(move |payload: Value| handle.push(topic, payload))
    }
}

/// Bookkeeping for an in-flight request
#[derive(Debug, Clone, Copy)]
struct Pending {
    /// Collection epoch when the request was issued
    epoch: u64,
    /// Whether the outcome is reported to the operator
    announce: bool,
}

pub struct Engine {
    batches: RowCollection,
    deployments: RowCollection,
    synchronizer: Synchronizer,
    policy: ReorderPolicy,
    timing: TimingConfig,
    api: Arc<BackendApi>,
    surface: Arc<dyn RenderSurface>,
    channel: Arc<dyn PushChannel>,
    timers: Scheduler<EngineEvent>,
    tx: mpsc::UnboundedSender<EngineEvent>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    pending: HashMap<u64, Pending>,
    latest_priority: HashMap<RowKey, u64>,
    latest_fetch: HashMap<ListContext, u64>,
    /// A batch reload is owed once the in-flight priority updates settle
    reload_batches: bool,
    next_request_id: u64,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        config: &Config,
        api: Arc<BackendApi>,
        surface: Arc<dyn RenderSurface>,
        channel: Arc<dyn PushChannel>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            batches: RowCollection::new(),
            deployments: RowCollection::new(),
            synchronizer: Synchronizer::new(config.timing.completion_resync),
            policy: config.reorder.policy(),
            timing: config.timing,
            api,
            surface,
            channel,
            timers: Scheduler::new(tx.clone(), cancel.child_token()),
            tx,
            rx,
            pending: HashMap::new(),
            latest_priority: HashMap::new(),
            latest_fetch: HashMap::new(),
            reload_batches: false,
            next_request_id: 1,
            cancel,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }

    /// Route every inbound topic of `channel` into this engine
    pub fn subscribe(&self) {
        let handle = self.handle();
        for &topic in topics::INBOUND {
            self.channel.subscribe(topic, handle.handler(topic));
        }
    }

    pub fn rows(&self, context: ListContext) -> &RowCollection {
        match context {
            ListContext::Batches => &self.batches,
            ListContext::Deployments => &self.deployments,
        }
    }

    fn rows_mut(&mut self, context: ListContext) -> &mut RowCollection {
        match context {
            ListContext::Batches => &mut self.batches,
            ListContext::Deployments => &mut self.deployments,
        }
    }

    /// Load both lists, then process events until cancelled
    pub async fn run(mut self) {
        self.process(EngineEvent::Command(Command::Resync(ListContext::Batches)))
            .await;
        self.process(EngineEvent::Command(Command::Resync(
            ListContext::Deployments,
        )))
        .await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Engine loop cancelled");
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.process(event).await,
                    None => break,
                },
            }
        }
    }

    /// Wait for the next queued event and process it. Returns false once
    /// the engine is cancelled.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            event = self.rx.recv() => match event {
                Some(event) => {
                    self.process(event).await;
                    true
                }
                None => false,
            },
        }
    }

    pub async fn process(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Push { topic, payload } => self.on_push(&topic, payload).await,
            EngineEvent::Command(command) => self.on_command(command).await,
            EngineEvent::Completed {
                request_id,
                completion,
            } => self.on_completion(request_id, completion).await,
            EngineEvent::ClearHighlight { context, key } => {
                self.surface.set_highlight(context, &key, false).await
            }
        }
    }

    async fn on_push(&mut self, topic: &str, payload: Value) {
        let message = match PushMessage::decode(topic, payload) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::trace!("Ignoring unhandled topic '{}'", topic);
                return;
            }
            Err(e) => {
                tracing::warn!("Malformed '{}' payload: {}", topic, e);
                return;
            }
        };

        match message {
            PushMessage::Sync { context, event } => self.apply_sync(context, event).await,
            PushMessage::Stats(stats) => self.surface.update_stats(&stats).await,
            PushMessage::System(status) => self.surface.update_system_status(&status).await,
            PushMessage::ServerStatus(text) => {
                tracing::debug!("Server status: {}", text);
                if text.to_lowercase().contains("error") {
                    self.toast(ToastKind::Warning, text).await;
                }
            }
            PushMessage::Connection(connected) => {
                self.surface.set_connected(connected).await;
                if connected {
                    tracing::info!("Live updates connected");
                    for request in [
                        topics::REQUEST_STATS,
                        topics::REQUEST_SYSTEM_STATUS,
                        topics::REQUEST_DEPLOYMENTS,
                    ] {
                        if let Err(e) = self.channel.publish(request, Value::Null).await {
                            tracing::warn!("Failed to send '{}': {}", request, e);
                        }
                    }
                } else {
                    tracing::warn!("Live updates disconnected");
                }
            }
        }
    }

    async fn apply_sync(&mut self, context: ListContext, event: SyncEvent) {
        let synchronizer = self.synchronizer.clone();
        let applied = synchronizer.apply(context, event, self.rows_mut(context));
        tracing::debug!("{} sync outcome: {:?}", context, applied.outcome);
        self.render(context, applied.effects).await;
    }

    async fn render(&self, context: ListContext, effects: Vec<Effect>) {
        let rows = self.rows(context);
        for effect in effects {
            match effect {
                Effect::RowUpdated(key) | Effect::RowInserted(key) => {
                    if let (Some(index), Some(row)) = (rows.position(&key), rows.get(&key)) {
                        self.surface.upsert_row(context, index, row).await;
                    }
                }
                Effect::ListReplaced => self.surface.replace_list(context, rows.rows()).await,
                Effect::Highlight(key) => {
                    self.surface.set_highlight(context, &key, true).await;
                    self.timers.schedule(
                        self.timing.highlight,
                        EngineEvent::ClearHighlight { context, key },
                    );
                }
                Effect::Notify(toast) => self.surface.show_toast(&toast).await,
                Effect::ScheduleResync(delay) => {
                    self.timers
                        .schedule(delay, EngineEvent::Command(Command::Resync(context)));
                }
            }
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Reorder { key, new_index } => self.reorder(key, new_index).await,
            Command::Start(key) => self.lifecycle(key, Action::Start).await,
            Command::Pause(key) => self.lifecycle(key, Action::Pause).await,
            Command::Resync(context) => self.resync(context),
        }
    }

    /// Apply a drop locally, then persist every changed priority
    async fn reorder(&mut self, key: RowKey, new_index: usize) {
        let plan = match plan_reorder(self.batches.rows(), &key, new_index, self.policy) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Rejected reorder of '{}': {}", key, e);
                self.toast(ToastKind::Warning, format!("Cannot move batch: {}", e))
                    .await;
                return;
            }
        };

        // a reload issued before this drop would answer with the old order
        if self.latest_fetch.remove(&ListContext::Batches).is_some() {
            tracing::debug!("Dropping batch reload overtaken by a local move");
            self.reload_batches = true;
        }

        match &plan {
            PriorityPlan::Insert { key, priority } => {
                self.batches.move_to(key, new_index, *priority);
            }
            PriorityPlan::Renumber { assignments, .. } => {
                tracing::info!("Renumbering {} batch priorities", assignments.len());
                self.batches.apply_priorities(assignments);
            }
        }
        self.surface
            .replace_list(ListContext::Batches, self.batches.rows())
            .await;

        let epoch = self.batches.epoch();
        for (row_key, priority) in plan.assignments() {
            let request_id = self.track(Pending {
                epoch,
                announce: &row_key == plan.moved_key(),
            });
            self.latest_priority.insert(row_key.clone(), request_id);
            let api = Arc::clone(&self.api);
            self.spawn_request(request_id, async move {
                let result = api.update_priority(&row_key, priority).await;
                Completion::Priority {
                    key: row_key,
                    priority,
                    result,
                }
            });
        }
    }

    async fn lifecycle(&mut self, key: RowKey, action: Action) {
        let Some(row) = self.batches.get(&key) else {
            self.toast(ToastKind::Warning, format!("Batch #{} is not listed", key))
                .await;
            return;
        };
        if !row.status.permits(action) {
            let message = format!("Batch #{} cannot {} while {}", key, action, row.status);
            self.toast(ToastKind::Warning, message).await;
            return;
        }

        let request_id = self.track(Pending {
            epoch: self.batches.epoch(),
            announce: true,
        });
        let api = Arc::clone(&self.api);
        self.spawn_request(request_id, async move {
            let result = api.perform(action, &key).await;
            Completion::Lifecycle {
                key,
                action,
                result,
            }
        });
    }

    fn resync(&mut self, context: ListContext) {
        if context == ListContext::Batches && !self.latest_priority.is_empty() {
            tracing::debug!(
                "Deferring batch reload until {} priority updates settle",
                self.latest_priority.len()
            );
            self.reload_batches = true;
            return;
        }
        let request_id = self.track(Pending {
            epoch: self.rows(context).epoch(),
            announce: false,
        });
        self.latest_fetch.insert(context, request_id);
        let api = Arc::clone(&self.api);
        self.spawn_request(request_id, async move {
            let result = match context {
                ListContext::Batches => api.list_batches().await,
                ListContext::Deployments => api.list_deployments().await,
            };
            Completion::Fetched { context, result }
        });
    }

    async fn on_completion(&mut self, request_id: u64, completion: Completion) {
        let Some(pending) = self.pending.remove(&request_id) else {
            tracing::warn!("Completion for unknown request {}", request_id);
            return;
        };

        match completion {
            Completion::Priority {
                key,
                priority,
                result,
            } => {
                let superseded = self.latest_priority.get(&key) != Some(&request_id)
                    || self.batches.epoch() != pending.epoch
                    || !self.batches.contains(&key);
                if self.latest_priority.get(&key) == Some(&request_id) {
                    self.latest_priority.remove(&key);
                }
                match result {
                    Ok(()) if superseded => {
                        tracing::debug!("Ignoring superseded priority reply for '{}'", key);
                    }
                    Ok(()) => {
                        tracing::debug!("Batch '{}' priority saved as {}", key, priority);
                        if pending.announce {
                            self.toast(
                                ToastKind::Success,
                                format!("Batch #{} priority updated to {}", key, priority),
                            )
                            .await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Priority update for '{}' failed: {}", key, e);
                        self.toast(
                            ToastKind::Danger,
                            failure_message("Failed to update priority", &e),
                        )
                        .await;
                        if !superseded {
                            self.resync(ListContext::Batches);
                        }
                    }
                }
                if self.reload_batches && self.latest_priority.is_empty() {
                    self.reload_batches = false;
                    self.resync(ListContext::Batches);
                }
            }
            Completion::Lifecycle {
                key,
                action,
                result,
            } => match result {
                Ok(()) => {
                    let (kind, verb) = match action {
                        Action::Pause => (ToastKind::Warning, "paused"),
                        _ => (ToastKind::Success, "started"),
                    };
                    self.toast(kind, format!("Batch #{} {} successfully", key, verb))
                        .await;
                    self.timers.schedule(
                        self.timing.action_resync,
                        EngineEvent::Command(Command::Resync(ListContext::Batches)),
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to {} batch '{}': {}", action, key, e);
                    self.toast(
                        ToastKind::Danger,
                        failure_message(&format!("Failed to {} batch", action), &e),
                    )
                    .await;
                    self.resync(ListContext::Batches);
                }
            },
            Completion::Fetched { context, result } => {
                let latest = self.latest_fetch.get(&context) == Some(&request_id);
                if !latest || self.rows(context).epoch() != pending.epoch {
                    tracing::debug!("Ignoring superseded {} reload", context);
                    return;
                }
                self.latest_fetch.remove(&context);
                match result {
                    Ok(rows) => {
                        tracing::debug!("Reloaded {} {}", rows.len(), context);
                        self.apply_sync(context, SyncEvent::FullRefresh { rows })
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!("Reloading {} failed: {}", context, e);
                        self.toast(
                            ToastKind::Danger,
                            failure_message(&format!("Failed to load {}", context), &e),
                        )
                        .await;
                    }
                }
            }
        }
    }

    fn track(&mut self, pending: Pending) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.insert(id, pending);
        id
    }

    fn spawn_request<F>(&self, request_id: u64, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let completion = request.await;
            let _ = tx.send(EngineEvent::Completed {
                request_id,
                completion,
            });
        });
    }

    async fn toast(&self, kind: ToastKind, message: impl Into<String>) {
        self.surface.show_toast(&Toast::new(kind, message)).await;
    }
}

/// `"{prefix}: {server message}"` for application errors, `prefix` alone
/// when the request never got an answer
fn failure_message(prefix: &str, error: &ConsoleError) -> String {
    match error {
        ConsoleError::Application { message } if !message.is_empty() => {
            format!("{}: {}", prefix, message)
        }
        _ => prefix.to_string(),
    }
}
