//! Live state synchronizer: reconcile pushed events into the row collection
//!
//! Applying an event mutates the collection and returns the presentation
//! effects it implies (redraws, highlights, toasts, delayed resyncs). The
//! synchronizer itself never touches a rendering surface or a timer, which
//! keeps reconciliation a pure function of (event, rows).

use std::time::Duration;

use serde::Deserialize;

use crate::model::{ListContext, Progress, Row, RowDetails, RowKey, Status};
use crate::rows::RowCollection;
use crate::surface::{Toast, ToastKind};

/// A server-pushed change to one list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    ProgressUpdate {
        key: RowKey,
        remaining: u64,
        total: u64,
    },
    StatusChange {
        key: RowKey,
        status: Status,
        #[serde(default)]
        details: Option<RowDetails>,
    },
    FullRefresh {
        rows: Vec<Row>,
    },
}

impl SyncEvent {
    pub fn key(&self) -> Option<&RowKey> {
        match self {
            SyncEvent::ProgressUpdate { key, .. } | SyncEvent::StatusChange { key, .. } => {
                Some(key)
            }
            SyncEvent::FullRefresh { .. } => None,
        }
    }
}

/// What applying an event did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    Created,
    Replaced,
    /// The key is absent and this event may not create rows
    MissingTarget,
    /// The payload carried nothing usable
    Skipped,
}

/// Presentation work implied by an applied event
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RowUpdated(RowKey),
    RowInserted(RowKey),
    ListReplaced,
    Highlight(RowKey),
    Notify(Toast),
    ScheduleResync(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub outcome: Outcome,
    pub effects: Vec<Effect>,
}

impl Applied {
    fn nothing(outcome: Outcome) -> Self {
        Self {
            outcome,
            effects: Vec::new(),
        }
    }
}

/// Reconciles sync events into a row collection, one at a time
#[derive(Debug, Clone)]
pub struct Synchronizer {
    completion_resync: Duration,
}

impl Synchronizer {
    pub fn new(completion_resync: Duration) -> Self {
        Self { completion_resync }
    }

    pub fn apply(
        &self,
        context: ListContext,
        event: SyncEvent,
        rows: &mut RowCollection,
    ) -> Applied {
        match event {
            SyncEvent::ProgressUpdate {
                key,
                remaining,
                total,
            } => apply_progress(context, key, remaining, total, rows),
            SyncEvent::StatusChange {
                key,
                status,
                details,
            } => self.apply_status(context, key, status, details, rows),
            SyncEvent::FullRefresh { rows: fresh } => {
                tracing::debug!("Replacing {} list with {} rows", context, fresh.len());
                rows.replace_all(fresh);
                Applied {
                    outcome: Outcome::Replaced,
                    effects: vec![Effect::ListReplaced],
                }
            }
        }
    }

    fn apply_status(
        &self,
        context: ListContext,
        key: RowKey,
        status: Status,
        details: Option<RowDetails>,
        rows: &mut RowCollection,
    ) -> Applied {
        let outcome = if rows.contains(&key) {
            rows.set_status(&key, status);
            if let Some(details) = details {
                rows.set_details(&key, details);
            }
            Outcome::Updated
        } else if context == ListContext::Deployments {
            let row = Row {
                details: details.unwrap_or_default(),
                ..Row::minimal(key.clone(), status)
            };
            rows.insert_front(row);
            Outcome::Created
        } else {
            tracing::debug!("Status change for unknown {} row '{}' ignored", context, key);
            return Applied::nothing(Outcome::MissingTarget);
        };

        let mut effects = vec![
            if outcome == Outcome::Created {
                Effect::RowInserted(key.clone())
            } else {
                Effect::RowUpdated(key.clone())
            },
            Effect::Highlight(key.clone()),
            Effect::Notify(Toast::new(
                ToastKind::Info,
                transition_message(context, &key, status),
            )),
        ];
        if context == ListContext::Batches && status.is_completion() {
            effects.push(Effect::ScheduleResync(self.completion_resync));
        }
        Applied { outcome, effects }
    }
}

fn apply_progress(
    context: ListContext,
    key: RowKey,
    remaining: u64,
    total: u64,
    rows: &mut RowCollection,
) -> Applied {
    if !rows.contains(&key) {
        tracing::debug!("Progress for unknown {} row '{}' ignored", context, key);
        return Applied::nothing(Outcome::MissingTarget);
    }
    if total == 0 {
        tracing::debug!("Progress for '{}' has no total, keeping previous", key);
        return Applied::nothing(Outcome::Skipped);
    }
    let Some(progress) = Progress::new(remaining, total) else {
        tracing::warn!(
            "Progress for '{}' reports {} remaining of {}, ignored",
            key,
            remaining,
            total
        );
        return Applied::nothing(Outcome::Skipped);
    };

    rows.set_progress(&key, progress);
    Applied {
        outcome: Outcome::Updated,
        effects: vec![Effect::RowUpdated(key.clone()), Effect::Highlight(key)],
    }
}

fn transition_message(context: ListContext, key: &RowKey, status: Status) -> String {
    match context {
        ListContext::Batches => format!("Batch #{} status changed to {}", key, status),
        ListContext::Deployments => format!("Deployment {} status changed to {}", key, status),
    }
}
