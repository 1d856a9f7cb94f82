//! View-model types shared by the reorder engine and the synchronizer

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable external identifier of a row (batch id or deployment hostname)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which displayed list a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListContext {
    Batches,
    Deployments,
}

impl fmt::Display for ListContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListContext::Batches => write!(f, "batches"),
            ListContext::Deployments => write!(f, "deployments"),
        }
    }
}

/// Lifecycle status of a batch or deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Active,
    Paused,
    Completed,
    Cancelled,
    Starting,
    Downloading,
    Verifying,
    Customizing,
    Success,
    Failed,
    Error,
    #[serde(other)]
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
            Status::Starting => "starting",
            Status::Downloading => "downloading",
            Status::Verifying => "verifying",
            Status::Customizing => "customizing",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Error => "error",
            Status::Unknown => "unknown",
        }
    }

    /// Actions the operator may take on a row in this status
    pub fn permitted_actions(&self) -> Vec<Action> {
        match self {
            Status::Pending | Status::Paused => vec![Action::Start, Action::View],
            Status::Active => vec![Action::Pause, Action::View],
            _ => vec![Action::View],
        }
    }

    pub fn permits(&self, action: Action) -> bool {
        self.permitted_actions().contains(&action)
    }

    /// A batch reaching this status invalidates the aggregate statistics
    pub fn is_completion(&self) -> bool {
        matches!(self, Status::Completed)
    }

    pub fn badge(&self) -> BadgeTone {
        match self {
            Status::Pending | Status::Starting | Status::Unknown => BadgeTone::Secondary,
            Status::Active | Status::Success => BadgeTone::Success,
            Status::Paused | Status::Verifying => BadgeTone::Warning,
            Status::Completed | Status::Customizing => BadgeTone::Primary,
            Status::Downloading => BadgeTone::Info,
            Status::Cancelled | Status::Failed | Status::Error => BadgeTone::Danger,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour family of a status badge or toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Primary,
    Secondary,
    Success,
    Info,
    Warning,
    Danger,
}

/// An operator action on a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Pause,
    View,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Start => write!(f, "start"),
            Action::Pause => write!(f, "pause"),
            Action::View => write!(f, "view"),
        }
    }
}

/// Work remaining out of a total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub remaining: u64,
    pub total: u64,
}

impl Progress {
    /// Returns `None` when `remaining > total`
    pub fn new(remaining: u64, total: u64) -> Option<Self> {
        (remaining <= total).then_some(Self { remaining, total })
    }

    /// Completed share in whole percent; `None` when there is no progress data
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let done = self.total - self.remaining.min(self.total);
        Some((done.saturating_mul(100) / self.total) as u8)
    }
}

/// Per-list descriptive fields carried alongside the sortable state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDetails {
    #[default]
    None,
    Batch {
        venue_code: Option<String>,
        product_type: Option<String>,
    },
    Deployment {
        mac_address: Option<String>,
        serial_number: Option<String>,
        updated_at: Option<String>,
    },
}

/// One displayed batch or deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: RowKey,
    pub priority: i64,
    pub status: Status,
    pub progress: Option<Progress>,
    #[serde(default)]
    pub details: RowDetails,
}

impl Row {
    /// A row known only by key and status
    pub fn minimal(key: RowKey, status: Status) -> Self {
        Self {
            key,
            priority: 0,
            status,
            progress: None,
            details: RowDetails::None,
        }
    }

    pub fn percent(&self) -> Option<u8> {
        self.progress.and_then(|p| p.percent())
    }

    pub fn permitted_actions(&self) -> Vec<Action> {
        self.status.permitted_actions()
    }
}
