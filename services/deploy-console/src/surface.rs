//! Rendering surface abstraction
//!
//! The engine never renders directly; it drives a [`RenderSurface`] with
//! row-level instructions. The console's own surface is
//! [`crate::view::SnapshotSurface`], which keeps a serializable snapshot
//! for the dashboard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ListContext, Row, RowKey};
use crate::protocol::{DashboardStats, SystemStatus};

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Info,
    Warning,
    Danger,
}

/// A transient operator notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Where list state, notifications and connection status are shown
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RenderSurface: Send + Sync {
    /// Redraw a whole list in the given order
    async fn replace_list(&self, context: ListContext, rows: &[Row]);

    /// Redraw one row, inserting it at `index` if it is not shown yet
    async fn upsert_row(&self, context: ListContext, index: usize, row: &Row);

    async fn set_highlight(&self, context: ListContext, key: &RowKey, on: bool);

    async fn show_toast(&self, toast: &Toast);

    async fn set_connected(&self, connected: bool);

    async fn update_stats(&self, stats: &DashboardStats);

    async fn update_system_status(&self, status: &SystemStatus);
}
