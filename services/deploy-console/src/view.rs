//! Shared view state rendered by the dashboard

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::model::{Action, BadgeTone, ListContext, Row, RowDetails, RowKey, Status};
use crate::protocol::{DashboardStats, SystemStatus};
use crate::surface::{RenderSurface, Toast, ToastKind};

/// One row as it is displayed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub key: RowKey,
    pub priority: i64,
    pub status: Status,
    pub badge: BadgeTone,
    pub percent: Option<u8>,
    pub remaining: Option<u64>,
    pub total: Option<u64>,
    pub actions: Vec<Action>,
    pub highlighted: bool,
    pub details: RowDetails,
}

impl RowView {
    fn from_row(row: &Row) -> Self {
        Self {
            key: row.key.clone(),
            priority: row.priority,
            status: row.status,
            badge: row.status.badge(),
            percent: row.percent(),
            remaining: row.progress.map(|p| p.remaining),
            total: row.progress.map(|p| p.total),
            actions: row.permitted_actions(),
            highlighted: false,
            details: row.details.clone(),
        }
    }

    /// Redraw from `row`, keeping only the highlight
    fn refresh(&mut self, row: &Row) {
        let highlighted = self.highlighted;
        *self = Self::from_row(row);
        self.highlighted = highlighted;
    }
}

/// A toast as recorded in the history
#[derive(Debug, Clone, Serialize)]
pub struct ToastRecord {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    pub timestamp_epoch_ms: u64,
}

/// Everything the operator currently sees
#[derive(Debug)]
pub struct ViewState {
    pub batches: Vec<RowView>,
    pub deployments: Vec<RowView>,
    pub toasts: VecDeque<ToastRecord>,
    pub toast_history: usize,
    pub connected: bool,
    pub stats: Option<DashboardStats>,
    pub system: Option<SystemStatus>,
    pub started_at: Instant,
    next_toast_id: u64,
}

impl ViewState {
    pub fn new(toast_history: usize) -> Self {
        Self {
            batches: Vec::new(),
            deployments: Vec::new(),
            toasts: VecDeque::with_capacity(toast_history),
            toast_history,
            connected: false,
            stats: None,
            system: None,
            started_at: Instant::now(),
            next_toast_id: 1,
        }
    }

    pub fn list(&self, context: ListContext) -> &[RowView] {
        match context {
            ListContext::Batches => &self.batches,
            ListContext::Deployments => &self.deployments,
        }
    }

    fn list_mut(&mut self, context: ListContext) -> &mut Vec<RowView> {
        match context {
            ListContext::Batches => &mut self.batches,
            ListContext::Deployments => &mut self.deployments,
        }
    }

    pub fn row(&self, context: ListContext, key: &RowKey) -> Option<&RowView> {
        self.list(context).iter().find(|r| &r.key == key)
    }

    pub fn replace_list(&mut self, context: ListContext, rows: &[Row]) {
        let list = self.list_mut(context);
        let previous = std::mem::take(list);
        *list = rows
            .iter()
            .map(|row| match previous.iter().find(|v| v.key == row.key) {
                Some(old) => {
                    let mut view = old.clone();
                    view.refresh(row);
                    view
                }
                None => RowView::from_row(row),
            })
            .collect();
    }

    pub fn upsert_row(&mut self, context: ListContext, index: usize, row: &Row) {
        let list = self.list_mut(context);
        match list.iter_mut().find(|v| v.key == row.key) {
            Some(view) => view.refresh(row),
            None => {
                let at = index.min(list.len());
                list.insert(at, RowView::from_row(row));
            }
        }
    }

    /// Returns false if the row is not displayed
    pub fn set_highlight(&mut self, context: ListContext, key: &RowKey, on: bool) -> bool {
        match self.list_mut(context).iter_mut().find(|v| &v.key == key) {
            Some(view) => {
                view.highlighted = on;
                true
            }
            None => false,
        }
    }

    /// Record a toast, dropping the oldest once the history is full.
    /// Nothing is kept when the history size is 0.
    pub fn push_toast(&mut self, toast: &Toast, now_ms: u64) -> u64 {
        let id = self.next_toast_id;
        self.next_toast_id += 1;
        if self.toast_history == 0 {
            return id;
        }
        if self.toasts.len() >= self.toast_history {
            self.toasts.pop_front();
        }
        self.toasts.push_back(ToastRecord {
            id,
            kind: toast.kind,
            message: toast.message.clone(),
            timestamp_epoch_ms: now_ms,
        });
        id
    }
}

/// Thread-safe view handle
pub type ViewHandle = Arc<RwLock<ViewState>>;

pub fn new_view_handle(toast_history: usize) -> ViewHandle {
    Arc::new(RwLock::new(ViewState::new(toast_history)))
}

/// Surface that renders into a [`ViewHandle`]
#[derive(Clone)]
pub struct SnapshotSurface {
    view: ViewHandle,
}

impl SnapshotSurface {
    pub fn new(view: ViewHandle) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &ViewHandle {
        &self.view
    }
}

#[async_trait]
impl RenderSurface for SnapshotSurface {
    async fn replace_list(&self, context: ListContext, rows: &[Row]) {
        self.view.write().await.replace_list(context, rows);
    }

    async fn upsert_row(&self, context: ListContext, index: usize, row: &Row) {
        self.view.write().await.upsert_row(context, index, row);
    }

    async fn set_highlight(&self, context: ListContext, key: &RowKey, on: bool) {
        if !self.view.write().await.set_highlight(context, key, on) {
            tracing::trace!("Highlight target '{}' no longer displayed", key);
        }
    }

    async fn show_toast(&self, toast: &Toast) {
        match toast.kind {
            ToastKind::Danger | ToastKind::Warning => {
                tracing::warn!("[toast] {}", toast.message)
            }
            ToastKind::Success | ToastKind::Info => {
                tracing::info!("[toast] {}", toast.message)
            }
        }
        self.view
            .write()
            .await
            .push_toast(toast, current_epoch_ms());
    }

    async fn set_connected(&self, connected: bool) {
        self.view.write().await.connected = connected;
    }

    async fn update_stats(&self, stats: &DashboardStats) {
        self.view.write().await.stats = Some(stats.clone());
    }

    async fn update_system_status(&self, status: &SystemStatus) {
        self.view.write().await.system = Some(status.clone());
    }
}

fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Progress;

    fn row(key: &str, status: Status) -> Row {
        Row::minimal(RowKey::from(key), status)
    }

    #[test]
    fn row_view_carries_badge_and_actions() {
        let mut r = row("1", Status::Active);
        r.progress = Progress::new(5, 20);
        let view = RowView::from_row(&r);
        assert_eq!(view.badge, BadgeTone::Success);
        assert_eq!(view.actions, vec![Action::Pause, Action::View]);
        assert_eq!(view.percent, Some(75));
    }

    #[test]
    fn upsert_updates_in_place_and_keeps_highlight() {
        let mut state = ViewState::new(10);
        state.replace_list(ListContext::Batches, &[row("1", Status::Pending)]);
        assert!(state.set_highlight(ListContext::Batches, &"1".into(), true));
        state.upsert_row(ListContext::Batches, 0, &row("1", Status::Active));
        let view = state.row(ListContext::Batches, &"1".into()).unwrap();
        assert_eq!(view.status, Status::Active);
        assert!(view.highlighted);
        assert_eq!(state.batches.len(), 1);
    }

    #[test]
    fn upsert_inserts_missing_row_at_index() {
        let mut state = ViewState::new(10);
        state.replace_list(ListContext::Deployments, &[row("a", Status::Success)]);
        state.upsert_row(ListContext::Deployments, 0, &row("b", Status::Starting));
        let keys: Vec<&str> = state.deployments.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn status_redraw_shows_progress_held_by_row() {
        let mut state = ViewState::new(10);
        let mut r = row("1", Status::Active);
        r.progress = Progress::new(1, 4);
        state.replace_list(ListContext::Batches, &[r.clone()]);
        r.status = Status::Paused;
        state.upsert_row(ListContext::Batches, 0, &r);
        let view = state.row(ListContext::Batches, &"1".into()).unwrap();
        assert_eq!(view.status, Status::Paused);
        assert_eq!(view.percent, Some(75));
    }

    #[test]
    fn refresh_without_progress_clears_previous_percent() {
        let mut state = ViewState::new(10);
        let mut r = row("1", Status::Active);
        r.progress = Progress::new(2, 10);
        state.replace_list(ListContext::Batches, &[r]);
        assert!(state.set_highlight(ListContext::Batches, &"1".into(), true));

        state.replace_list(ListContext::Batches, &[row("1", Status::Active)]);
        let view = state.row(ListContext::Batches, &"1".into()).unwrap();
        assert_eq!(view.percent, None);
        assert_eq!(view.remaining, None);
        assert_eq!(view.total, None);
        assert!(view.highlighted);
    }

    #[test]
    fn highlight_of_missing_row_is_reported() {
        let mut state = ViewState::new(10);
        assert!(!state.set_highlight(ListContext::Batches, &"x".into(), true));
    }

    #[test]
    fn toast_history_respects_max_size() {
        let mut state = ViewState::new(2);
        for i in 0..5 {
            state.push_toast(&Toast::new(ToastKind::Info, format!("t{}", i)), i);
        }
        assert_eq!(state.toasts.len(), 2);
        assert_eq!(state.toasts[0].message, "t3");
        assert_eq!(state.toasts[1].id, 5);
    }

    #[test]
    fn zero_toast_history_keeps_nothing() {
        let mut state = ViewState::new(0);
        let first = state.push_toast(&Toast::new(ToastKind::Danger, "lost"), 1);
        let second = state.push_toast(&Toast::new(ToastKind::Info, "lost too"), 2);
        assert!(state.toasts.is_empty());
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn snapshot_surface_writes_through() {
        let view = new_view_handle(10);
        let surface = SnapshotSurface::new(Arc::clone(&view));
        surface.set_connected(true).await;
        surface
            .show_toast(&Toast::new(ToastKind::Success, "done"))
            .await;
        let state = view.read().await;
        assert!(state.connected);
        assert_eq!(state.toasts[0].message, "done");
    }
}
