//! Operator dashboard: HTML view, JSON snapshots and command endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::engine::{Command, EngineHandle};
use crate::model::{BadgeTone, ListContext, RowDetails, RowKey};
use crate::protocol::{DashboardStats, UsageLevel};
use crate::surface::ToastKind;
use crate::view::{RowView, ViewHandle};

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub view: ViewHandle,
    pub engine: EngineHandle,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub new_index: usize,
}

/// Build the dashboard axum router
pub fn build_router(view: ViewHandle, engine: EngineHandle) -> Router {
    let dashboard_state = DashboardState { view, engine };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/batches", get(batches_handler))
        .route("/api/deployments", get(deployments_handler))
        .route("/api/toasts", get(toasts_handler))
        .route("/api/status", get(status_handler))
        .route("/api/batches/{id}/move", post(move_handler))
        .route("/api/batches/{id}/start", post(start_handler))
        .route("/api/batches/{id}/pause", post(pause_handler))
        .route("/api/resync", post(resync_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

fn badge_colors(tone: BadgeTone) -> (&'static str, &'static str) {
    match tone {
        BadgeTone::Primary => ("#004085", "#cce5ff"),
        BadgeTone::Secondary => ("#383d41", "#e2e3e5"),
        BadgeTone::Success => ("#155724", "#d4edda"),
        BadgeTone::Info => ("#0c5460", "#d1ecf1"),
        BadgeTone::Warning => ("#856404", "#fff3cd"),
        BadgeTone::Danger => ("#721c24", "#f8d7da"),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_row(row: &RowView, context: ListContext) -> String {
    let (color, bg) = badge_colors(row.badge);
    let highlight = if row.highlighted {
        "background-color: #fffbe6;"
    } else {
        ""
    };
    let progress = match (row.percent, row.remaining, row.total) {
        (Some(percent), Some(remaining), Some(total)) => {
            format!("{}% ({} of {} left)", percent, remaining, total)
        }
        _ => "-".to_string(),
    };
    let detail = match &row.details {
        RowDetails::Batch {
            venue_code,
            product_type,
        } => format!(
            "{} {}",
            venue_code.as_deref().unwrap_or(""),
            product_type.as_deref().unwrap_or("")
        ),
        RowDetails::Deployment {
            mac_address,
            updated_at,
            ..
        } => format!(
            "{} {}",
            mac_address.as_deref().unwrap_or(""),
            updated_at.as_deref().unwrap_or("")
        ),
        RowDetails::None => String::new(),
    };
    let priority = match context {
        ListContext::Batches => row.priority.to_string(),
        ListContext::Deployments => String::new(),
    };
    format!(
        r#"<tr style="border-bottom: 1px solid #dee2e6; {highlight}">
            <td style="padding: 0.5rem;">{key}</td>
            <td style="padding: 0.5rem;">{detail}</td>
            <td style="padding: 0.5rem;">{priority}</td>
            <td style="padding: 0.5rem;">
                <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: {color}; background-color: {bg};">{status}</span>
            </td>
            <td style="padding: 0.5rem;">{progress}</td>
        </tr>"#,
        key = escape_html(row.key.as_str()),
        detail = escape_html(detail.trim()),
        status = row.status,
    )
}

fn render_stats(stats: Option<&DashboardStats>) -> String {
    let Some(stats) = stats else {
        return "<p>Waiting for statistics</p>".to_string();
    };
    let recent: String = stats
        .recent_shown()
        .iter()
        .map(|d| format!("<li>{} ({})</li>", escape_html(&d.hostname), d.status))
        .collect();
    format!(
        "<p>Venues: {} | Hostnames: {} available, {} assigned | Deployments: {} recent, {} successful</p><ul>{}</ul>",
        stats.total_venues,
        stats.available_hostnames,
        stats.assigned_hostnames,
        stats.recent_deployments_count,
        stats.successful_deployments,
        recent
    )
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view.read().await;

    let batch_rows: String = view
        .batches
        .iter()
        .map(|r| render_row(r, ListContext::Batches))
        .collect();
    let deployment_rows: String = view
        .deployments
        .iter()
        .map(|r| render_row(r, ListContext::Deployments))
        .collect();
    let toast_items: String = view
        .toasts
        .iter()
        .rev()
        .map(|t| {
            let tone = match t.kind {
                ToastKind::Success => BadgeTone::Success,
                ToastKind::Info => BadgeTone::Info,
                ToastKind::Warning => BadgeTone::Warning,
                ToastKind::Danger => BadgeTone::Danger,
            };
            let (color, bg) = badge_colors(tone);
            format!(
                r#"<li style="color: {}; background-color: {}; padding: 0.25rem 0.5rem; margin-bottom: 0.25rem;">{}</li>"#,
                color,
                bg,
                escape_html(&t.message)
            )
        })
        .collect();
    let disk = match view.system.as_ref().and_then(|s| s.disk_space.as_ref()) {
        Some(disk) => {
            let tone = match disk.usage_level() {
                UsageLevel::Critical => BadgeTone::Danger,
                UsageLevel::High => BadgeTone::Warning,
                UsageLevel::Normal => BadgeTone::Success,
            };
            let (color, _) = badge_colors(tone);
            format!(
                r#"<span style="color: {};">Disk {:.1}% used ({:.1} GB free)</span>"#,
                color, disk.percent_used, disk.available_gb
            )
        }
        None => String::new(),
    };
    let connection = if view.connected {
        r#"<span style="color: #155724;">Live</span>"#
    } else {
        r#"<span style="color: #721c24;">Offline</span>"#
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta http-equiv="refresh" content="5">
    <title>Deploy Console</title>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 1rem;">
    <h1>Deploy Console</h1>
    <p>{connection} {disk}</p>
    <section>
        <h2>Overview</h2>
        {stats}
    </section>
    <section>
        <h2>Batches</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Batch</th>
                    <th style="padding: 0.5rem; text-align: left;">Venue / Product</th>
                    <th style="padding: 0.5rem; text-align: left;">Priority</th>
                    <th style="padding: 0.5rem; text-align: left;">Status</th>
                    <th style="padding: 0.5rem; text-align: left;">Progress</th>
                </tr>
            </thead>
            <tbody id="batch-body">{batch_rows}</tbody>
        </table>
    </section>
    <section>
        <h2>Deployments</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Hostname</th>
                    <th style="padding: 0.5rem; text-align: left;">MAC / Updated</th>
                    <th style="padding: 0.5rem; text-align: left;"></th>
                    <th style="padding: 0.5rem; text-align: left;">Status</th>
                    <th style="padding: 0.5rem; text-align: left;"></th>
                </tr>
            </thead>
            <tbody id="deployment-body">{deployment_rows}</tbody>
        </table>
    </section>
    <section>
        <h2>Notifications</h2>
        <ul style="list-style: none; padding: 0;">{toast_items}</ul>
    </section>
</body>
</html>"#,
        stats = render_stats(view.stats.as_ref()),
    );

    Html(html)
}

async fn batches_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view.read().await;
    Json(view.batches.clone())
}

async fn deployments_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view.read().await;
    Json(view.deployments.clone())
}

async fn toasts_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view.read().await;
    Json(view.toasts.iter().cloned().collect::<Vec<_>>())
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let view = dashboard.view.read().await;
    Json(serde_json::json!({
        "connected": view.connected,
        "uptime_seconds": view.started_at.elapsed().as_secs(),
        "stats": view.stats,
        "system": view.system,
    }))
}

fn submit(engine: &EngineHandle, command: Command) -> impl IntoResponse {
    match engine.send(command) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::warn!("Dashboard command rejected: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn move_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> impl IntoResponse {
    submit(
        &dashboard.engine,
        Command::Reorder {
            key: RowKey::new(id),
            new_index: request.new_index,
        },
    )
}

async fn start_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    submit(&dashboard.engine, Command::Start(RowKey::new(id)))
}

async fn pause_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    submit(&dashboard.engine, Command::Pause(RowKey::new(id)))
}

async fn resync_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let batches = dashboard
        .engine
        .send(Command::Resync(ListContext::Batches));
    let deployments = dashboard
        .engine
        .send(Command::Resync(ListContext::Deployments));
    match batches.and(deployments) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::warn!("Dashboard resync rejected: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
