//! Deploy console - live operator console for device deployment batches
//!
//! Mirrors the backend's batch and deployment lists, keeps them current from
//! the push channel, and lets the operator reorder, start and pause batches.

pub mod api;
pub mod channel;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod io;
pub mod model;
pub mod protocol;
pub mod reorder;
pub mod rows;
pub mod surface;
pub mod sync;
pub mod timer;
pub mod view;
pub mod ws;

pub use config::{load_config, Config};
pub use error::{ConsoleError, Result};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::BackendApi;
use crate::channel::{LoopbackChannel, PushChannel};
use crate::engine::Engine;
use crate::io::ReqwestHttpClient;
use crate::view::SnapshotSurface;
use crate::ws::WebSocketChannel;

/// Run the deploy console with the given configuration
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::new());
    let api = Arc::new(BackendApi::new(&config.backend, http));

    let view = view::new_view_handle(config.dashboard.toast_history);
    let surface = Arc::new(SnapshotSurface::new(Arc::clone(&view)));

    let channel: Arc<dyn PushChannel> = if config.push.enabled {
        tracing::info!("Live updates from {}", config.push.url);
        WebSocketChannel::spawn(&config.push, cancel.child_token())
    } else {
        tracing::info!("Live updates disabled");
        Arc::new(LoopbackChannel::new())
    };

    let engine = Engine::new(&config, api, surface, channel, cancel.clone());
    engine.subscribe();
    let handle = engine.handle();

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
        }
        cancel_for_signal.cancel();
    });

    // Start dashboard if enabled
    if config.dashboard.enabled {
        let dashboard_port = config.dashboard.port;
        let dashboard_view = Arc::clone(&view);
        let cancel_for_dashboard = cancel.clone();

        tokio::spawn(async move {
            let router = dashboard::build_router(dashboard_view, handle);
            let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
            tracing::info!("Dashboard listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                        dashboard_port,
                        e
                    );
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_dashboard.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Dashboard stopped");
        });
    }

    tracing::info!("Deploy console started against {}", config.backend.api_root());

    // Run the engine (blocks until cancelled)
    engine.run().await;

    tracing::info!("Deploy console stopped");
    Ok(())
}
