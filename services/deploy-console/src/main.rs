//! Deploy console CLI

use std::path::PathBuf;

use clap::Parser;
use deploy_console::{load_config, Config};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "deploy-console")]
#[command(about = "Live operator console for device deployment batches")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://deploy-server:5000
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Push channel URL, e.g. ws://deploy-server:5000/ws
    #[arg(long, value_name = "URL")]
    push_url: Option<String>,

    /// Port for the local dashboard
    #[arg(long, value_name = "PORT")]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

impl Args {
    /// The file configuration (or defaults) with command-line overrides applied
    fn resolve_config(&self) -> deploy_console::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::debug!("Loading configuration from {:?}", path);
                load_config(path)?
            }
            None => Config::default(),
        };

        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &self.push_url {
            config.push.url = url.clone();
        }
        if let Some(port) = self.dashboard_port {
            config.dashboard.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = args.resolve_config()?;
    tracing::info!(
        "Starting deploy console: backend {}, push {} ({}), dashboard {}",
        config.backend.api_root(),
        config.push.url,
        if config.push.enabled { "on" } else { "off" },
        if config.dashboard.enabled {
            config.dashboard.port.to_string()
        } else {
            "off".to_string()
        }
    );

    deploy_console::run(config).await?;
    Ok(())
}
