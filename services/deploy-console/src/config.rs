//! Configuration types for the deploy console

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::reorder::ReorderPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub reorder: ReorderConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// REST backend location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
        }
    }
}

impl BackendConfig {
    /// `base_url` joined with `api_prefix`, without a trailing slash
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }
}

/// Live push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_push_url")]
    pub url: String,
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_push_url(),
            reconnect_delay: default_reconnect_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Priority key derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderConfig {
    #[serde(default = "default_priority_step")]
    pub priority_step: i64,
    #[serde(default = "default_priority_step")]
    pub renumber_spacing: i64,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            priority_step: default_priority_step(),
            renumber_spacing: default_priority_step(),
        }
    }
}

impl ReorderConfig {
    pub fn policy(&self) -> ReorderPolicy {
        ReorderPolicy {
            step: self.priority_step,
            spacing: self.renumber_spacing,
        }
    }
}

/// Presentation delays
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long an updated row stays highlighted
    #[serde(default = "default_highlight", with = "humantime_serde")]
    pub highlight: Duration,
    /// Delay before reloading the batch list after a batch completes
    #[serde(default = "default_completion_resync", with = "humantime_serde")]
    pub completion_resync: Duration,
    /// Delay before reloading the batch list after a start or pause
    #[serde(default = "default_action_resync", with = "humantime_serde")]
    pub action_resync: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            highlight: default_highlight(),
            completion_resync: default_completion_resync(),
            action_resync: default_action_resync(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_toast_history")]
    pub toast_history: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            toast_history: default_toast_history(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_push_url() -> String {
    "ws://localhost:5000/ws".to_string()
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_priority_step() -> i64 {
    10
}

fn default_highlight() -> Duration {
    Duration::from_secs(2)
}

fn default_completion_resync() -> Duration {
    Duration::from_secs(2)
}

fn default_action_resync() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_toast_history() -> usize {
    50
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::ConsoleError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    if config.reorder.priority_step <= 0 || config.reorder.renumber_spacing <= 0 {
        return Err(crate::ConsoleError::Config(
            "priority_step and renumber_spacing must be positive".to_string(),
        ));
    }
    Ok(config)
}
