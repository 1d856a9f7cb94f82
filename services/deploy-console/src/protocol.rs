//! Wire types for push payloads and backend records

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{ListContext, Progress, Row, RowDetails, RowKey, Status};
use crate::sync::SyncEvent;

/// Push channel topic names
pub mod topics {
    pub const STATS_UPDATE: &str = "stats_update";
    pub const DEPLOYMENT_UPDATE: &str = "deployment_update";
    pub const DEPLOYMENTS_REFRESH: &str = "deployments_refresh";
    pub const SYSTEM_STATUS: &str = "system_status";
    pub const BATCH_UPDATE: &str = "batch_update";
    pub const BATCH_STATUS_CHANGE: &str = "batch_status_change";
    pub const SERVER_STATUS: &str = "status";

    /// Published locally by the channel when the connection comes up or drops
    pub const CONNECTED: &str = "connect";
    pub const DISCONNECTED: &str = "disconnect";

    pub const REQUEST_STATS: &str = "request_stats";
    pub const REQUEST_DEPLOYMENTS: &str = "request_deployments";
    pub const REQUEST_SYSTEM_STATUS: &str = "request_system_status";

    /// Every inbound topic the console listens to
    pub const INBOUND: &[&str] = &[
        STATS_UPDATE,
        DEPLOYMENT_UPDATE,
        DEPLOYMENTS_REFRESH,
        SYSTEM_STATUS,
        BATCH_UPDATE,
        BATCH_STATUS_CHANGE,
        SERVER_STATUS,
        CONNECTED,
        DISCONNECTED,
    ];
}

/// Batch ids arrive as integers from the backend but may be strings
fn deserialize_key<'de, D>(deserializer: D) -> std::result::Result<RowKey, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireKey {
        Int(i64),
        Text(String),
    }

    Ok(match WireKey::deserialize(deserializer)? {
        WireKey::Int(id) => RowKey::new(id.to_string()),
        WireKey::Text(id) => RowKey::new(id),
    })
}

/// `batch_update` payload
#[derive(Debug, Clone, Deserialize)]
pub struct BatchProgressPayload {
    #[serde(deserialize_with = "deserialize_key")]
    pub batch_id: RowKey,
    pub remaining_count: u64,
    pub total_count: u64,
}

/// `batch_status_change` payload
#[derive(Debug, Clone, Deserialize)]
pub struct BatchStatusPayload {
    #[serde(deserialize_with = "deserialize_key")]
    pub batch_id: RowKey,
    pub status: Status,
}

/// A batch as listed by `GET /api/batches`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(deserialize_with = "deserialize_key")]
    pub id: RowKey,
    #[serde(default)]
    pub venue_code: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub remaining_count: Option<u64>,
    #[serde(default)]
    pub priority: i64,
    pub status: Status,
}

impl From<BatchRecord> for Row {
    fn from(record: BatchRecord) -> Self {
        let progress = match (record.remaining_count, record.total_count) {
            (Some(remaining), Some(total)) => Progress::new(remaining, total),
            _ => None,
        };
        Row {
            key: record.id,
            priority: record.priority,
            status: record.status,
            progress,
            details: RowDetails::Batch {
                venue_code: record.venue_code,
                product_type: record.product_type,
            },
        }
    }
}

/// A deployment as pushed by `deployment_update` or listed by `GET /api/deployments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub hostname: String,
    pub status: Status,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
}

impl DeploymentRecord {
    pub fn details(&self) -> RowDetails {
        RowDetails::Deployment {
            mac_address: self.mac_address.clone(),
            serial_number: self.serial_number.clone(),
            updated_at: self.timestamp.clone().or_else(|| self.started_at.clone()),
        }
    }
}

impl From<DeploymentRecord> for Row {
    fn from(record: DeploymentRecord) -> Self {
        let details = record.details();
        Row {
            details,
            ..Row::minimal(RowKey::new(record.hostname), record.status)
        }
    }
}

/// `deployments_refresh` payload
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentsRefreshPayload {
    pub deployments: Vec<DeploymentRecord>,
}

/// Entry of the recent deployments list inside `stats_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentDeployment {
    pub hostname: String,
    pub status: Status,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// `stats_update` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_venues: u64,
    pub total_hostnames: u64,
    pub available_kxp2: u64,
    pub available_rxp2: u64,
    pub assigned_kxp2: u64,
    pub assigned_rxp2: u64,
    pub available_hostnames: u64,
    pub assigned_hostnames: u64,
    pub recent_deployments_count: u64,
    pub successful_deployments: u64,
    pub recent_deployments: Vec<RecentDeployment>,
    pub timestamp: Option<String>,
}

impl DashboardStats {
    /// Number of recent deployments shown in the compact list
    pub const RECENT_SHOWN: usize = 5;

    pub fn recent_shown(&self) -> &[RecentDeployment] {
        let n = self.recent_deployments.len().min(Self::RECENT_SHOWN);
        &self.recent_deployments[..n]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub accessible: bool,
    #[serde(default)]
    pub size_mb: Option<f64>,
}

/// How full the deployment volume is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total_gb: f64,
    pub used_gb: f64,
    pub available_gb: f64,
    pub percent_used: f64,
}

impl DiskSpace {
    pub fn usage_level(&self) -> UsageLevel {
        if self.percent_used > 90.0 {
            UsageLevel::Critical
        } else if self.percent_used > 75.0 {
            UsageLevel::High
        } else {
            UsageLevel::Normal
        }
    }
}

/// `system_status` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStatus {
    pub dnsmasq: Option<ServiceStatus>,
    pub nginx: Option<ServiceStatus>,
    pub database: Option<DatabaseStatus>,
    pub disk_space: Option<DiskSpace>,
}

/// `status` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatusPayload {
    #[serde(default)]
    pub message: String,
}

/// A decoded push message
#[derive(Debug, Clone)]
pub enum PushMessage {
    Sync {
        context: ListContext,
        event: SyncEvent,
    },
    Stats(DashboardStats),
    System(SystemStatus),
    ServerStatus(String),
    Connection(bool),
}

impl PushMessage {
    /// Decode the payload of `topic`. Unknown topics yield `Ok(None)`.
    pub fn decode(topic: &str, payload: serde_json::Value) -> crate::Result<Option<Self>> {
        let message = match topic {
            topics::BATCH_UPDATE => {
                let p: BatchProgressPayload = serde_json::from_value(payload)?;
                PushMessage::Sync {
                    context: ListContext::Batches,
                    event: SyncEvent::ProgressUpdate {
                        key: p.batch_id,
                        remaining: p.remaining_count,
                        total: p.total_count,
                    },
                }
            }
            topics::BATCH_STATUS_CHANGE => {
                let p: BatchStatusPayload = serde_json::from_value(payload)?;
                PushMessage::Sync {
                    context: ListContext::Batches,
                    event: SyncEvent::StatusChange {
                        key: p.batch_id,
                        status: p.status,
                        details: None,
                    },
                }
            }
            topics::DEPLOYMENT_UPDATE => {
                let record: DeploymentRecord = serde_json::from_value(payload)?;
                PushMessage::Sync {
                    context: ListContext::Deployments,
                    event: SyncEvent::StatusChange {
                        key: RowKey::new(record.hostname.clone()),
                        status: record.status,
                        details: Some(record.details()),
                    },
                }
            }
            topics::DEPLOYMENTS_REFRESH => {
                let p: DeploymentsRefreshPayload = serde_json::from_value(payload)?;
                PushMessage::Sync {
                    context: ListContext::Deployments,
                    event: SyncEvent::FullRefresh {
                        rows: p.deployments.into_iter().map(Row::from).collect(),
                    },
                }
            }
            topics::STATS_UPDATE => PushMessage::Stats(serde_json::from_value(payload)?),
            topics::SYSTEM_STATUS => PushMessage::System(serde_json::from_value(payload)?),
            topics::SERVER_STATUS => {
                let p: ServerStatusPayload = serde_json::from_value(payload)?;
                PushMessage::ServerStatus(p.message)
            }
            topics::CONNECTED => PushMessage::Connection(true),
            topics::DISCONNECTED => PushMessage::Connection(false),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}
