//! REST client for the deployment backend

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::config::BackendConfig;
use crate::io::{HttpClient, HttpResponse};
use crate::model::{Action, Row, RowKey};
use crate::protocol::{BatchRecord, DeploymentRecord};
use crate::ConsoleError;

/// Fields the backend may put in a reply body.
///
/// Mutations either answer `{"status": "success" | "error", "message": ..}`
/// or return the updated record on success and `{"error": ..}` on failure.
#[derive(Debug, Default, Deserialize)]
struct Reply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Turn a mutation reply into success or an application error
pub fn interpret_reply(response: &HttpResponse) -> crate::Result<()> {
    let reply: Reply = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    if !response.is_success() {
        let message = reply
            .error
            .or(reply.message)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(ConsoleError::application(message));
    }
    if reply.status.as_deref() == Some("error") {
        return Err(ConsoleError::application(
            reply.message.or(reply.error).unwrap_or_default(),
        ));
    }
    if let Some(error) = reply.error {
        return Err(ConsoleError::application(error));
    }
    Ok(())
}

/// Typed operations against the backend REST API
pub struct BackendApi {
    root: String,
    http: Arc<dyn HttpClient>,
}

impl BackendApi {
    pub fn new(config: &BackendConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            root: config.api_root(),
            http,
        }
    }

    fn batch_url(&self, key: &RowKey, operation: &str) -> String {
        format!("{}/batches/{}/{}", self.root, key, operation)
    }

    /// Persist a new priority for one batch
    pub async fn update_priority(&self, key: &RowKey, priority: i64) -> crate::Result<()> {
        let url = self.batch_url(key, "priority");
        let response = self
            .http
            .put_json(&url, &json!({ "priority": priority }))
            .await?;
        interpret_reply(&response)
    }

    pub async fn start_batch(&self, key: &RowKey) -> crate::Result<()> {
        let response = self
            .http
            .post_json(&self.batch_url(key, "start"), &json!({}))
            .await?;
        interpret_reply(&response)
    }

    pub async fn pause_batch(&self, key: &RowKey) -> crate::Result<()> {
        let response = self
            .http
            .post_json(&self.batch_url(key, "pause"), &json!({}))
            .await?;
        interpret_reply(&response)
    }

    /// Run a lifecycle action. `View` has no backend counterpart.
    pub async fn perform(&self, action: Action, key: &RowKey) -> crate::Result<()> {
        match action {
            Action::Start => self.start_batch(key).await,
            Action::Pause => self.pause_batch(key).await,
            Action::View => Ok(()),
        }
    }

    /// Every batch, ordered by descending priority
    pub async fn list_batches(&self) -> crate::Result<Vec<Row>> {
        let mut records: Vec<BatchRecord> = self.fetch_list("batches").await?;
        records.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(records.into_iter().map(Row::from).collect())
    }

    /// Recent deployments, newest first as returned by the backend
    pub async fn list_deployments(&self) -> crate::Result<Vec<Row>> {
        let records: Vec<DeploymentRecord> = self.fetch_list("deployments").await?;
        Ok(records.into_iter().map(Row::from).collect())
    }

    async fn fetch_list<T: serde::de::DeserializeOwned>(&self, path: &str) -> crate::Result<T> {
        let url = format!("{}/{}", self.root, path);
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            interpret_reply(&response)?;
            return Err(ConsoleError::application(format!(
                "HTTP {}",
                response.status
            )));
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}
