//! BDD test world for the deploy console

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cucumber::World;
use serde_json::Value;

use deploy_console::channel::LoopbackChannel;
use deploy_console::engine::Engine;
use deploy_console::io::{HttpClient, HttpResponse};
use deploy_console::model::{ListContext, Row, RowKey, Status};
use deploy_console::reorder::{PriorityPlan, ReorderError, ReorderPolicy};
use deploy_console::rows::RowCollection;
use deploy_console::sync::Applied;
use deploy_console::view::ViewHandle;

#[derive(Debug, Default, World)]
pub struct ConsoleWorld {
    // Reorder testing
    pub rows: Vec<Row>,
    pub policy: ReorderPolicy,
    pub plan: Option<Result<PriorityPlan, ReorderError>>,

    // Sync testing
    pub batches: RowCollection,
    pub deployments: RowCollection,
    pub snapshot: Vec<Row>,
    pub applied: Option<Applied>,

    // Engine testing
    pub console: Option<Console>,
}

impl ConsoleWorld {
    pub fn collection(&mut self, context: ListContext) -> &mut RowCollection {
        match context {
            ListContext::Batches => &mut self.batches,
            ListContext::Deployments => &mut self.deployments,
        }
    }

    pub fn console(&mut self) -> &mut Console {
        self.console.as_mut().expect("console not started")
    }
}

/// A running engine wired to a scripted backend and an in-process channel
pub struct Console {
    pub engine: Engine,
    pub view: ViewHandle,
    pub channel: LoopbackChannel,
    pub backend: Arc<ScriptedBackend>,
    pub published: Arc<Mutex<Vec<String>>>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Backend stand-in: records requests and answers from a script
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pub requests: Mutex<Vec<String>>,
    pub reject_with: Mutex<Option<String>>,
    pub batches: Mutex<Value>,
}

impl ScriptedBackend {
    fn record(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }

    fn mutation_reply(&self) -> HttpResponse {
        let body = match self.reject_with.lock().unwrap().as_ref() {
            Some(message) => serde_json::json!({"status": "error", "message": message}),
            None => serde_json::json!({"status": "success"}),
        };
        HttpResponse {
            status: 200,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedBackend {
    async fn get(&self, url: &str) -> deploy_console::Result<HttpResponse> {
        self.record(format!("GET {}", url));
        let body = if url.ends_with("/batches") {
            self.batches.lock().unwrap().to_string()
        } else {
            "[]".to_string()
        };
        Ok(HttpResponse { status: 200, body })
    }

    async fn put_json(&self, url: &str, body: &Value) -> deploy_console::Result<HttpResponse> {
        self.record(format!("PUT {} {}", url, body));
        Ok(self.mutation_reply())
    }

    async fn post_json(&self, url: &str, body: &Value) -> deploy_console::Result<HttpResponse> {
        self.record(format!("POST {} {}", url, body));
        Ok(self.mutation_reply())
    }
}

/// Parse `"A:50, B:40"` into rows with the given status
pub fn parse_rows(listing: &str, status: Status) -> Vec<Row> {
    listing.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (key, priority) = entry
                .split_once(':')
                .unwrap_or_else(|| panic!("expected key:priority, got {entry}"));
            Row {
                priority: priority.parse().expect("priority"),
                ..Row::minimal(RowKey::from(key), status)
            }
        })
        .collect()
}

/// Parse `"1:active, 2:pending"` into rows with descending priorities
pub fn parse_statuses(listing: &str) -> Vec<Row> {
    let entries: Vec<&str> = listing
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let n = entries.len() as i64;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (key, status) = entry
                .split_once(':')
                .unwrap_or_else(|| panic!("expected key:status, got {entry}"));
            Row {
                priority: (n - i as i64) * 10,
                ..Row::minimal(RowKey::from(key), parse_status(status))
            }
        })
        .collect()
}

pub fn parse_status(s: &str) -> Status {
    serde_json::from_value(Value::String(s.to_string())).expect("status")
}

pub fn parse_keys(listing: &str) -> Vec<RowKey> {
    listing.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RowKey::from)
        .collect()
}
