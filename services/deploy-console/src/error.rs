//! Error types for the deploy console

use crate::reorder::ReorderError;

/// Errors that can occur in the deploy console
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request could not complete (connection, timeout, unreadable body)
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The request completed but the backend reported a failure
    #[error("Backend rejected request: {message}")]
    Application { message: String },

    #[error("Push channel error: {0}")]
    Channel(String),

    #[error("Reorder error: {0}")]
    Reorder(#[from] ReorderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConsoleError {
    pub fn application(message: impl Into<String>) -> Self {
        ConsoleError::Application {
            message: message.into(),
        }
    }

    /// The message shown to the operator when a request fails
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Application { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
