//! Custom error types for the orchestrator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report delivery failed after {attempts} attempts")]
    ReportDelivery { attempts: u32 },

    #[error("Backup tool error: {0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
