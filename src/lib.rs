//! Mariabackup Orchestrator Library
//!
//! One-shot backup cadence engine: weekly full backups, daily
//! incrementals, with webhook reporting of each run's outcome.

pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod utils;
pub mod week;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::errors::OrchestratorError;
pub type Result<T> = std::result::Result<T, OrchestratorError>;
