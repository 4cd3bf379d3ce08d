use crate::utils::errors::{OrchestratorError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, resolved once at startup from the process
/// environment (with `.env` support). Passed explicitly into the
/// components that need it instead of reading env vars ad hoc.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory under which all backup artifacts live.
    pub backup_root: PathBuf,
    /// Optional webhook endpoint for run reports.
    pub hook_url: Option<String>,
    /// Backup tool binary (mariabackup-compatible CLI contract).
    pub tool_bin: String,
    /// Database user passed to the tool via `--user`.
    pub db_user: String,
    /// Hard cap on a single tool invocation.
    pub tool_timeout: Duration,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let backup_root = std::env::var("BACKUP_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                OrchestratorError::Config("BACKUP_PATH must be set to the backup root directory".into())
            })?;

        Ok(Self {
            backup_root,
            hook_url: std::env::var("BACKUP_HOOK_URL").ok().filter(|v| !v.is_empty()),
            tool_bin: std::env::var("MARIABACKUP_BIN").unwrap_or_else(|_| "mariabackup".into()),
            db_user: std::env::var("BACKUP_USER").unwrap_or_else(|_| "root".into()),
            tool_timeout: Duration::from_secs(
                std::env::var("BACKUP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        })
    }
}
