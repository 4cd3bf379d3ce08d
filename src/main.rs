//! Mariabackup Orchestrator - Main entry point
//!
//! One-shot invocation: decide whether a full or incremental backup
//! is due, run it, report the outcome. Meant to be triggered daily by
//! cron or a systemd timer.

use mariabackup_orchestrator::orchestrator::Orchestrator;
use mariabackup_orchestrator::{utils, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    utils::logger::init(&config.log_level)?;

    tracing::info!(
        "Starting mariabackup-orchestrator v{} (root: {})",
        env!("CARGO_PKG_VERSION"),
        config.backup_root.display()
    );

    let orchestrator = Orchestrator::new(&config);
    orchestrator.run().await?;

    Ok(())
}
