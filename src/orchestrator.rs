//! Per-invocation backup decision procedure.
//!
//! One run performs at most one backup action, derived entirely from
//! which marker directories exist: a missing weekly full backup wins
//! over everything, then a missing daily incremental, otherwise
//! nothing. The external scheduler re-invokes us; failed runs leave
//! no marker and are retried the same way next time.

use crate::config::AppConfig;
use crate::executor::{ToolRunner, TracingSink};
use crate::report::ReportSender;
use crate::store::BackupStore;
use crate::utils::errors::Result;
use crate::week::{self, format_date, WeekWindow};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{error, info};

/// What a single invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupAction {
    /// This week's full backup is missing.
    Full,
    /// Full exists, today's incremental is missing.
    Incremental,
    /// Both exist, nothing to do.
    UpToDate,
}

/// The decision itself, separated from the side effects.
pub fn plan(has_full: bool, has_today: bool) -> BackupAction {
    if !has_full {
        BackupAction::Full
    } else if !has_today {
        BackupAction::Incremental
    } else {
        BackupAction::UpToDate
    }
}

pub struct Orchestrator {
    store: BackupStore,
    runner: ToolRunner,
    reporter: ReportSender,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: BackupStore::new(config.backup_root.clone()),
            runner: ToolRunner::new(config),
            reporter: ReportSender::new(config),
        }
    }

    #[cfg(test)]
    fn with_parts(store: BackupStore, runner: ToolRunner, reporter: ReportSender) -> Self {
        Self { store, runner, reporter }
    }

    /// Run the decision procedure once for the current wall-clock day.
    pub async fn run(&self) -> Result<()> {
        self.run_for(WeekWindow::current(), week::today()).await
    }

    async fn run_for(&self, week: WeekWindow, today: NaiveDate) -> Result<()> {
        std::fs::create_dir_all(self.store.root())?;

        let action = plan(
            self.store.has_full_backup(&week),
            self.store.has_backup_for(&week, today),
        );

        let mut sink = TracingSink;
        match action {
            BackupAction::Full => {
                info!(week = %week, "Creating weekly full backup");
                let week_dir = self.store.ensure_week_dir(&week)?;
                let ok = self.runner.run_full(&week_dir, &mut sink).await?;
                if !ok {
                    error!(week = %week, "Weekly backup not created");
                }
                self.deliver(self.store.full_target(&week), &week, today, ok, true)
                    .await;
                // One action per run: the incremental is left for the
                // next invocation even when the full backup succeeded.
            }
            BackupAction::Incremental => {
                info!(week = %week, date = %format_date(today), "Creating today's incremental backup");
                let week_dir = self.store.ensure_week_dir(&week)?;
                let ok = self.runner.run_incremental(&week_dir, today, &mut sink).await?;
                if !ok {
                    error!(week = %week, date = %format_date(today), "Incremental backup not created");
                }
                self.deliver(self.store.daily_target(&week, today), &week, today, ok, false)
                    .await;
            }
            BackupAction::UpToDate => {
                info!(week = %week, "Backup for today already exists");
            }
        }

        Ok(())
    }

    /// Report delivery failure is logged, never fatal: the artifact
    /// on disk is the source of truth.
    async fn deliver(
        &self,
        target: PathBuf,
        week: &WeekWindow,
        today: NaiveDate,
        succeeded: bool,
        is_full: bool,
    ) {
        if let Err(e) = self
            .reporter
            .send(&target, &week.dir_name(), &format_date(today), succeeded, is_full)
            .await
        {
            error!("Backup finished but the report could not be sent: {}", e);
        }
    }
}
