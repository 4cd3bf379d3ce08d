//! Backup store layout and marker inspection.
//!
//! The store is a plain directory tree; a marker directory's presence
//! is the only completion signal. There is no status database:
//!
//! ```text
//! <root>/<week-start>-to-<week-end>/full_weekly/...
//! <root>/<week-start>-to-<week-end>/<YYYY-MM-DD>/...
//! ```
//!
//! Backups are written into a `.partial` sibling and renamed into
//! place on success, so a half-finished run never looks complete.

use crate::week::{format_date, WeekWindow};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Directory name of the weekly full backup marker.
pub const FULL_BACKUP_DIR: &str = "full_weekly";

/// Suffix for in-progress target directories.
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn week_dir(&self, week: &WeekWindow) -> PathBuf {
        self.root.join(week.dir_name())
    }

    /// Full-backup marker path for a week.
    pub fn full_target(&self, week: &WeekWindow) -> PathBuf {
        self.week_dir(week).join(FULL_BACKUP_DIR)
    }

    /// Incremental marker path for a specific day.
    pub fn daily_target(&self, week: &WeekWindow, date: NaiveDate) -> PathBuf {
        self.week_dir(week).join(format_date(date))
    }

    /// Create the week directory if absent. Idempotent.
    pub fn ensure_week_dir(&self, week: &WeekWindow) -> std::io::Result<PathBuf> {
        let dir = self.week_dir(week);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Existence check only; no integrity validation.
    pub fn has_full_backup(&self, week: &WeekWindow) -> bool {
        self.full_target(week).exists()
    }

    /// Existence check only; no integrity validation.
    pub fn has_backup_for(&self, week: &WeekWindow, date: NaiveDate) -> bool {
        self.daily_target(week, date).exists()
    }

    /// In-progress path corresponding to a final marker path.
    pub fn partial_of(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(PARTIAL_SUFFIX);
        target.with_file_name(name)
    }
}
