//! External backup tool invocation.
//!
//! Wraps a mariabackup-compatible binary: `--backup
//! --target-dir=<dir> [--incremental-basedir=<dir>] --user=<user>`,
//! exit code 0 = success. Tool output is forwarded line-by-line to a
//! caller-supplied sink as it arrives, with stderr lines tagged
//! distinctly from stdout lines.
//!
//! The tool writes into a `.partial` directory which is renamed to
//! the final marker name only after a clean exit. A non-zero exit or
//! timeout is a plain failure; the executor never retries.

use crate::config::AppConfig;
use crate::store::{BackupStore, FULL_BACKUP_DIR};
use crate::utils::errors::{OrchestratorError, Result};
use crate::week::format_date;
use chrono::NaiveDate;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Which stream a tool output line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStream {
    Stdout,
    Stderr,
}

/// Consumer of streamed tool output lines.
pub trait OutputSink: Send {
    fn line(&mut self, stream: ToolStream, line: &str);
}

/// Sink that forwards tool output into the tracing log.
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn line(&mut self, stream: ToolStream, line: &str) {
        match stream {
            ToolStream::Stdout => info!(target: "backup_tool", "{}", line),
            ToolStream::Stderr => warn!(target: "backup_tool", "{}", line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolRunner {
    bin: String,
    db_user: String,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            bin: config.tool_bin.clone(),
            db_user: config.db_user.clone(),
            timeout: config.tool_timeout,
        }
    }

    #[cfg(test)]
    pub fn with_settings(bin: impl Into<String>, db_user: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            db_user: db_user.into(),
            timeout,
        }
    }

    /// Take the weekly full backup into `<week_dir>/full_weekly`.
    /// Returns `Ok(true)` iff the tool exited zero within the timeout.
    pub async fn run_full(&self, week_dir: &Path, sink: &mut dyn OutputSink) -> Result<bool> {
        let target = week_dir.join(FULL_BACKUP_DIR);
        self.run_tool(&target, None, sink).await
    }

    /// Take today's incremental into `<week_dir>/<date>`, delta'd
    /// against the week's full backup.
    pub async fn run_incremental(
        &self,
        week_dir: &Path,
        date: NaiveDate,
        sink: &mut dyn OutputSink,
    ) -> Result<bool> {
        let target = week_dir.join(format_date(date));
        let base = week_dir.join(FULL_BACKUP_DIR);
        self.run_tool(&target, Some(&base), sink).await
    }

    async fn run_tool(
        &self,
        target: &Path,
        incremental_base: Option<&Path>,
        sink: &mut dyn OutputSink,
    ) -> Result<bool> {
        let partial = BackupStore::partial_of(target);

        let mut args: Vec<String> = vec![
            "--backup".into(),
            format!("--target-dir={}", partial.display()),
        ];
        if let Some(base) = incremental_base {
            args.push(format!("--incremental-basedir={}", base.display()));
        }
        args.push(format!("--user={}", self.db_user));

        info!(bin = %self.bin, ?args, "Executing backup tool");

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OrchestratorError::Tool(format!("failed to spawn {}: {}", self.bin, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let status = {
            let wait = async {
                let mut out_lines = BufReader::new(stdout.expect("stdout piped")).lines();
                let mut err_lines = BufReader::new(stderr.expect("stderr piped")).lines();
                let mut out_done = false;
                let mut err_done = false;

                while !(out_done && err_done) {
                    tokio::select! {
                        line = out_lines.next_line(), if !out_done => match line? {
                            Some(l) => sink.line(ToolStream::Stdout, &l),
                            None => out_done = true,
                        },
                        line = err_lines.next_line(), if !err_done => match line? {
                            Some(l) => sink.line(ToolStream::Stderr, &l),
                            None => err_done = true,
                        },
                    }
                }

                child.wait().await
            };

            match tokio::time::timeout(self.timeout, wait).await {
                Ok(status) => Some(status?),
                Err(_) => None,
            }
        };

        let succeeded = match status {
            Some(status) if status.success() => true,
            Some(status) => {
                warn!(target_dir = %target.display(), %status, "Backup tool exited with failure");
                false
            }
            None => {
                warn!(
                    target_dir = %target.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Backup tool timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out backup tool: {}", e);
                }
                false
            }
        };

        if succeeded {
            // Marker only appears once the backup is complete.
            std::fs::rename(&partial, target)?;
            info!(target_dir = %target.display(), "Backup completed");
            Ok(true)
        } else {
            cleanup_partial(&partial);
            Ok(false)
        }
    }
}

/// Best-effort removal of a failed run's partial directory so the
/// next invocation retries with a clean target.
fn cleanup_partial(partial: &Path) {
    match std::fs::remove_dir_all(partial) {
        Ok(()) => info!(dir = %partial.display(), "Removed partial backup directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %partial.display(), "Failed to remove partial backup directory: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct CollectSink {
        lines: Vec<(ToolStream, String)>,
    }

    impl CollectSink {
        fn new() -> Self {
            Self { lines: Vec::new() }
        }
    }

    impl OutputSink for CollectSink {
        fn line(&mut self, stream: ToolStream, line: &str) {
            self.lines.push((stream, line.to_string()));
        }
    }

    #[cfg(unix)]
    fn write_fake_tool(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-mariabackup");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // Creates whatever --target-dir it is given, like the real tool.
    #[cfg(unix)]
    const CREATE_TARGET: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --target-dir=*) mkdir -p "${arg#--target-dir=}" ;;
  esac
done
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_backup_success_renames_marker_into_place() {
        let tmp = TempDir::new().unwrap();
        let week_dir = tmp.path().join("week");
        std::fs::create_dir_all(&week_dir).unwrap();

        let tool = write_fake_tool(
            tmp.path(),
            &format!("{CREATE_TARGET}\necho preparing\necho 'completed OK!' >&2\nexit 0\n"),
        );
        let runner = ToolRunner::with_settings(
            tool.to_string_lossy(),
            "root",
            Duration::from_secs(30),
        );

        let mut sink = CollectSink::new();
        let ok = runner.run_full(&week_dir, &mut sink).await.unwrap();

        assert!(ok);
        assert!(week_dir.join(FULL_BACKUP_DIR).is_dir());
        assert!(!week_dir.join("full_weekly.partial").exists());

        assert!(sink
            .lines
            .contains(&(ToolStream::Stdout, "preparing".to_string())));
        assert!(sink
            .lines
            .contains(&(ToolStream::Stderr, "completed OK!".to_string())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_leaves_no_marker() {
        let tmp = TempDir::new().unwrap();
        let week_dir = tmp.path().join("week");
        std::fs::create_dir_all(&week_dir).unwrap();

        let tool = write_fake_tool(
            tmp.path(),
            &format!("{CREATE_TARGET}\necho 'fatal error' >&2\nexit 1\n"),
        );
        let runner = ToolRunner::with_settings(
            tool.to_string_lossy(),
            "root",
            Duration::from_secs(30),
        );

        let mut sink = CollectSink::new();
        let ok = runner.run_full(&week_dir, &mut sink).await.unwrap();

        assert!(!ok);
        assert!(!week_dir.join(FULL_BACKUP_DIR).exists());
        // Partial directory of the failed run is cleaned up
        assert!(!week_dir.join("full_weekly.partial").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_incremental_passes_basedir_and_user() {
        let tmp = TempDir::new().unwrap();
        let week_dir = tmp.path().join("week");
        std::fs::create_dir_all(&week_dir).unwrap();
        let args_file = tmp.path().join("args.txt");

        let tool = write_fake_tool(
            tmp.path(),
            &format!("{CREATE_TARGET}\necho \"$@\" > {}\nexit 0\n", args_file.display()),
        );
        let runner = ToolRunner::with_settings(
            tool.to_string_lossy(),
            "backup_user",
            Duration::from_secs(30),
        );

        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        let mut sink = CollectSink::new();
        let ok = runner.run_incremental(&week_dir, date, &mut sink).await.unwrap();

        assert!(ok);
        assert!(week_dir.join("2024-05-08").is_dir());

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert!(args.contains("--backup"));
        assert!(args.contains(&format!(
            "--incremental-basedir={}",
            week_dir.join(FULL_BACKUP_DIR).display()
        )));
        assert!(args.contains("--user=backup_user"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_reported_as_failure() {
        let tmp = TempDir::new().unwrap();
        let week_dir = tmp.path().join("week");
        std::fs::create_dir_all(&week_dir).unwrap();

        let tool = write_fake_tool(tmp.path(), "sleep 10\nexit 0\n");
        let runner = ToolRunner::with_settings(
            tool.to_string_lossy(),
            "root",
            Duration::from_millis(200),
        );

        let started = std::time::Instant::now();
        let mut sink = CollectSink::new();
        let ok = runner.run_full(&week_dir, &mut sink).await.unwrap();

        assert!(!ok);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!week_dir.join(FULL_BACKUP_DIR).exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let runner = ToolRunner::with_settings(
            "/nonexistent/backup-tool-12345",
            "root",
            Duration::from_secs(1),
        );

        let mut sink = CollectSink::new();
        let result = runner.run_full(tmp.path(), &mut sink).await;
        assert!(matches!(result, Err(OrchestratorError::Tool(_))));
    }
}
