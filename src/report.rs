//! Run report construction and webhook delivery.
//!
//! After every backup attempt a JSON summary is POSTed to the
//! configured hook URL. Delivery is best-effort: the backup artifact
//! on disk is authoritative, so a report that cannot be delivered
//! within the bounded retry budget is surfaced as an error for the
//! caller to log, never a reason to roll anything back.

use crate::config::AppConfig;
use crate::utils::errors::{OrchestratorError, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Metadata file the tool drops into a successful backup directory.
const META_FILE: &str = "xtrabackup_info";

/// Total delivery attempts (1 initial + 3 retries).
const DELIVERY_ATTEMPTS: u32 = 4;

/// Cap on the doubling inter-attempt delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SpaceInfo {
    pub free: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub week: String,
    pub date: String,
    pub is_full: bool,
    pub success: bool,
    pub space: SpaceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<MetaEntry>>,
}

pub struct ReportSender {
    hook_url: Option<String>,
    client: reqwest::Client,
    retry_base_delay: Duration,
}

impl ReportSender {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_hook_url(config.hook_url.clone())
    }

    pub fn with_hook_url(hook_url: Option<String>) -> Self {
        Self {
            hook_url,
            client: reqwest::Client::new(),
            retry_base_delay: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Build and deliver the report for one backup attempt.
    ///
    /// `target` is the backup directory the attempt produced (or
    /// would have produced). With no hook URL configured this is a
    /// logged no-op; metadata and disk-usage problems are soft and
    /// only delivery exhaustion is an error.
    pub async fn send(
        &self,
        target: &Path,
        week: &str,
        date: &str,
        succeeded: bool,
        is_full: bool,
    ) -> Result<()> {
        let Some(url) = self.hook_url.as_deref() else {
            info!("No report will be sent, BACKUP_HOOK_URL is not configured");
            return Ok(());
        };

        let space = {
            // df needs an existing path; a failed run may not have
            // created the target, so probe its parent instead.
            let probe = if target.exists() {
                target.to_path_buf()
            } else {
                target.parent().unwrap_or(target).to_path_buf()
            };
            match tokio::task::spawn_blocking(move || disk_usage(&probe)).await {
                Ok(Ok(space)) => space,
                Ok(Err(e)) => {
                    warn!("Failed to compute disk usage: {}", e);
                    SpaceInfo::default()
                }
                Err(e) => {
                    warn!("Disk usage task failed: {}", e);
                    SpaceInfo::default()
                }
            }
        };

        let meta = if succeeded {
            match std::fs::read_to_string(target.join(META_FILE)) {
                Ok(content) => Some(parse_meta(&content)),
                Err(e) => {
                    warn!(file = %target.join(META_FILE).display(), "Couldn't parse meta information: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let report = Report {
            week: week.to_string(),
            date: date.to_string(),
            is_full,
            success: succeeded,
            space,
            meta,
        };

        let mut delay = self.retry_base_delay;
        for attempt in 1..=DELIVERY_ATTEMPTS {
            match self.client.post(url).json(&report).send().await {
                // Any response counts; only transport failures retry.
                Ok(resp) => {
                    info!(status = %resp.status(), attempt, "Report delivered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max = DELIVERY_ATTEMPTS, "Report delivery failed: {}", e);
                    if attempt < DELIVERY_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(MAX_RETRY_DELAY);
                    }
                }
            }
        }

        Err(OrchestratorError::ReportDelivery {
            attempts: DELIVERY_ATTEMPTS,
        })
    }
}

/// Parse `key = value` lines into an ordered list, splitting each
/// line on the first `=`. Lines without `=` keep an empty value.
pub fn parse_meta(content: &str) -> Vec<MetaEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once('=') {
            Some((key, value)) => MetaEntry {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => MetaEntry {
                key: line.trim().to_string(),
                value: String::new(),
            },
        })
        .collect()
}

/// Free/total bytes for the filesystem containing `path`, read from
/// `df -B1` output.
fn disk_usage(path: &Path) -> anyhow::Result<SpaceInfo> {
    let output = std::process::Command::new("df")
        .arg("-B1")
        .arg(path)
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.trim().lines().collect();
    if lines.len() < 2 {
        anyhow::bail!("Unexpected df output for {}", path.display());
    }
    let parts: Vec<&str> = lines[1].split_whitespace().collect();
    let total: u64 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let free: u64 = parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok(SpaceInfo { free, total })
}
