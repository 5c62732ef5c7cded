// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use anyhow::{Context, Result};
use serieswatch_application::{FeedPass, FeedRegistry};
use serieswatch_config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Runs one feed pass per tick.
pub struct FeedPassJob {
    pass: Arc<FeedPass>,
}

impl FeedPassJob {
    pub fn new(pass: Arc<FeedPass>) -> Self {
        Self { pass }
    }
}

#[async_trait::async_trait]
impl Job for FeedPassJob {
    fn job_type(&self) -> &'static str {
        "feed_pass"
    }

    fn name(&self) -> String {
        "Feed Pass".to_string()
    }

    async fn execute(&self, ctx: JobContext) -> Result<JobResult> {
        let summary = self.pass.run().await;

        if summary.sources == 0 {
            return Ok(JobResult::Skipped {
                reason: "no feeds configured".to_string(),
            });
        }

        let failed_sources = summary.fetch_failures + summary.snapshot_failures;
        if failed_sources == summary.sources {
            return Ok(JobResult::Failure {
                error: format!("all {} feeds failed", summary.sources),
            });
        }

        debug!(target: "jobs", job_id = %ctx.job_id, ?summary, "feed pass done");
        Ok(JobResult::Success)
    }
}

/// Reloads the `[[feeds]]` list when the configuration file changes.
///
/// Cheap to clone; clones share the same registry and change marker, so a
/// signal handler can hold one while the scheduler owns another.
#[derive(Clone)]
pub struct ConfigReloadJob {
    path: PathBuf,
    registry: Arc<FeedRegistry>,
    last_modified: Arc<Mutex<Option<SystemTime>>>,
    running: Option<Arc<AppConfig>>,
}

impl ConfigReloadJob {
    /// Starts from the file's current modification time, so the first tick
    /// only reloads if the file changed after startup. The recorded time only
    /// advances when a reload succeeds.
    pub fn new(path: impl Into<PathBuf>, registry: Arc<FeedRegistry>) -> Self {
        let path = path.into();
        let last_modified = modified_at(&path).ok();
        Self {
            path,
            registry,
            last_modified: Arc::new(Mutex::new(last_modified)),
            running: None,
        }
    }

    /// Compare reloaded files against the configuration the process started
    /// with, to warn about edits that need a restart.
    pub fn with_running_config(mut self, config: AppConfig) -> Self {
        self.running = Some(Arc::new(config));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and swap in its feeds. On error nothing changes and
    /// the file is picked up again on the next tick, even if it is not touched.
    pub async fn reload_now(&self) -> Result<usize> {
        info!(target: "jobs", path = %self.path.display(), "reloading config file");

        // stat before reading so a write racing the load triggers another reload
        let modified = modified_at(&self.path).ok();
        let result = async {
            let config = serieswatch_config::load(&self.path)?;
            if let Some(running) = &self.running {
                let sections = running.restart_sections(&config);
                if !sections.is_empty() {
                    warn!(target: "jobs", ?sections, "changes outside [[feeds]] take effect after a restart");
                }
            }
            let count = self
                .registry
                .replace(&config.feeds)
                .await
                .context("feed list rejected")?;
            Ok::<_, anyhow::Error>(count)
        }
        .await;

        match &result {
            Ok(count) => {
                if let Some(modified) = modified {
                    *self.last_modified() = Some(modified);
                }
                info!(target: "jobs", feeds = count, "feeds reloaded successfully")
            }
            Err(err) => {
                error!(target: "jobs", error = %format!("{err:#}"), "error reloading feeds, no changes were made")
            }
        }
        result
    }

    fn is_unchanged(&self, modified: SystemTime) -> bool {
        *self.last_modified() == Some(modified)
    }

    fn last_modified(&self) -> MutexGuard<'_, Option<SystemTime>> {
        self.last_modified.lock().unwrap_or_else(|poisoned| {
            warn!(target: "jobs", "config mtime mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[async_trait::async_trait]
impl Job for ConfigReloadJob {
    fn job_type(&self) -> &'static str {
        "config_reload"
    }

    fn name(&self) -> String {
        format!("Config Reload ({})", self.path.display())
    }

    async fn execute(&self, _ctx: JobContext) -> Result<JobResult> {
        let modified = match modified_at(&self.path) {
            Ok(modified) => modified,
            Err(err) => {
                return Ok(JobResult::Failure {
                    error: format!("cannot stat {}: {err}", self.path.display()),
                })
            }
        };

        if self.is_unchanged(modified) {
            return Ok(JobResult::Skipped {
                reason: "config file unchanged".to_string(),
            });
        }

        match self.reload_now().await {
            Ok(_) => Ok(JobResult::Success),
            Err(err) => Ok(JobResult::Failure {
                error: format!("{err:#}"),
            }),
        }
    }

    fn runs_at_startup(&self) -> bool {
        false
    }
}

fn modified_at(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}
