// SPDX-License-Identifier: GPL-3.0-or-later
pub mod job;
pub mod jobs;
pub mod registry;

use registry::JobRegistry;
use serieswatch_application::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use jobs::{ConfigReloadJob, FeedPassJob};

pub struct Scheduler {
    state: AppState,
    config_path: PathBuf,
    registry: Arc<JobRegistry>,
}

impl Scheduler {
    pub fn new(state: AppState, config_path: impl Into<PathBuf>) -> Self {
        Self {
            state,
            config_path: config_path.into(),
            registry: Arc::new(JobRegistry::new()),
        }
    }

    /// Register all background jobs with their intervals.
    /// The returned reload job can be triggered on demand (SIGHUP) even when
    /// file watching is disabled.
    pub async fn register_jobs(&self) -> ConfigReloadJob {
        info!(target: "scheduler", "registering background jobs");
        let poll = &self.state.config.poll;

        self.registry
            .register(
                "feed-pass",
                FeedPassJob::new(self.state.pass.clone()),
                poll.interval(),
            )
            .await;

        let reload = ConfigReloadJob::new(&self.config_path, self.state.registry.clone())
            .with_running_config(self.state.config.clone());
        let reload_config = &self.state.config.reload;
        if reload_config.enabled {
            self.registry
                .register(
                    "config-reload",
                    reload.clone(),
                    Duration::from_secs(reload_config.poll_seconds.max(1)),
                )
                .await;
        } else {
            info!(target: "scheduler", "config file watching disabled");
        }

        info!(target: "scheduler", "all jobs registered");
        reload
    }

    /// Start the scheduler and return a handle to the background task
    pub fn start(self) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let handles = registry.start().await;
            for handle in handles {
                let _ = handle.await;
            }
        })
    }
}

// Re-export key types for convenience
pub use job::{Job, JobContext, JobResult};
