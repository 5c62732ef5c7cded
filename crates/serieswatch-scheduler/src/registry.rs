// SPDX-License-Identifier: GPL-3.0-or-later
use crate::job::{Job, JobContext, JobResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Registered job with its interval
struct RegisteredJob {
    job: Arc<dyn Job>,
    every: Duration,
}

/// Job registry that runs each registered job on its own fixed interval.
///
/// Executions of one job never overlap: a tick that comes due while the
/// previous run is still going is delayed, not queued.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, RegisteredJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a job to run every `every`
    pub async fn register(&self, job_id: impl Into<String>, job: impl Job + 'static, every: Duration) {
        let job_id = job_id.into();
        let registered = RegisteredJob {
            job: Arc::new(job) as Arc<dyn Job>,
            every,
        };

        let mut jobs = self.jobs.write().await;
        info!(target: "scheduler", %job_id, job_type = registered.job.job_type(), ?every, "registering job");
        jobs.insert(job_id, registered);
    }

    pub async fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Spawn one ticker task per registered job
    pub async fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let jobs = self.jobs.read().await;
        let mut handles = Vec::with_capacity(jobs.len());

        for (job_id, registered) in jobs.iter() {
            let job_id = job_id.clone();
            let job = registered.job.clone();
            let every = registered.every;

            handles.push(tokio::spawn(async move {
                let start = if job.runs_at_startup() {
                    Instant::now()
                } else {
                    Instant::now() + every
                };
                let mut ticker = interval_at(start, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                let mut run = 0;
                loop {
                    ticker.tick().await;
                    run += 1;
                    Self::execute_job(&job_id, &job, run).await;
                }
            }));
        }

        info!(target: "scheduler", "job registry started with {} jobs", jobs.len());
        handles
    }

    /// Execute a single run of a job and log how it went
    pub(crate) async fn execute_job(job_id: &str, job: &Arc<dyn Job>, run: u64) {
        let ctx = JobContext::new(job_id, run);
        info!(target: "scheduler", %job_id, job_type = job.job_type(), run, "executing job");

        match job.execute(ctx).await {
            Ok(JobResult::Success) => {
                info!(target: "scheduler", %job_id, run, "job completed successfully");
            }
            Ok(JobResult::Skipped { reason }) => {
                info!(target: "scheduler", %job_id, run, %reason, "job skipped");
            }
            Ok(JobResult::Failure { error }) => {
                warn!(target: "scheduler", %job_id, run, %error, "job failed");
            }
            Err(err) => {
                error!(target: "scheduler", %job_id, run, error = %err, "job execution error");
            }
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
