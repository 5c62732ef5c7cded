// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;

/// Execution context handed to a job on every tick
#[derive(Clone)]
pub struct JobContext {
    pub job_id: String,
    /// 1-based count of executions of this job since the scheduler started
    pub run: u64,
    pub execution_time: DateTime<Utc>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, run: u64) -> Self {
        Self {
            job_id: job_id.into(),
            run,
            execution_time: Utc::now(),
        }
    }
}

/// Outcome of one execution. Failures are logged; the job simply runs again on its next tick.
#[derive(Debug)]
pub enum JobResult {
    Success,
    Skipped { reason: String },
    Failure { error: String },
}

/// A unit of periodic background work
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Stable identifier used in logs
    fn job_type(&self) -> &'static str;

    fn name(&self) -> String;

    async fn execute(&self, ctx: JobContext) -> Result<JobResult>;

    /// Run on the first tick right away instead of waiting one full interval
    fn runs_at_startup(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("type", &self.job_type())
            .field("name", &self.name())
            .finish()
    }
}
