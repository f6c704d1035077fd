//! The external batch-scheduler interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::CatalogResult;

/// A fully rendered scheduler submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSubmission {
    /// Scheduler job name.
    pub job_name: String,
    /// Target queue.
    pub queue: String,
    /// File receiving the job's stdout.
    pub stdout_path: String,
    /// File receiving the job's stderr.
    pub stderr_path: String,
    /// The command line, passed through verbatim.
    pub command_line: String,
}

/// One job visible in the scheduler's active queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJob {
    /// Scheduler job name.
    pub name: String,
    /// Raw scheduler state letter(s) (`r`, `t`, `qw`, `Eqw`, ...).
    pub state: String,
}

/// Post-mortem accounting record of a terminated job.
///
/// Both fields keep the scheduler's raw textual form; classification
/// happens in the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminatedJob {
    /// Raw `exit_status` field.
    pub exit_status: String,
    /// Raw `failed` field.
    pub failed: String,
}

/// External batch scheduler. Submissions are fire-and-forget; the scheduler
/// remains the source of truth for job state.
#[async_trait]
pub trait BatchScheduler: Send + Sync + 'static {
    /// Submit a job. Returns as soon as the scheduler accepted it.
    async fn submit(&self, submission: &SchedulerSubmission) -> CatalogResult<()>;

    /// Snapshot of the active queue.
    async fn query_active(&self) -> CatalogResult<Vec<ActiveJob>>;

    /// Post-mortem record for a terminated job, if the scheduler still has
    /// accounting data for it.
    async fn query_terminated(&self, job_id: &str) -> CatalogResult<Option<TerminatedJob>>;
}
