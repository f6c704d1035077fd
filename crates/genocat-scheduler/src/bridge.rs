//! The scheduler bridge: logical submissions in, reconciled states out.

use std::sync::Arc;

use genocat_core::config::SchedulerConfig;
use genocat_core::result::CatalogResult;
use genocat_core::traits::{BatchScheduler, SchedulerSubmission};

use crate::status::SchedulerJobStatus;

/// Translates logical job submissions into scheduler commands and
/// reconciles external scheduler state. Submissions are fire-and-forget;
/// the scheduler is the source of truth.
#[derive(Clone)]
pub struct SchedulerBridge {
    scheduler: Arc<dyn BatchScheduler>,
    config: SchedulerConfig,
}

impl SchedulerBridge {
    /// Create a bridge over a scheduler implementation.
    pub fn new(scheduler: Arc<dyn BatchScheduler>, config: SchedulerConfig) -> Self {
        Self { scheduler, config }
    }

    /// Scheduler job name: `tool_jobid`, with spaces flattened.
    fn job_name(tool_name: &str, job_id: &str) -> String {
        format!("{}_{job_id}", tool_name.replace(' ', "_"))
    }

    /// Submit a job. Without an explicit queue, the queue is selected from
    /// the tool→queue configuration mapping.
    pub async fn queue_job(
        &self,
        tool_name: &str,
        job_id: &str,
        out_dir: &str,
        command_line: &str,
        queue: Option<&str>,
    ) -> CatalogResult<()> {
        let queue = queue
            .unwrap_or_else(|| self.config.queue_for_tool(tool_name))
            .to_string();
        tracing::info!(tool = tool_name, queue = %queue, "Selected queue for job {job_id}");

        let submission = SchedulerSubmission {
            job_name: Self::job_name(tool_name, job_id),
            queue,
            stdout_path: format!("{out_dir}/sge_out.log"),
            stderr_path: format!("{out_dir}/sge_err.log"),
            command_line: command_line.to_string(),
        };
        self.scheduler.submit(&submission).await
    }

    /// Reconcile the state of a job.
    ///
    /// The active queue is probed first; a job whose name contains the id
    /// is mapped through the fixed state table. Jobs absent from the
    /// active queue are classified through the post-mortem probe.
    /// `Unknown` is returned only when neither probe yields data.
    pub async fn status(&self, job_id: &str) -> CatalogResult<SchedulerJobStatus> {
        let active = self.scheduler.query_active().await?;
        if let Some(job) = active.iter().find(|job| job.name.contains(job_id)) {
            return SchedulerJobStatus::from_active_state(&job.state).ok_or_else(|| {
                genocat_core::error::CatalogError::malformed(format!(
                    "Unknown scheduler state '{}' for job {job_id}",
                    job.state
                ))
            });
        }

        match self.scheduler.query_terminated(job_id).await? {
            Some(record) => Ok(SchedulerJobStatus::from_terminated(&record)),
            None => Ok(SchedulerJobStatus::Unknown),
        }
    }
}

impl std::fmt::Debug for SchedulerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBridge").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use genocat_core::config::QueueConfig;
    use genocat_core::traits::{ActiveJob, TerminatedJob};

    #[derive(Default)]
    struct RecordingScheduler {
        submissions: Mutex<Vec<SchedulerSubmission>>,
        active: Vec<ActiveJob>,
        terminated: HashMap<String, TerminatedJob>,
    }

    #[async_trait]
    impl BatchScheduler for RecordingScheduler {
        async fn submit(&self, submission: &SchedulerSubmission) -> CatalogResult<()> {
            self.submissions.lock().unwrap().push(submission.clone());
            Ok(())
        }

        async fn query_active(&self) -> CatalogResult<Vec<ActiveJob>> {
            Ok(self.active.clone())
        }

        async fn query_terminated(&self, job_id: &str) -> CatalogResult<Option<TerminatedJob>> {
            Ok(self.terminated.get(job_id).cloned())
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            default_queue: "default.q".to_string(),
            available_queues: vec!["fast.q".to_string()],
            queues: HashMap::from([(
                "fast.q".to_string(),
                QueueConfig {
                    tools: vec!["bwa".to_string()],
                },
            )]),
            qsub_binary: "qsub".to_string(),
            qstat_binary: "qstat".to_string(),
            qacct_binary: "qacct".to_string(),
            probe_timeout_ms: 10_000,
        }
    }

    #[tokio::test]
    async fn test_submission_renders_the_fixed_template() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let bridge = SchedulerBridge::new(scheduler.clone(), config());

        bridge
            .queue_job("bwa mem", "1001", "/data/jobs/1001", "bwa mem ref.fa", None)
            .await
            .unwrap();

        let submissions = scheduler.submissions.lock().unwrap();
        let s = &submissions[0];
        assert_eq!(s.job_name, "bwa_mem_1001");
        assert_eq!(s.stdout_path, "/data/jobs/1001/sge_out.log");
        assert_eq!(s.stderr_path, "/data/jobs/1001/sge_err.log");
        assert_eq!(s.command_line, "bwa mem ref.fa");
        // "bwa mem" is not in fast.q's tool list, so the default is used.
        assert_eq!(s.queue, "default.q");
    }

    #[tokio::test]
    async fn test_tool_queue_mapping_and_explicit_queue() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let bridge = SchedulerBridge::new(scheduler.clone(), config());

        bridge
            .queue_job("bwa", "1", "/out", "bwa", None)
            .await
            .unwrap();
        bridge
            .queue_job("bwa", "2", "/out", "bwa", Some("slow.q"))
            .await
            .unwrap();

        let submissions = scheduler.submissions.lock().unwrap();
        assert_eq!(submissions[0].queue, "fast.q");
        assert_eq!(submissions[1].queue, "slow.q");
    }

    #[tokio::test]
    async fn test_status_prefers_the_active_queue() {
        let scheduler = Arc::new(RecordingScheduler {
            active: vec![ActiveJob {
                name: "bwa_1001".to_string(),
                state: "qw".to_string(),
            }],
            ..Default::default()
        });
        let bridge = SchedulerBridge::new(scheduler, config());

        assert_eq!(
            bridge.status("1001").await.unwrap(),
            SchedulerJobStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_status_falls_back_to_post_mortem() {
        let scheduler = Arc::new(RecordingScheduler {
            terminated: HashMap::from([(
                "1001".to_string(),
                TerminatedJob {
                    exit_status: "0".to_string(),
                    failed: "0".to_string(),
                },
            )]),
            ..Default::default()
        });
        let bridge = SchedulerBridge::new(scheduler, config());

        assert_eq!(
            bridge.status("1001").await.unwrap(),
            SchedulerJobStatus::Finished
        );
        assert_eq!(
            bridge.status("9999").await.unwrap(),
            SchedulerJobStatus::Unknown
        );
    }
}
