//! The SGE implementation of the batch-scheduler interface, driving the
//! `qsub`, `qstat` and `qacct` binaries as child processes.

use async_trait::async_trait;
use tokio::process::Command;

use genocat_core::config::SchedulerConfig;
use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::{ActiveJob, BatchScheduler, SchedulerSubmission, TerminatedJob};

use crate::qacct::parse_accounting;
use crate::qstat::parse_active_jobs;

/// Batch scheduler backed by the SGE command-line tools.
#[derive(Debug, Clone)]
pub struct SgeScheduler {
    config: SchedulerConfig,
}

impl SgeScheduler {
    /// Create a scheduler over the configured binaries.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Run a scheduler binary and capture its stdout. Invocation failures
    /// and timeouts surface as `Internal`.
    async fn run(&self, binary: &str, args: &[&str]) -> CatalogResult<std::process::Output> {
        let future = Command::new(binary)
            .args(args)
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.config.probe_timeout(), future).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(CatalogError::with_source(
                genocat_core::error::ErrorKind::Internal,
                format!("Failed to invoke {binary}: {e}"),
                e,
            )),
            Err(_) => Err(CatalogError::internal(format!(
                "{binary} did not answer within {:?}",
                self.config.probe_timeout()
            ))),
        }
    }
}

#[async_trait]
impl BatchScheduler for SgeScheduler {
    async fn submit(&self, submission: &SchedulerSubmission) -> CatalogResult<()> {
        let mut args: Vec<&str> = vec![
            "-V",
            "-N",
            &submission.job_name,
            "-o",
            &submission.stdout_path,
            "-e",
            &submission.stderr_path,
            "-q",
            &submission.queue,
            "-b",
            "y",
        ];
        args.extend(submission.command_line.split_whitespace());

        tracing::info!(
            job = submission.job_name,
            queue = submission.queue,
            "Enqueuing job: {} {}",
            self.config.qsub_binary,
            args.join(" ")
        );

        let output = self.run(&self.config.qsub_binary, &args).await?;
        if !output.status.success() {
            return Err(CatalogError::internal(format!(
                "{} rejected job {}: {}",
                self.config.qsub_binary,
                submission.job_name,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn query_active(&self) -> CatalogResult<Vec<ActiveJob>> {
        let output = self.run(&self.config.qstat_binary, &["-xml"]).await?;
        if !output.status.success() {
            return Err(CatalogError::internal(format!(
                "{} -xml failed: {}",
                self.config.qstat_binary,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_active_jobs(&String::from_utf8_lossy(&output.stdout))
    }

    async fn query_terminated(&self, job_id: &str) -> CatalogResult<Option<TerminatedJob>> {
        let output = self
            .run(&self.config.qacct_binary, &["-j", job_id])
            .await?;
        // qacct exits non-zero when it has no accounting record yet.
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_accounting(&String::from_utf8_lossy(&output.stdout)))
    }
}
