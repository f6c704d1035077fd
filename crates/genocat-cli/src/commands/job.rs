//! Job subcommands.

use clap::Subcommand;

use genocat_catalog::resolver::split_reference_list;
use genocat_core::result::CatalogResult;
use genocat_core::types::id::JobId;
use genocat_entity::job::{ExecutionStatus, Job};
use genocat_entity::permission::StudyPermission;

use crate::output::print_json;

use super::CliContext;

/// Job submission and reconciliation.
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Submit a job to the batch scheduler.
    Submit {
        /// Study the job belongs to.
        #[arg(long)]
        study: String,
        /// Job name, unique within the study.
        #[arg(long)]
        name: String,
        /// Tool to execute.
        #[arg(long)]
        tool: String,
        /// Directory receiving the scheduler log files.
        #[arg(long)]
        outdir: String,
        /// Command line, passed to the scheduler verbatim.
        #[arg(long)]
        command: String,
        /// Explicit queue; defaults to the tool→queue mapping.
        #[arg(long)]
        queue: Option<String>,
    },
    /// Reconcile a job's scheduler state.
    Status {
        /// Job reference (id or name).
        job: String,
        #[arg(long)]
        study: Option<String>,
    },
    /// Fetch jobs by reference, preserving input order.
    Info {
        /// Comma-separated job references.
        jobs: String,
        #[arg(long)]
        study: Option<String>,
        /// Convert per-item failures into per-item error results.
        #[arg(long)]
        silent: bool,
    },
    /// Mark a job as visited.
    Visit {
        job: String,
        #[arg(long)]
        study: Option<String>,
    },
    /// Search jobs in a study.
    Search {
        #[arg(long)]
        study: String,
        #[arg(long)]
        name: Option<String>,
    },
}

impl JobCommand {
    /// Run the command.
    pub async fn run(self, context: &CliContext) -> CatalogResult<()> {
        let user = context.user.as_str();
        match self {
            Self::Submit {
                study,
                name,
                tool,
                outdir,
                command,
                queue,
            } => {
                let study_id = context.resolver.study_id(user, &study).await?;
                context
                    .authz
                    .check_study_permission(study_id, user, StudyPermission::CreateJobs)
                    .await?;

                let mut job = Job::new(&name, study_id, &tool, &outdir, &command);
                job.queue = queue.clone();
                job.execution_status = ExecutionStatus::Queued;
                let id = context.adaptor.create_entity(&job.to_record()?).await?;
                job.id = JobId::new(id);

                context
                    .bridge
                    .queue_job(
                        &tool,
                        &id.to_string(),
                        &outdir,
                        &command,
                        queue.as_deref(),
                    )
                    .await?;
                print_json(&job)
            }
            Self::Status { job, study } => {
                let resource = context
                    .resolver
                    .entity_id(
                        user,
                        genocat_core::types::record::EntityKind::Job,
                        &job,
                        study.as_deref(),
                    )
                    .await?;
                let status = context.bridge.status(&resource.id.to_string()).await?;
                println!("{status}");
                Ok(())
            }
            Self::Info {
                jobs,
                study,
                silent,
            } => {
                let references = split_reference_list(&jobs);
                let results = context
                    .jobs
                    .get(user, &references, study.as_deref(), silent)
                    .await?;
                print_json(&results)
            }
            Self::Visit { job, study } => {
                let result = context.jobs.visit(user, &job, study.as_deref()).await?;
                print_json(&result)
            }
            Self::Search { study, name } => {
                let result = context.jobs.search(user, &study, name.as_deref()).await?;
                print_json(&result)
            }
        }
    }
}
