//! The job model exchanged between the catalog and the scheduler bridge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::id::{JobId, StudyId};
use genocat_core::types::record::{EntityKind, EntityRecord};
use genocat_core::types::status::EntityStatus;

/// Execution state of a job as tracked by the catalog. The scheduler
/// remains the source of truth; this state is reconciled from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created, not yet handed to the scheduler.
    Prepared,
    /// Accepted by the scheduler queue.
    Queued,
    /// Running on an execution node.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
}

impl ExecutionStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Prepared => "PREPARED",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        };
        write!(f, "{text}")
    }
}

/// A catalog job: one tool invocation submitted to the batch scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job id.
    pub id: JobId,
    /// Job name, unique within the study.
    pub name: String,
    /// Enclosing study.
    pub study_id: StudyId,
    /// Tool executed by this job.
    pub tool_name: String,
    /// Directory receiving the scheduler log files and tool output.
    pub out_dir: String,
    /// Command line passed to the scheduler verbatim.
    pub command_line: String,
    /// Explicit queue; `None` selects by tool from the configuration.
    pub queue: Option<String>,
    /// Reconciled execution state.
    pub execution_status: ExecutionStatus,
    /// Whether the job's results were ever retrieved.
    pub visited: bool,
    /// Creation time.
    pub creation_date: DateTime<Utc>,
}

/// Kind-specific payload persisted inside the entity record.
#[derive(Debug, Serialize, Deserialize)]
struct JobAttributes {
    tool_name: String,
    out_dir: String,
    command_line: String,
    queue: Option<String>,
    execution_status: ExecutionStatus,
}

impl Job {
    /// Build a new `Prepared` job; the id is assigned on creation.
    pub fn new(
        name: impl Into<String>,
        study_id: StudyId,
        tool_name: impl Into<String>,
        out_dir: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(0),
            name: name.into(),
            study_id,
            tool_name: tool_name.into(),
            out_dir: out_dir.into(),
            command_line: command_line.into(),
            queue: None,
            execution_status: ExecutionStatus::Prepared,
            visited: false,
            creation_date: Utc::now(),
        }
    }

    /// Render as a generic entity record for the adaptor.
    pub fn to_record(&self) -> CatalogResult<EntityRecord> {
        let attributes = serde_json::to_value(JobAttributes {
            tool_name: self.tool_name.clone(),
            out_dir: self.out_dir.clone(),
            command_line: self.command_line.clone(),
            queue: self.queue.clone(),
            execution_status: self.execution_status,
        })?;
        Ok(EntityRecord {
            id: self.id.get(),
            kind: EntityKind::Job,
            study_id: Some(self.study_id.get()),
            name: self.name.clone(),
            path: None,
            status: EntityStatus::Ready,
            visited: Some(self.visited),
            creation_date: self.creation_date,
            attributes,
        })
    }

    /// Rebuild a job from its entity record.
    pub fn from_record(record: &EntityRecord) -> CatalogResult<Self> {
        if record.kind != EntityKind::Job {
            return Err(CatalogError::invalid_argument(format!(
                "Expected a job record, got {}",
                record.kind
            )));
        }
        let study_id = record.study_id.ok_or_else(|| {
            CatalogError::invalid_argument(format!("Job {} has no study", record.id))
        })?;
        let attributes: JobAttributes = serde_json::from_value(record.attributes.clone())?;
        Ok(Self {
            id: JobId::new(record.id),
            name: record.name.clone(),
            study_id: StudyId::new(study_id),
            tool_name: attributes.tool_name,
            out_dir: attributes.out_dir,
            command_line: attributes.command_line,
            queue: attributes.queue,
            execution_status: attributes.execution_status,
            visited: record.visited.unwrap_or(false),
            creation_date: record.creation_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let mut job = Job::new(
            "align-1",
            StudyId::new(42),
            "bwa",
            "/data/jobs/align-1",
            "bwa mem ref.fa reads.fq",
        );
        job.id = JobId::new(1001);
        job.queue = Some("fast.q".to_string());

        let record = job.to_record().unwrap();
        assert_eq!(record.kind, EntityKind::Job);
        assert_eq!(record.visited, Some(false));

        let back = Job::from_record(&record).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_non_job_record_is_rejected() {
        let record = EntityRecord::new(EntityKind::Sample, Some(1), "s1");
        assert!(Job::from_record(&record).is_err());
    }
}
