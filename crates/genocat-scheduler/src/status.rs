//! Scheduler state mapping.

use std::fmt;

use genocat_core::traits::TerminatedJob;

/// Job state as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerJobStatus {
    /// Running on an execution node (`r`).
    Running,
    /// Being transferred to a node (`t`).
    Transferred,
    /// Waiting in the queue (`qw`).
    Queued,
    /// In an error queue state (`Eqw`).
    Error,
    /// Finished with exit status 0.
    Finished,
    /// Finished with a non-zero exit status.
    ExecutionError,
    /// The queue failed the job before or during execution.
    QueueError,
    /// Neither the active queue nor the post-mortem probe knows the job.
    Unknown,
}

impl SchedulerJobStatus {
    /// Map a raw active-queue state to a bridge state. The table is fixed:
    /// `r`, `t`, `qw`, `Eqw`.
    pub fn from_active_state(state: &str) -> Option<Self> {
        match state {
            "r" => Some(Self::Running),
            "t" => Some(Self::Transferred),
            "qw" => Some(Self::Queued),
            "Eqw" => Some(Self::Error),
            _ => None,
        }
    }

    /// Classify a post-mortem accounting record: a non-zero `failed` field
    /// is a queue error, exit status 0 is a clean finish, anything else is
    /// an execution error.
    pub fn from_terminated(record: &TerminatedJob) -> Self {
        if record.failed != "0" {
            Self::QueueError
        } else if record.exit_status == "0" {
            Self::Finished
        } else {
            Self::ExecutionError
        }
    }

    /// Whether the job is past execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::ExecutionError | Self::QueueError
        )
    }
}

impl fmt::Display for SchedulerJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Running => "RUNNING",
            Self::Transferred => "TRANSFERRED",
            Self::Queued => "QUEUED",
            Self::Error => "ERROR",
            Self::Finished => "FINISHED",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::QueueError => "QUEUE_ERROR",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_state_table() {
        assert_eq!(
            SchedulerJobStatus::from_active_state("r"),
            Some(SchedulerJobStatus::Running)
        );
        assert_eq!(
            SchedulerJobStatus::from_active_state("t"),
            Some(SchedulerJobStatus::Transferred)
        );
        assert_eq!(
            SchedulerJobStatus::from_active_state("qw"),
            Some(SchedulerJobStatus::Queued)
        );
        assert_eq!(
            SchedulerJobStatus::from_active_state("Eqw"),
            Some(SchedulerJobStatus::Error)
        );
        assert_eq!(SchedulerJobStatus::from_active_state("dr"), None);
    }

    fn record(exit_status: &str, failed: &str) -> TerminatedJob {
        TerminatedJob {
            exit_status: exit_status.to_string(),
            failed: failed.to_string(),
        }
    }

    #[test]
    fn test_post_mortem_classification() {
        assert_eq!(
            SchedulerJobStatus::from_terminated(&record("0", "0")),
            SchedulerJobStatus::Finished
        );
        assert_eq!(
            SchedulerJobStatus::from_terminated(&record("1", "0")),
            SchedulerJobStatus::ExecutionError
        );
        assert_eq!(
            SchedulerJobStatus::from_terminated(&record("0", "25 : rescheduling")),
            SchedulerJobStatus::QueueError
        );
    }
}
