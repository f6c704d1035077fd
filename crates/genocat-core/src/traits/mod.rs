//! Abstract interfaces implemented outside the core.

pub mod adaptor;
pub mod scheduler;

pub use self::adaptor::{LockToken, MetadataAdaptor};
pub use self::scheduler::{ActiveJob, BatchScheduler, SchedulerSubmission, TerminatedJob};
