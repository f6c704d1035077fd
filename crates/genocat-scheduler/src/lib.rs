//! # genocat-scheduler
//!
//! The bridge between logical job submissions and the SGE batch scheduler:
//! queue selection by tool, `qsub` submission, active-queue probing
//! (`qstat -xml`) and the `qacct` post-mortem probe used to classify
//! terminal outcomes.

pub mod bridge;
pub mod qacct;
pub mod qstat;
pub mod sge;
pub mod status;

pub use bridge::SchedulerBridge;
pub use sge::SgeScheduler;
pub use status::SchedulerJobStatus;
