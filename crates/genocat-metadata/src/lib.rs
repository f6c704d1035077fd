//! # genocat-metadata
//!
//! The study metadata manager: a per-process cache of study configuration
//! documents with optimistic timestamp reads, the distributed study-lock
//! protocol, the batch-operation admission state machine, and the
//! file/sample admission checks run before loading a file into a study.

pub mod admission;
pub mod manager;
pub mod operations;

pub use admission::{check_and_update_study_configuration, check_new_file, FileSampleManifest};
pub use manager::{ReadOptions, StudyConfigurationManager};
pub use operations::{add_batch_operation, get_operation, set_status};
