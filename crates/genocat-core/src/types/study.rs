//! The per-study configuration document and its batch-operation history.
//!
//! The configuration is read-mostly and mutated only while holding the
//! study lock. It carries the name↔id bimaps for samples, files and
//! cohorts, the set of indexed files, the samples contained in each file,
//! and a monotonic timestamp used for optimistic cached reads.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::result::CatalogResult;
use crate::types::id::{CohortId, FileId, SampleId, StudyId};

/// Per-study configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfiguration {
    /// Study id.
    pub study_id: StudyId,
    /// Study name.
    pub study_name: String,
    /// Sample name → id. Kept invertible; see [`StudyConfiguration::check`].
    pub sample_ids: HashMap<String, SampleId>,
    /// File name → id.
    pub file_ids: HashMap<String, FileId>,
    /// Cohort name → id.
    pub cohort_ids: HashMap<String, CohortId>,
    /// Files whose content has been indexed.
    pub indexed_files: BTreeSet<FileId>,
    /// Samples contained in each file, in declaration order.
    pub samples_in_files: HashMap<FileId, Vec<SampleId>>,
    /// Variable sets usable for annotations in this study.
    #[serde(default)]
    pub variable_sets: Vec<VariableSet>,
    /// Append-only batch-operation history.
    pub batches: Vec<BatchOperation>,
    /// Monotonic timestamp (milliseconds) bumped on every persisted update.
    pub timestamp: i64,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl StudyConfiguration {
    /// Create an empty configuration for a study.
    pub fn new(study_id: StudyId, study_name: impl Into<String>) -> Self {
        Self {
            study_id,
            study_name: study_name.into(),
            sample_ids: HashMap::new(),
            file_ids: HashMap::new(),
            cohort_ids: HashMap::new(),
            indexed_files: BTreeSet::new(),
            samples_in_files: HashMap::new(),
            variable_sets: Vec::new(),
            batches: Vec::new(),
            timestamp: 0,
            attributes: serde_json::Value::Null,
        }
    }

    /// Invert a name→id map. The result is smaller than the input when the
    /// map holds duplicated ids.
    pub fn inverse_map<I: Copy + Eq + std::hash::Hash>(
        map: &HashMap<String, I>,
    ) -> HashMap<I, String> {
        map.iter().map(|(name, id)| (*id, name.clone())).collect()
    }

    /// Validate the bimap invariants of this configuration.
    pub fn check(&self) -> CatalogResult<()> {
        if self.study_id.get() < 0 {
            return Err(CatalogError::invalid_argument(format!(
                "Invalid studyId: {}",
                self.study_id
            )));
        }
        if self.file_ids.len() != Self::inverse_map(&self.file_ids).len() {
            return Err(CatalogError::precondition(format!(
                "Study configuration {} has duplicated fileIds",
                self.study_name
            )));
        }
        if self.cohort_ids.len() != Self::inverse_map(&self.cohort_ids).len() {
            return Err(CatalogError::precondition(format!(
                "Study configuration {} has duplicated cohortIds",
                self.study_name
            )));
        }
        Ok(())
    }
}

/// A set of typed variables usable for entity annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSet {
    /// Variable-set id, unique within the study.
    pub id: i64,
    /// Variable-set name.
    pub name: String,
    /// Confidential variable sets are only visible with the dedicated
    /// study permission.
    #[serde(default)]
    pub confidential: bool,
    /// Variable definitions.
    #[serde(default)]
    pub variables: serde_json::Value,
}

/// Status of a batch operation, tracked as an append-only history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Never started.
    Ready,
    /// In progress.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error; may be resumed.
    Error,
}

/// The kind of work a batch operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    /// Loading file content into the store.
    Load,
    /// Removing previously loaded content.
    Remove,
    /// Anything else (annotation, statistics, ...).
    Other,
}

/// A named, typed unit of work over a set of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    /// Operation name (e.g. `load`, `annotate`).
    pub operation_name: String,
    /// Files processed by this batch.
    pub file_ids: Vec<FileId>,
    /// Creation time (milliseconds since the epoch).
    pub timestamp: i64,
    /// Operation kind.
    pub kind: BatchKind,
    /// Chronologically ordered status history.
    pub status: Vec<(DateTime<Utc>, BatchStatus)>,
}

impl BatchOperation {
    /// Create a new operation with an empty status history.
    pub fn new(
        operation_name: impl Into<String>,
        file_ids: Vec<FileId>,
        timestamp: i64,
        kind: BatchKind,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            file_ids,
            timestamp,
            kind,
            status: Vec::new(),
        }
    }

    /// The most recent status, or `Ready` if the operation never started.
    pub fn current_status(&self) -> BatchStatus {
        self.status
            .last()
            .map(|(_, s)| *s)
            .unwrap_or(BatchStatus::Ready)
    }

    /// Append a status change.
    pub fn add_status(&mut self, date: DateTime<Utc>, status: BatchStatus) {
        self.status.push((date, status));
    }

    /// Whether this record describes the same `(name, files, type)` work.
    pub fn same_operation(&self, file_ids: &[FileId], kind: BatchKind, name: &str) -> bool {
        self.operation_name == name && self.kind == kind && self.file_ids == file_ids
    }
}
