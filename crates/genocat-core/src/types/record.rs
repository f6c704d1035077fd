//! Generic entity records exchanged with the metadata adaptor.
//!
//! Every catalog entity is persisted as one document; the adaptor exposes a
//! uniform record carrying the fields the core needs (identity, naming,
//! lifecycle, the file path for the ACL walk) plus a free-form payload for
//! kind-specific attributes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::types::status::EntityStatus;

/// The kind of a catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Study,
    File,
    Sample,
    Individual,
    Cohort,
    Dataset,
    Panel,
    Job,
}

impl EntityKind {
    /// Kinds that can carry entity-level ACLs.
    pub const ACL_KINDS: [EntityKind; 8] = [
        Self::Study,
        Self::File,
        Self::Sample,
        Self::Individual,
        Self::Cohort,
        Self::Dataset,
        Self::Panel,
        Self::Job,
    ];

    /// Return the kind in its canonical lowercase form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Study => "study",
            Self::File => "file",
            Self::Sample => "sample",
            Self::Individual => "individual",
            Self::Cohort => "cohort",
            Self::Dataset => "dataset",
            Self::Panel => "panel",
            Self::Job => "job",
        }
    }

    /// Capitalized label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Study => "Study",
            Self::File => "File",
            Self::Sample => "Sample",
            Self::Individual => "Individual",
            Self::Cohort => "Cohort",
            Self::Dataset => "Dataset",
            Self::Panel => "Panel",
            Self::Job => "Job",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "study" => Ok(Self::Study),
            "file" | "folder" => Ok(Self::File),
            "sample" => Ok(Self::Sample),
            "individual" => Ok(Self::Individual),
            "cohort" => Ok(Self::Cohort),
            "dataset" => Ok(Self::Dataset),
            "panel" | "disease-panel" => Ok(Self::Panel),
            "job" => Ok(Self::Job),
            _ => Err(CatalogError::invalid_argument(format!(
                "Unknown entity kind '{s}'"
            ))),
        }
    }
}

/// One persisted catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Numeric id, unique across the catalog, above the configured offset.
    pub id: i64,
    /// Entity kind.
    pub kind: EntityKind,
    /// Enclosing study; `None` for projects and studies themselves.
    pub study_id: Option<i64>,
    /// Name, unique within the study for its kind.
    pub name: String,
    /// Path relative to the study root. Files only; folders end with `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Whether the entity has been visited. Jobs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
    /// Creation time.
    pub creation_date: DateTime<Utc>,
    /// Kind-specific payload (e.g. the job command line, sample source).
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl EntityRecord {
    /// Create a minimal `Ready` record; the id is assigned by the adaptor.
    pub fn new(kind: EntityKind, study_id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            study_id,
            name: name.into(),
            path: None,
            status: EntityStatus::Ready,
            visited: if kind == EntityKind::Job {
                Some(false)
            } else {
                None
            },
            creation_date: Utc::now(),
            attributes: serde_json::Value::Null,
        }
    }

    /// Whether this record is a folder (a file whose path ends with `/`).
    pub fn is_folder(&self) -> bool {
        self.kind == EntityKind::File
            && self.path.as_deref().is_some_and(|p| p.ends_with('/'))
    }
}

/// Query over entity records. Empty fields do not constrain the search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Kind to search; required.
    pub kind: Option<EntityKind>,
    /// Restrict to these studies.
    pub study_ids: Vec<i64>,
    /// Match any of these names.
    pub names: Vec<String>,
    /// Match this exact path (files).
    pub path: Option<String>,
    /// Include soft-deleted entities.
    pub include_trashed: bool,
}

impl EntityQuery {
    /// Query for one kind.
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Restrict to a study.
    pub fn in_study(mut self, study_id: i64) -> Self {
        self.study_ids.push(study_id);
        self
    }

    /// Match a single name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Match any of the given names.
    pub fn named_any(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.names.extend(names);
        self
    }

    /// Match an exact path.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
