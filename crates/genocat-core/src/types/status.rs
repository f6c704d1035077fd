//! Entity lifecycle status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Lifecycle status of a catalog entity.
///
/// Entities are created `Ready`. Soft deletion moves them through
/// `Trashed` to `Deleted`; hard deletion through `PendingDelete` to
/// `Deleted`. `Invalid` is set automatically when a referenced member
/// changes (e.g. a sample is removed from a cohort). The `Stage`,
/// `Missing` and `Removed` states apply to files only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    /// Normal, usable state.
    Ready,
    /// Soft-deleted; still recoverable.
    Trashed,
    /// Queued for hard deletion.
    PendingDelete,
    /// Terminal deleted state.
    Deleted,
    /// A referenced member changed under this entity.
    Invalid,
    /// File only: registered but content not yet present.
    Stage,
    /// File only: content expected but not found on disk.
    Missing,
    /// File only: external file that has been unlinked.
    Removed,
}

impl EntityStatus {
    /// Whether the entity is visible to regular read operations.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ready | Self::Invalid | Self::Stage)
    }

    /// Whether the transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: EntityStatus) -> bool {
        match (self, next) {
            (Self::Ready, Self::Trashed | Self::PendingDelete | Self::Invalid) => true,
            (Self::Trashed, Self::Deleted | Self::Ready) => true,
            (Self::PendingDelete, Self::Deleted) => true,
            (Self::Invalid, Self::Ready | Self::Trashed) => true,
            (Self::Stage, Self::Ready | Self::Missing | Self::Deleted) => true,
            (Self::Missing, Self::Ready | Self::Deleted) => true,
            (Self::Ready, Self::Missing | Self::Removed) => true,
            _ => false,
        }
    }

    /// Return the status in its canonical textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Trashed => "TRASHED",
            Self::PendingDelete => "PENDING_DELETE",
            Self::Deleted => "DELETED",
            Self::Invalid => "INVALID",
            Self::Stage => "STAGE",
            Self::Missing => "MISSING",
            Self::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "TRASHED" => Ok(Self::Trashed),
            "PENDING_DELETE" => Ok(Self::PendingDelete),
            "DELETED" => Ok(Self::Deleted),
            "INVALID" => Ok(Self::Invalid),
            "STAGE" => Ok(Self::Stage),
            "MISSING" => Ok(Self::Missing),
            "REMOVED" => Ok(Self::Removed),
            _ => Err(CatalogError::invalid_argument(format!(
                "Unknown entity status '{s}'"
            ))),
        }
    }
}
