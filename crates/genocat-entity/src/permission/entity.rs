//! Per-entity permission enums and their shared machinery.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use genocat_core::error::CatalogError;
use genocat_core::types::record::EntityKind;

use super::study::StudyPermission;

/// Shared behavior of every per-entity permission enum.
///
/// The `from_study` projection is the derivation table: each study
/// permission maps to at most one permission of each child kind.
pub trait EntityPermission:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr<Err = CatalogError>
    + Send
    + Sync
    + 'static
{
    /// The entity kind this permission applies to.
    const KIND: EntityKind;
    /// The read permission, used by list filtering.
    const VIEW: Self;
    /// The permission required to inspect or mutate ACLs.
    const SHARE: Self;
    /// The annotation-read permission, for annotation-bearing kinds.
    const VIEW_ANNOTATIONS: Option<Self>;

    /// Project a study-level permission onto this kind.
    fn from_study(permission: StudyPermission) -> Option<Self>;

    /// Every permission of this kind.
    fn all() -> &'static [Self];
}

macro_rules! entity_permissions {
    (
        $(#[$meta:meta])*
        $name:ident {
            kind: $kind:path,
            view_annotations: $va:expr,
            permissions: {
                $( $variant:ident = $text:literal, from: $study:ident; )+
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            /// Every permission of this kind.
            pub const ALL: &'static [$name] = &[ $( Self::$variant ),+ ];

            /// Canonical textual form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(CatalogError::invalid_argument(format!(
                        concat!("The permission {} is not a correct ", stringify!($name)),
                        s
                    ))),
                }
            }
        }

        impl EntityPermission for $name {
            const KIND: EntityKind = $kind;
            const VIEW: Self = Self::View;
            const SHARE: Self = Self::Share;
            const VIEW_ANNOTATIONS: Option<Self> = $va;

            fn from_study(permission: StudyPermission) -> Option<Self> {
                match permission {
                    $( StudyPermission::$study => Some(Self::$variant), )+
                    _ => None,
                }
            }

            fn all() -> &'static [Self] {
                Self::ALL
            }
        }
    };
}

entity_permissions! {
    /// Permissions on files and folders.
    FilePermission {
        kind: EntityKind::File,
        view_annotations: None,
        permissions: {
            View = "VIEW", from: ViewFiles;
            Update = "UPDATE", from: UpdateFiles;
            Delete = "DELETE", from: DeleteFiles;
            Download = "DOWNLOAD", from: DownloadFiles;
            Share = "SHARE", from: ShareFiles;
        }
    }
}

entity_permissions! {
    /// Permissions on jobs.
    JobPermission {
        kind: EntityKind::Job,
        view_annotations: None,
        permissions: {
            View = "VIEW", from: ViewJobs;
            Update = "UPDATE", from: UpdateJobs;
            Delete = "DELETE", from: DeleteJobs;
            Share = "SHARE", from: ShareJobs;
        }
    }
}

entity_permissions! {
    /// Permissions on samples.
    SamplePermission {
        kind: EntityKind::Sample,
        view_annotations: Some(Self::ViewAnnotations),
        permissions: {
            View = "VIEW", from: ViewSamples;
            Update = "UPDATE", from: UpdateSamples;
            Delete = "DELETE", from: DeleteSamples;
            Share = "SHARE", from: ShareSamples;
            CreateAnnotations = "CREATE_ANNOTATIONS", from: CreateSampleAnnotations;
            ViewAnnotations = "VIEW_ANNOTATIONS", from: ViewSampleAnnotations;
            UpdateAnnotations = "UPDATE_ANNOTATIONS", from: UpdateSampleAnnotations;
            DeleteAnnotations = "DELETE_ANNOTATIONS", from: DeleteSampleAnnotations;
        }
    }
}

entity_permissions! {
    /// Permissions on individuals.
    IndividualPermission {
        kind: EntityKind::Individual,
        view_annotations: Some(Self::ViewAnnotations),
        permissions: {
            View = "VIEW", from: ViewIndividuals;
            Update = "UPDATE", from: UpdateIndividuals;
            Delete = "DELETE", from: DeleteIndividuals;
            Share = "SHARE", from: ShareIndividuals;
            CreateAnnotations = "CREATE_ANNOTATIONS", from: CreateIndividualAnnotations;
            ViewAnnotations = "VIEW_ANNOTATIONS", from: ViewIndividualAnnotations;
            UpdateAnnotations = "UPDATE_ANNOTATIONS", from: UpdateIndividualAnnotations;
            DeleteAnnotations = "DELETE_ANNOTATIONS", from: DeleteIndividualAnnotations;
        }
    }
}

entity_permissions! {
    /// Permissions on cohorts.
    CohortPermission {
        kind: EntityKind::Cohort,
        view_annotations: Some(Self::ViewAnnotations),
        permissions: {
            View = "VIEW", from: ViewCohorts;
            Update = "UPDATE", from: UpdateCohorts;
            Delete = "DELETE", from: DeleteCohorts;
            Share = "SHARE", from: ShareCohorts;
            CreateAnnotations = "CREATE_ANNOTATIONS", from: CreateCohortAnnotations;
            ViewAnnotations = "VIEW_ANNOTATIONS", from: ViewCohortAnnotations;
            UpdateAnnotations = "UPDATE_ANNOTATIONS", from: UpdateCohortAnnotations;
            DeleteAnnotations = "DELETE_ANNOTATIONS", from: DeleteCohortAnnotations;
        }
    }
}

entity_permissions! {
    /// Permissions on datasets.
    DatasetPermission {
        kind: EntityKind::Dataset,
        view_annotations: None,
        permissions: {
            View = "VIEW", from: ViewDatasets;
            Update = "UPDATE", from: UpdateDatasets;
            Delete = "DELETE", from: DeleteDatasets;
            Share = "SHARE", from: ShareDatasets;
        }
    }
}

entity_permissions! {
    /// Permissions on disease panels.
    PanelPermission {
        kind: EntityKind::Panel,
        view_annotations: None,
        permissions: {
            View = "VIEW", from: ViewPanels;
            Update = "UPDATE", from: UpdatePanels;
            Delete = "DELETE", from: DeletePanels;
            Share = "SHARE", from: SharePanels;
        }
    }
}

impl EntityPermission for StudyPermission {
    const KIND: EntityKind = EntityKind::Study;
    const VIEW: Self = Self::ViewStudy;
    const SHARE: Self = Self::ShareStudy;
    const VIEW_ANNOTATIONS: Option<Self> = None;

    fn from_study(permission: StudyPermission) -> Option<Self> {
        Some(permission)
    }

    fn all() -> &'static [Self] {
        Self::ALL
    }
}
