//! Study-level permissions.
//!
//! This enum is the left-hand side of the derivation table: the per-entity
//! projections live in each entity permission's
//! [`EntityPermission::from_study`](super::entity::EntityPermission::from_study)
//! implementation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use genocat_core::error::CatalogError;

macro_rules! study_permissions {
    (
        $( $variant:ident = $text:literal ),+ $(,)?
    ) => {
        /// Permissions grantable at study level.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum StudyPermission {
            $( $variant ),+
        }

        impl StudyPermission {
            /// Every study permission.
            pub const ALL: &'static [StudyPermission] = &[ $( Self::$variant ),+ ];

            /// Canonical textual form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for StudyPermission {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for StudyPermission {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(CatalogError::invalid_argument(format!(
                        "The permission {s} is not a correct study permission"
                    ))),
                }
            }
        }
    };
}

study_permissions! {
    ViewStudy = "VIEW_STUDY",
    UpdateStudy = "UPDATE_STUDY",
    ShareStudy = "SHARE_STUDY",

    CreateVariableSets = "CREATE_VARIABLE_SETS",
    ViewVariableSets = "VIEW_VARIABLE_SETS",
    UpdateVariableSets = "UPDATE_VARIABLE_SETS",
    DeleteVariableSets = "DELETE_VARIABLE_SETS",
    ConfidentialVariableSetAccess = "CONFIDENTIAL_VARIABLE_SET_ACCESS",

    CreateFiles = "CREATE_FILES",
    ViewFiles = "VIEW_FILES",
    UpdateFiles = "UPDATE_FILES",
    DeleteFiles = "DELETE_FILES",
    DownloadFiles = "DOWNLOAD_FILES",
    ShareFiles = "SHARE_FILES",

    CreateJobs = "CREATE_JOBS",
    ViewJobs = "VIEW_JOBS",
    UpdateJobs = "UPDATE_JOBS",
    DeleteJobs = "DELETE_JOBS",
    ShareJobs = "SHARE_JOBS",

    CreateSamples = "CREATE_SAMPLES",
    ViewSamples = "VIEW_SAMPLES",
    UpdateSamples = "UPDATE_SAMPLES",
    DeleteSamples = "DELETE_SAMPLES",
    ShareSamples = "SHARE_SAMPLES",
    CreateSampleAnnotations = "CREATE_SAMPLE_ANNOTATIONS",
    ViewSampleAnnotations = "VIEW_SAMPLE_ANNOTATIONS",
    UpdateSampleAnnotations = "UPDATE_SAMPLE_ANNOTATIONS",
    DeleteSampleAnnotations = "DELETE_SAMPLE_ANNOTATIONS",

    CreateIndividuals = "CREATE_INDIVIDUALS",
    ViewIndividuals = "VIEW_INDIVIDUALS",
    UpdateIndividuals = "UPDATE_INDIVIDUALS",
    DeleteIndividuals = "DELETE_INDIVIDUALS",
    ShareIndividuals = "SHARE_INDIVIDUALS",
    CreateIndividualAnnotations = "CREATE_INDIVIDUAL_ANNOTATIONS",
    ViewIndividualAnnotations = "VIEW_INDIVIDUAL_ANNOTATIONS",
    UpdateIndividualAnnotations = "UPDATE_INDIVIDUAL_ANNOTATIONS",
    DeleteIndividualAnnotations = "DELETE_INDIVIDUAL_ANNOTATIONS",

    CreateCohorts = "CREATE_COHORTS",
    ViewCohorts = "VIEW_COHORTS",
    UpdateCohorts = "UPDATE_COHORTS",
    DeleteCohorts = "DELETE_COHORTS",
    ShareCohorts = "SHARE_COHORTS",
    CreateCohortAnnotations = "CREATE_COHORT_ANNOTATIONS",
    ViewCohortAnnotations = "VIEW_COHORT_ANNOTATIONS",
    UpdateCohortAnnotations = "UPDATE_COHORT_ANNOTATIONS",
    DeleteCohortAnnotations = "DELETE_COHORT_ANNOTATIONS",

    CreateDatasets = "CREATE_DATASETS",
    ViewDatasets = "VIEW_DATASETS",
    UpdateDatasets = "UPDATE_DATASETS",
    DeleteDatasets = "DELETE_DATASETS",
    ShareDatasets = "SHARE_DATASETS",

    CreatePanels = "CREATE_PANELS",
    ViewPanels = "VIEW_PANELS",
    UpdatePanels = "UPDATE_PANELS",
    DeletePanels = "DELETE_PANELS",
    SharePanels = "SHARE_PANELS",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip() {
        for permission in StudyPermission::ALL {
            let parsed: StudyPermission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, *permission);
        }
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        assert!("VIEW_EVERYTHING".parse::<StudyPermission>().is_err());
    }
}
