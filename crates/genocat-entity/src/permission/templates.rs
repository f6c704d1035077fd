//! Baseline permission templates for study ACL creation.

use std::collections::BTreeSet;

use super::study::StudyPermission;

/// Named baseline permission set applied when creating a study ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTemplate {
    /// Full control over the study and everything in it.
    Admin,
    /// Read, create and update, but no deletion, sharing or confidential
    /// variable-set access.
    Analyst,
    /// No permissions; grants must be added explicitly.
    Locked,
}

impl AclTemplate {
    /// Resolve the textual template name; unknown names fall back to the
    /// locked baseline.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("admin") => Self::Admin,
            Some("analyst") => Self::Analyst,
            _ => Self::Locked,
        }
    }

    /// The study permissions of this template.
    pub fn permissions(&self) -> BTreeSet<StudyPermission> {
        match self {
            Self::Admin => StudyPermission::ALL.iter().copied().collect(),
            Self::Analyst => StudyPermission::ALL
                .iter()
                .copied()
                .filter(|p| {
                    let text = p.as_str();
                    !text.starts_with("DELETE_")
                        && !text.starts_with("SHARE_")
                        && *p != StudyPermission::ConfidentialVariableSetAccess
                })
                .collect(),
            Self::Locked => BTreeSet::new(),
        }
    }
}
