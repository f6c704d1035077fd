//! Typed ACL entries over the raw adaptor representation.

use std::collections::BTreeSet;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::acl::AclEntry;
use genocat_core::types::member::Member;

use super::entity::EntityPermission;
use super::study::StudyPermission;

/// Parse permission names into a typed set, rejecting unknown names.
pub fn parse_permission_names<'a, P, I>(names: I) -> CatalogResult<BTreeSet<P>>
where
    P: EntityPermission,
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(str::parse).collect()
}

/// A typed ACL entry for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl<P: EntityPermission> {
    /// The member this entry applies to.
    pub member: Member,
    /// The granted permissions.
    pub permissions: BTreeSet<P>,
}

impl<P: EntityPermission> Acl<P> {
    /// Entry with the given permissions.
    pub fn new(member: Member, permissions: BTreeSet<P>) -> Self {
        Self {
            member,
            permissions,
        }
    }

    /// Entry with no permissions (an explicit deny-all).
    pub fn empty(member: Member) -> Self {
        Self {
            member,
            permissions: BTreeSet::new(),
        }
    }

    /// Whether the entry grants a permission.
    pub fn contains(&self, permission: P) -> bool {
        self.permissions.contains(&permission)
    }

    /// Parse a raw adaptor entry, validating every permission name.
    pub fn from_entry(entry: &AclEntry) -> CatalogResult<Self> {
        let permissions = parse_permission_names(entry.permissions.iter().map(String::as_str))
            .map_err(|e| {
                CatalogError::new(
                    e.kind,
                    format!("Stored ACL for {} is invalid: {}", entry.member, e.message),
                )
            })?;
        Ok(Self {
            member: entry.member.clone(),
            permissions,
        })
    }

    /// Render the entry in the raw adaptor form.
    pub fn to_entry(&self) -> AclEntry {
        AclEntry {
            member: self.member.clone(),
            permissions: self.permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Project a study-level entry onto this entity kind through the
    /// derivation table. Study permissions with no projection are dropped.
    pub fn from_study(study_acl: &Acl<StudyPermission>) -> Self {
        let permissions = study_acl
            .permissions
            .iter()
            .filter_map(|p| P::from_study(*p))
            .collect();
        Self {
            member: study_acl.member.clone(),
            permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::entity::JobPermission;

    #[test]
    fn test_study_acl_projects_onto_job_acl() {
        let study_acl = Acl::<StudyPermission>::new(
            Member::Anyone,
            [
                StudyPermission::ViewJobs,
                StudyPermission::ViewFiles,
                StudyPermission::ShareStudy,
            ]
            .into(),
        );
        let job_acl = Acl::<JobPermission>::from_study(&study_acl);
        assert_eq!(job_acl.permissions, [JobPermission::View].into());
        assert_eq!(job_acl.member, Member::Anyone);
    }

    #[test]
    fn test_raw_entry_round_trip() {
        let acl = Acl::<JobPermission>::new(
            Member::User("ana".into()),
            [JobPermission::View, JobPermission::Delete].into(),
        );
        let entry = acl.to_entry();
        assert!(entry.contains("VIEW"));
        assert!(entry.contains("DELETE"));
        let back = Acl::<JobPermission>::from_entry(&entry).unwrap();
        assert_eq!(back, acl);
    }

    #[test]
    fn test_unknown_stored_permission_is_rejected() {
        let entry = AclEntry::new(Member::Anyone, ["FLY".to_string()].into());
        assert!(Acl::<JobPermission>::from_entry(&entry).is_err());
    }
}
