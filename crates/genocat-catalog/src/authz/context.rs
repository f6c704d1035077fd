//! The request-scoped ACL cache for the file-path walk.

use std::collections::HashMap;

use genocat_core::types::acl::AclEntry;
use genocat_core::types::id::StudyId;
use genocat_core::types::member::Member;

/// Request-scoped cache mapping `path → member → acl` for one study.
///
/// Listing N files pays at most one bulk ACL lookup per distinct ancestor
/// path set instead of one lookup per file. Members with no entry on a path
/// are cached as `None` so the absence is not re-fetched. The context is a
/// plain value passed through the call chain; it never outlives a request.
#[derive(Debug)]
pub struct StudyAuthContext {
    study_id: StudyId,
    path_acls: HashMap<String, HashMap<Member, Option<AclEntry>>>,
}

impl StudyAuthContext {
    /// Empty context for a study.
    pub fn new(study_id: StudyId) -> Self {
        Self {
            study_id,
            path_acls: HashMap::new(),
        }
    }

    /// The study this context belongs to.
    pub fn study_id(&self) -> StudyId {
        self.study_id
    }

    /// Whether a path is already populated for every requested member.
    pub fn is_populated(&self, path: &str, members: &[Member]) -> bool {
        self.path_acls
            .get(path)
            .is_some_and(|acls| members.iter().all(|m| acls.contains_key(m)))
    }

    /// Merge freshly fetched entries for a path into the cache.
    pub fn merge(&mut self, path: String, acls: HashMap<Member, Option<AclEntry>>) {
        self.path_acls.entry(path).or_default().extend(acls);
    }

    /// The cached entry of a member on a path, if one is defined.
    pub fn acl(&self, path: &str, member: &Member) -> Option<&AclEntry> {
        self.path_acls
            .get(path)
            .and_then(|acls| acls.get(member))
            .and_then(Option::as_ref)
    }

    /// Whether any of the given members has a defined entry on a path.
    pub fn any_acl_defined(&self, path: &str, members: &[Member]) -> bool {
        members.iter().any(|m| self.acl(path, m).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_population_requires_every_member() {
        let mut ctx = StudyAuthContext::new(StudyId::new(1));
        let user = Member::User("ana".into());
        let members = [user.clone(), Member::Anyone];

        assert!(!ctx.is_populated("data/", &members));

        ctx.merge("data/".into(), HashMap::from([(user.clone(), None)]));
        assert!(!ctx.is_populated("data/", &members));

        ctx.merge(
            "data/".into(),
            HashMap::from([(
                Member::Anyone,
                Some(AclEntry::new(Member::Anyone, BTreeSet::new())),
            )]),
        );
        assert!(ctx.is_populated("data/", &members));
    }

    #[test]
    fn test_none_placeholder_is_not_a_defined_acl() {
        let mut ctx = StudyAuthContext::new(StudyId::new(1));
        let user = Member::User("ana".into());
        ctx.merge("data/".into(), HashMap::from([(user.clone(), None)]));

        assert!(ctx.acl("data/", &user).is_none());
        assert!(!ctx.any_acl_defined("data/", std::slice::from_ref(&user)));
    }
}
