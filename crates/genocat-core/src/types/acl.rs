//! Raw ACL entries and study groups as stored by the metadata adaptor.
//!
//! At the adaptor boundary permissions travel as string sets (the legacy
//! storage convention); the typed per-entity permission enums live in
//! `genocat-entity` and validate these strings on the way in and out.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::member::Member;

/// One ACL entry: a member and its permission set.
///
/// Within one entity there is at most one entry per member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// The member this entry applies to.
    pub member: Member,
    /// Permission names, stored in their canonical textual form.
    pub permissions: BTreeSet<String>,
}

impl AclEntry {
    /// Create a new entry for a member.
    pub fn new(member: Member, permissions: BTreeSet<String>) -> Self {
        Self {
            member,
            permissions,
        }
    }

    /// Entry with an empty permission set (used as an explicit deny-all).
    pub fn empty(member: Member) -> Self {
        Self {
            member,
            permissions: BTreeSet::new(),
        }
    }

    /// Whether the entry contains the given permission name.
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// A named group of users within a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Bare group name, without the `@` prefix.
    pub name: String,
    /// User ids belonging to the group.
    pub user_ids: Vec<String>,
}

impl Group {
    /// Create a new group.
    pub fn new(name: impl Into<String>, user_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            user_ids,
        }
    }

    /// The group as an ACL member reference.
    pub fn as_member(&self) -> Member {
        Member::Group(self.name.clone())
    }

    /// Whether the given user belongs to this group.
    pub fn contains(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|u| u == user_id)
    }
}
