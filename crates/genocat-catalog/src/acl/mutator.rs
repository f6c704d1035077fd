//! Creates, reads, updates, removes and resets ACL entries.
//!
//! Preconditions enforced here:
//! - the caller holds `SHARE` on the entity (`SHARE_STUDY` for studies);
//! - every member of a new entity-level ACL already has study-level
//!   permissions, except `*` and `anonymous`;
//! - at most one entry per member and entity;
//! - the study owner's study ACL cannot be removed.
//!
//! Every mutation runs inside the study lock, serializing against
//! study-configuration updates touching the same study.

use std::collections::BTreeSet;
use std::sync::Arc;

use genocat_core::config::LockConfig;
use genocat_core::error::{CatalogError, ErrorKind};
use genocat_core::result::CatalogResult;
use genocat_core::traits::{LockToken, MetadataAdaptor};
use genocat_core::types::acl::AclEntry;
use genocat_core::types::id::StudyId;
use genocat_core::types::member::Member;
use genocat_core::types::record::EntityKind;
use genocat_core::types::response::QueryResult;
use genocat_entity::permission::{
    parse_permission_names, AclTemplate, EntityPermission, StudyPermission,
};

use crate::authz::AuthorizationManager;

/// Permission amendments for [`AclMutator::update_acl`]. `set` replaces the
/// whole permission set and excludes `add`/`remove`.
#[derive(Debug, Clone, Default)]
pub struct UpdateAclParams {
    /// Replace the permission set.
    pub set: Option<Vec<String>>,
    /// Add permissions to the set.
    pub add: Option<Vec<String>>,
    /// Remove permissions from the set.
    pub remove: Option<Vec<String>>,
}

/// ACL mutation over the injected metadata adaptor.
#[derive(Clone)]
pub struct AclMutator {
    adaptor: Arc<dyn MetadataAdaptor>,
    authz: AuthorizationManager,
    lock: LockConfig,
}

impl AclMutator {
    /// Create an ACL mutator.
    pub fn new(
        adaptor: Arc<dyn MetadataAdaptor>,
        authz: AuthorizationManager,
        lock: LockConfig,
    ) -> Self {
        Self {
            adaptor,
            authz,
            lock,
        }
    }

    async fn lock(&self, study_id: StudyId) -> CatalogResult<LockToken> {
        self.adaptor
            .lock_study(study_id.get(), self.lock.duration(), self.lock.timeout())
            .await
    }

    async fn unlock(&self, study_id: StudyId, token: LockToken) {
        if let Err(e) = self.adaptor.unlock_study(study_id.get(), token).await {
            tracing::warn!(study = study_id.get(), error = %e, "Failed to release study lock");
        }
    }

    /// Fail unless every member resolves in the study.
    async fn check_members(&self, study_id: StudyId, members: &[Member]) -> CatalogResult<()> {
        for member in members {
            if member.is_precondition_exempt() {
                continue;
            }
            if !self.adaptor.member_exists(study_id.get(), member).await? {
                return Err(CatalogError::not_found(format!(
                    "Member {member} does not exist in study {study_id}"
                )));
            }
        }
        Ok(())
    }

    /// Whether any of the members, or a principal overlapping with them
    /// through group membership, already has an entry on the entity.
    async fn any_member_has_permissions(
        &self,
        study_id: StudyId,
        kind: EntityKind,
        entity_id: i64,
        members: &[Member],
    ) -> CatalogResult<bool> {
        let mut all_members = members.to_vec();
        for member in members {
            match member {
                Member::Group(name) => {
                    if let Some(group) = self.adaptor.group(study_id.get(), name).await? {
                        all_members
                            .extend(group.user_ids.iter().cloned().map(Member::User));
                    }
                }
                Member::User(user) => {
                    if let Some(group) = self
                        .adaptor
                        .group_of_members(study_id.get(), std::slice::from_ref(user))
                        .await?
                    {
                        all_members.push(group.as_member());
                    }
                }
                Member::Anyone | Member::Anonymous => {}
            }
        }
        Ok(!self
            .adaptor
            .entity_acls(kind, entity_id, &all_members)
            .await?
            .is_empty())
    }

    // ── Create ──────────────────────────────────────────────────────────

    /// Create study-level ACLs for a set of members, optionally seeding the
    /// permission set from a template (`admin`, `analyst`, or the locked
    /// default).
    pub async fn create_study_acls(
        &self,
        user_id: &str,
        study_id: StudyId,
        members: &[Member],
        permissions: &[String],
        template: Option<&str>,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor
            .check_entity(EntityKind::Study, study_id.get())
            .await?;
        self.check_members(study_id, members).await?;
        self.authz
            .check_study_permission(study_id, user_id, StudyPermission::ShareStudy)
            .await?;

        let mut study_permissions = AclTemplate::from_name(template).permissions();
        study_permissions
            .extend(parse_permission_names::<StudyPermission, _>(
                permissions.iter().map(String::as_str),
            )?);

        let token = self.lock(study_id).await?;
        let result = self
            .create_study_acls_locked(study_id, members, &study_permissions)
            .await;
        self.unlock(study_id, token).await;
        result
    }

    async fn create_study_acls_locked(
        &self,
        study_id: StudyId,
        members: &[Member],
        permissions: &BTreeSet<StudyPermission>,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        for member in members {
            if self
                .authz
                .member_has_permissions_in_study(study_id, member)
                .await?
            {
                return Err(CatalogError::precondition(format!(
                    "The member {member} already has some permissions set in study. Please, \
                     remove those permissions or add, remove or set new permissions."
                )));
            }
        }

        let permission_names: BTreeSet<String> =
            permissions.iter().map(|p| p.to_string()).collect();
        let mut created = Vec::with_capacity(members.len());
        for member in members {
            let entry = AclEntry::new(member.clone(), permission_names.clone());
            created.push(
                self.adaptor
                    .create_entity_acl(EntityKind::Study, study_id.get(), &entry)
                    .await?,
            );
        }
        Ok(QueryResult::new("create study ACLs", created))
    }

    /// Create entity-level ACLs for a set of members.
    pub async fn create_entity_acls<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
        members: &[Member],
        permissions: &[String],
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        self.authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await?;

        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);
        for member in members {
            if !member.is_precondition_exempt()
                && !self
                    .authz
                    .member_has_permissions_in_study(study_id, member)
                    .await?
            {
                return Err(CatalogError::precondition(format!(
                    "Cannot create ACL for {member}. First, a general study permission must \
                     be defined for that member."
                )));
            }
        }
        self.check_members(study_id, members).await?;

        let typed = parse_permission_names::<P, _>(permissions.iter().map(String::as_str))?;
        let permission_names: BTreeSet<String> = typed.iter().map(|p| p.to_string()).collect();

        let token = self.lock(study_id).await?;
        let result = self
            .create_entity_acls_locked::<P>(study_id, entity_id, members, &permission_names)
            .await;
        self.unlock(study_id, token).await;
        result
    }

    async fn create_entity_acls_locked<P: EntityPermission>(
        &self,
        study_id: StudyId,
        entity_id: i64,
        members: &[Member],
        permission_names: &BTreeSet<String>,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        if self
            .any_member_has_permissions(study_id, P::KIND, entity_id, members)
            .await?
        {
            return Err(CatalogError::precondition(format!(
                "Cannot create ACL. At least one of the members already have some permissions \
                 set for this particular {}. Please, use update instead.",
                P::KIND.as_str()
            )));
        }

        let mut created = Vec::with_capacity(members.len());
        for member in members {
            let entry = AclEntry::new(member.clone(), permission_names.clone());
            created.push(
                self.adaptor
                    .create_entity_acl(P::KIND, entity_id, &entry)
                    .await?,
            );
        }
        Ok(QueryResult::new(
            format!("create {} ACLs", P::KIND.as_str()),
            created,
        ))
    }

    // ── Read ────────────────────────────────────────────────────────────

    /// Every ACL entry of an entity. Requires `SHARE`.
    pub async fn get_all_acls<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        self.authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await?;
        let entries = self.adaptor.all_entity_acls(P::KIND, entity_id).await?;
        Ok(QueryResult::new(
            format!("get {} ACLs", P::KIND.as_str()),
            entries,
        ))
    }

    /// The ACL entry of one member. Callers without `SHARE` may still ask
    /// about themselves or a group they belong to.
    pub async fn get_acl<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
        member: &Member,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);
        self.check_members(study_id, std::slice::from_ref(member))
            .await?;

        if let Err(e) = self
            .authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await
        {
            if e.kind != ErrorKind::PermissionDenied {
                return Err(e);
            }
            self.check_self_inspection(study_id, user_id, member).await?;
        }

        let mut members = vec![member.clone()];
        if let Member::User(user) = member {
            if let Some(group) = self
                .adaptor
                .group_of_members(study_id.get(), std::slice::from_ref(user))
                .await?
            {
                members.push(group.as_member());
            }
        }
        let entries = self.adaptor.entity_acls(P::KIND, entity_id, &members).await?;
        Ok(QueryResult::new(
            format!("get {} ACL", P::KIND.as_str()),
            entries,
        ))
    }

    /// Callers without `SHARE` may only inspect their own permissions or
    /// those of a group they belong to.
    async fn check_self_inspection(
        &self,
        study_id: StudyId,
        user_id: &str,
        member: &Member,
    ) -> CatalogResult<()> {
        let allowed = match member {
            Member::Group(name) => self
                .adaptor
                .group_of_members(study_id.get(), &[user_id.to_string()])
                .await?
                .is_some_and(|g| g.name == *name),
            Member::User(user) => user == user_id,
            Member::Anyone | Member::Anonymous => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(CatalogError::permission_denied(format!(
                "The user {user_id} does not have permissions to see the ACLs of {member}"
            )))
        }
    }

    // ── Update ──────────────────────────────────────────────────────────

    /// Amend the permission set of an existing entry: `set` replaces it,
    /// `add`/`remove` modify it. The member must already have an entry.
    pub async fn update_acl<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
        member: &Member,
        params: UpdateAclParams,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        self.authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await?;
        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);
        self.check_members(study_id, std::slice::from_ref(member))
            .await?;

        if params.set.is_some() && (params.add.is_some() || params.remove.is_some()) {
            return Err(CatalogError::invalid_argument(
                "Cannot set and add/remove permissions at the same time",
            ));
        }
        if params.set.is_none() && params.add.is_none() && params.remove.is_none() {
            return Err(CatalogError::invalid_argument(
                "Nothing to do: no permissions to set, add or remove",
            ));
        }

        let token = self.lock(study_id).await?;
        let result = self
            .update_acl_locked::<P>(entity_id, member, &params)
            .await;
        self.unlock(study_id, token).await;
        result
    }

    async fn update_acl_locked<P: EntityPermission>(
        &self,
        entity_id: i64,
        member: &Member,
        params: &UpdateAclParams,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        let existing = self
            .adaptor
            .entity_acls(P::KIND, entity_id, std::slice::from_ref(member))
            .await?;
        if existing.is_empty() {
            return Err(CatalogError::precondition(format!(
                "Could not update ACLs for {member}. It seems the member does not have any \
                 permissions set yet."
            )));
        }

        if let Some(set) = &params.set {
            let permissions = self.validate::<P>(set)?;
            self.adaptor
                .set_acls_to_member(P::KIND, entity_id, member, &permissions)
                .await?;
        } else {
            if let Some(add) = &params.add {
                let permissions = self.validate::<P>(add)?;
                self.adaptor
                    .add_acls_to_member(P::KIND, entity_id, member, &permissions)
                    .await?;
            }
            if let Some(remove) = &params.remove {
                let permissions = self.validate::<P>(remove)?;
                self.adaptor
                    .remove_acls_from_member(P::KIND, entity_id, member, &permissions)
                    .await?;
            }
        }

        let entries = self
            .adaptor
            .entity_acls(P::KIND, entity_id, std::slice::from_ref(member))
            .await?;
        Ok(QueryResult::new(
            format!("update {} ACL", P::KIND.as_str()),
            entries,
        ))
    }

    fn validate<P: EntityPermission>(&self, names: &[String]) -> CatalogResult<BTreeSet<String>> {
        let typed = parse_permission_names::<P, _>(names.iter().map(String::as_str))?;
        Ok(typed.iter().map(|p| p.to_string()).collect())
    }

    // ── Remove and reset ────────────────────────────────────────────────

    /// Remove a member's entry entirely. For studies, the owner's entry is
    /// protected. The second removal of the same entry fails `NotFound`
    /// and leaves the state unchanged.
    pub async fn remove_acl<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
        member: &Member,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        self.authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await?;
        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);
        self.check_members(study_id, std::slice::from_ref(member))
            .await?;

        if P::KIND == EntityKind::Study {
            let owner = self.adaptor.study_owner(study_id.get()).await?;
            if *member == Member::User(owner) {
                return Err(CatalogError::precondition(
                    "It is not allowed removing the permissions to the owner of the study",
                ));
            }
        }

        let token = self.lock(study_id).await?;
        let result = self.remove_acl_locked::<P>(entity_id, member).await;
        self.unlock(study_id, token).await;
        result
    }

    async fn remove_acl_locked<P: EntityPermission>(
        &self,
        entity_id: i64,
        member: &Member,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        let existing = self
            .adaptor
            .entity_acls(P::KIND, entity_id, std::slice::from_ref(member))
            .await?;
        if existing.is_empty() {
            return Err(CatalogError::not_found(format!(
                "Could not remove the ACLs for {member}. It seems {member} did not have any \
                 ACLs defined"
            )));
        }
        self.adaptor
            .remove_entity_acl(P::KIND, entity_id, member)
            .await?;
        Ok(QueryResult::new(
            format!("remove {} ACL", P::KIND.as_str()),
            existing,
        ))
    }

    /// Remove a member's entry without requiring it to exist.
    pub async fn reset_acl<P: EntityPermission>(
        &self,
        user_id: &str,
        entity_id: i64,
        member: &Member,
    ) -> CatalogResult<QueryResult<AclEntry>> {
        self.adaptor.check_entity(P::KIND, entity_id).await?;
        self.authz
            .check_entity_permission(entity_id, user_id, P::SHARE)
            .await?;
        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);

        let token = self.lock(study_id).await?;
        let result = match self
            .adaptor
            .remove_entity_acl(P::KIND, entity_id, member)
            .await
        {
            Ok(()) => Ok(QueryResult::empty(format!(
                "reset {} ACL",
                P::KIND.as_str()
            ))),
            Err(e) if e.kind == ErrorKind::NotFound => Ok(QueryResult::empty(format!(
                "reset {} ACL",
                P::KIND.as_str()
            ))),
            Err(e) => Err(e),
        };
        self.unlock(study_id, token).await;
        result
    }
}

impl std::fmt::Debug for AclMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclMutator").finish()
    }
}
