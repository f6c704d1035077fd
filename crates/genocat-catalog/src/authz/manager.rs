//! The authorization manager.
//!
//! Computes the effective permission set for a (principal, entity) pair.
//! Resolution order: study owner bypass, daemon ACL for the reserved
//! `admin` principal, then the entity ACL with member precedence
//! user > group > `*`, falling back to the study-level ACL projected
//! through the derivation table. Files and folders walk their ancestor
//! paths through the request-scoped [`StudyAuthContext`].

use std::collections::HashMap;
use std::sync::Arc;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::MetadataAdaptor;
use genocat_core::types::acl::{AclEntry, Group};
use genocat_core::types::id::{ProjectId, StudyId};
use genocat_core::types::member::{Member, ADMIN_USER};
use genocat_core::types::record::{EntityKind, EntityRecord};
use genocat_core::types::study::VariableSet;
use genocat_entity::file::parent_paths;
use genocat_entity::permission::{Acl, EntityPermission, FilePermission, StudyPermission};

use super::context::StudyAuthContext;

/// Permission resolution over the injected metadata adaptor.
#[derive(Clone)]
pub struct AuthorizationManager {
    adaptor: Arc<dyn MetadataAdaptor>,
}

impl AuthorizationManager {
    /// Create an authorization manager.
    pub fn new(adaptor: Arc<dyn MetadataAdaptor>) -> Self {
        Self { adaptor }
    }

    /// Whether the user owns the study.
    pub async fn is_study_owner(&self, study_id: StudyId, user_id: &str) -> CatalogResult<bool> {
        Ok(self.adaptor.study_owner(study_id.get()).await? == user_id)
    }

    /// The group the user belongs to in this study, if any. A user belongs
    /// to at most one group per study.
    async fn group_of(&self, study_id: StudyId, user_id: &str) -> CatalogResult<Option<Group>> {
        match Member::principal(user_id) {
            Member::User(user) => {
                self.adaptor
                    .group_of_members(study_id.get(), std::slice::from_ref(&user))
                    .await
            }
            _ => Ok(None),
        }
    }

    /// The member lookup chain for a principal, in precedence order:
    /// the principal itself, its group (if any), then the wildcard.
    fn member_chain(user_id: &str, group: Option<&Group>) -> Vec<Member> {
        let mut members = vec![Member::principal(user_id)];
        if let Some(group) = group {
            members.push(group.as_member());
        }
        members.push(Member::Anyone);
        members
    }

    /// The study-level ACL the members resolve to, by precedence order of
    /// the given chain.
    async fn study_acl_belonging(
        &self,
        study_id: StudyId,
        members: &[Member],
    ) -> CatalogResult<Option<Acl<StudyPermission>>> {
        let entries = self
            .adaptor
            .entity_acls(EntityKind::Study, study_id.get(), members)
            .await?;
        let by_member: HashMap<&Member, &AclEntry> =
            entries.iter().map(|e| (&e.member, e)).collect();
        for member in members {
            if let Some(entry) = by_member.get(member) {
                return Ok(Some(Acl::from_entry(entry)?));
            }
        }
        Ok(None)
    }

    /// The daemon ACL of the reserved `admin` principal, independent of
    /// study ACLs.
    async fn daemon_study_acl(&self) -> CatalogResult<Option<Acl<StudyPermission>>> {
        let member = Member::User(ADMIN_USER.to_string());
        match self.adaptor.daemon_acl(&member).await? {
            Some(entry) => Ok(Some(Acl::from_entry(&entry)?)),
            None => Ok(None),
        }
    }

    // ── Study and project checks ────────────────────────────────────────

    /// Whether the user holds a study-level permission.
    pub async fn has_study_permission(
        &self,
        study_id: StudyId,
        user_id: &str,
        permission: StudyPermission,
    ) -> CatalogResult<bool> {
        if self.is_study_owner(study_id, user_id).await? {
            return Ok(true);
        }
        let acl = if user_id == ADMIN_USER {
            self.daemon_study_acl().await?
        } else {
            let group = self.group_of(study_id, user_id).await?;
            let members = Self::member_chain(user_id, group.as_ref());
            self.study_acl_belonging(study_id, &members).await?
        };
        Ok(acl.is_some_and(|acl| acl.contains(permission)))
    }

    /// Fail with `PermissionDenied` unless the user holds a study-level
    /// permission.
    pub async fn check_study_permission(
        &self,
        study_id: StudyId,
        user_id: &str,
        permission: StudyPermission,
    ) -> CatalogResult<()> {
        if self.has_study_permission(study_id, user_id, permission).await? {
            return Ok(());
        }
        Err(self.denial(user_id, permission, "Study", study_id.get()).await)
    }

    /// Project-level check: the project owner passes, and `VIEW_STUDY`
    /// passes when the user can view at least one study of the project.
    pub async fn check_project_permission(
        &self,
        project_id: ProjectId,
        user_id: &str,
        permission: StudyPermission,
    ) -> CatalogResult<()> {
        if self.adaptor.project_owner(project_id.get()).await? == user_id {
            return Ok(());
        }
        if permission == StudyPermission::ViewStudy {
            for study_id in self.adaptor.study_ids_of_project(project_id.get()).await? {
                if self
                    .has_study_permission(StudyId::new(study_id), user_id, permission)
                    .await?
                {
                    return Ok(());
                }
            }
        }
        Err(self
            .denial(user_id, permission, "Project", project_id.get())
            .await)
    }

    // ── Entity checks ───────────────────────────────────────────────────

    /// The effective ACL of a user on an entity, resolving through the
    /// member chain with a study-level fallback. Files walk their ancestor
    /// paths through a fresh context; use [`AuthorizationManager::file_acl`]
    /// to share a context across a request.
    pub async fn entity_acl<P: EntityPermission>(
        &self,
        study_id: StudyId,
        entity_id: i64,
        user_id: &str,
    ) -> CatalogResult<Acl<P>> {
        if user_id == ADMIN_USER {
            return match self.daemon_study_acl().await? {
                Some(study_acl) => Ok(Acl::from_study(&study_acl)),
                None => Ok(Acl::empty(Member::User(ADMIN_USER.to_string()))),
            };
        }

        if P::KIND == EntityKind::File {
            let record = self
                .adaptor
                .entity(EntityKind::File, entity_id)
                .await?
                .ok_or_else(|| {
                    CatalogError::not_found(format!("File {entity_id} not found"))
                })?;
            let mut context = StudyAuthContext::new(study_id);
            let file_acl = self.file_acl(&record, user_id, &mut context).await?;
            return Acl::from_entry(&file_acl.to_entry());
        }

        let group = self.group_of(study_id, user_id).await?;
        let members = Self::member_chain(user_id, group.as_ref());
        let entries = self
            .adaptor
            .entity_acls(P::KIND, entity_id, &members)
            .await?;
        let by_member: HashMap<&Member, &AclEntry> =
            entries.iter().map(|e| (&e.member, e)).collect();
        for member in &members {
            if let Some(entry) = by_member.get(member) {
                return Acl::from_entry(entry);
            }
        }

        match self.study_acl_belonging(study_id, &members).await? {
            Some(study_acl) => Ok(Acl::from_study(&study_acl)),
            None => Ok(Acl::empty(Member::principal(user_id))),
        }
    }

    /// Whether the user holds a permission on an entity.
    pub async fn has_entity_permission<P: EntityPermission>(
        &self,
        entity_id: i64,
        user_id: &str,
        permission: P,
    ) -> CatalogResult<bool> {
        let study_id = StudyId::new(self.adaptor.study_of_entity(P::KIND, entity_id).await?);
        if self.is_study_owner(study_id, user_id).await? {
            return Ok(true);
        }
        let acl = self.entity_acl::<P>(study_id, entity_id, user_id).await?;
        Ok(acl.contains(permission))
    }

    /// Fail with `PermissionDenied` unless the user holds a permission on
    /// an entity.
    pub async fn check_entity_permission<P: EntityPermission>(
        &self,
        entity_id: i64,
        user_id: &str,
        permission: P,
    ) -> CatalogResult<()> {
        if self
            .has_entity_permission(entity_id, user_id, permission)
            .await?
        {
            return Ok(());
        }
        Err(self
            .denial(user_id, permission, P::KIND.label(), entity_id)
            .await)
    }

    /// Denial error, with the daemon-specific reason when applicable.
    async fn denial(
        &self,
        user_id: &str,
        permission: impl std::fmt::Display,
        resource: &str,
        id: i64,
    ) -> CatalogError {
        if user_id == ADMIN_USER {
            if let Ok(None) = self.daemon_study_acl().await {
                return CatalogError::permission_denied(
                    "Permission denied. admin lacks an explicit daemon ACL",
                );
            }
        }
        CatalogError::deny(user_id, permission, resource, id)
    }

    // ── File path walk ──────────────────────────────────────────────────

    /// The effective file ACL of a user, walking the ancestor paths from
    /// the file up to the study root through the request-scoped context.
    pub async fn file_acl(
        &self,
        file: &EntityRecord,
        user_id: &str,
        context: &mut StudyAuthContext,
    ) -> CatalogResult<Acl<FilePermission>> {
        let study_id = context.study_id();
        let group = self.group_of(study_id, user_id).await?;
        let members = Self::member_chain(user_id, group.as_ref());

        let path = file.path.as_deref().unwrap_or(&file.name);
        let paths = parent_paths(path);
        self.populate_context(context, &paths, &members).await?;

        for path in paths.iter().rev() {
            for member in &members {
                if let Some(entry) = context.acl(path, member) {
                    return Acl::from_entry(entry);
                }
            }
        }

        match self.study_acl_belonging(study_id, &members).await? {
            Some(study_acl) => Ok(Acl::from_study(&study_acl)),
            None => Ok(Acl::empty(Member::principal(user_id))),
        }
    }

    /// Fetch the ACLs for the paths not yet fully cached for the member
    /// chain, in one bulk query, and merge them into the context. Members
    /// without an entry are cached as an explicit absence.
    async fn populate_context(
        &self,
        context: &mut StudyAuthContext,
        paths: &[String],
        members: &[Member],
    ) -> CatalogResult<()> {
        let missing: Vec<String> = paths
            .iter()
            .filter(|p| !context.is_populated(p, members))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut fetched = self
            .adaptor
            .path_acls(context.study_id().get(), &missing, members)
            .await?;
        for path in missing {
            let mut member_acls: HashMap<Member, Option<AclEntry>> =
                members.iter().cloned().map(|m| (m, None)).collect();
            for entry in fetched.remove(&path).unwrap_or_default() {
                member_acls.insert(entry.member.clone(), Some(entry));
            }
            context.merge(path, member_acls);
        }
        Ok(())
    }

    /// Fail with `PermissionDenied` unless the user holds a permission on a
    /// file, resolving through a shared request context.
    pub async fn check_file_permission(
        &self,
        file: &EntityRecord,
        user_id: &str,
        permission: FilePermission,
        context: &mut StudyAuthContext,
    ) -> CatalogResult<()> {
        if self.is_study_owner(context.study_id(), user_id).await? {
            return Ok(());
        }
        if user_id == ADMIN_USER {
            let acl = self
                .entity_acl::<FilePermission>(context.study_id(), file.id, user_id)
                .await?;
            if acl.contains(permission) {
                return Ok(());
            }
            return Err(self
                .denial(user_id, permission, "File", file.id)
                .await);
        }
        let acl = self.file_acl(file, user_id, context).await?;
        if acl.contains(permission) {
            return Ok(());
        }
        Err(self.denial(user_id, permission, "File", file.id).await)
    }

    // ── List filtering ──────────────────────────────────────────────────

    /// Drop the entities the user cannot `VIEW`. Annotation-bearing kinds
    /// additionally get their annotation sets cleared when the user lacks
    /// `VIEW_ANNOTATIONS`.
    pub async fn filter_entities<P: EntityPermission>(
        &self,
        user_id: &str,
        study_id: StudyId,
        records: Vec<EntityRecord>,
    ) -> CatalogResult<Vec<EntityRecord>> {
        if records.is_empty()
            || user_id == ADMIN_USER
            || self.is_study_owner(study_id, user_id).await?
        {
            return Ok(records);
        }

        let mut kept = Vec::with_capacity(records.len());
        for mut record in records {
            let acl = self.entity_acl::<P>(study_id, record.id, user_id).await?;
            if !acl.contains(P::VIEW) {
                continue;
            }
            if let Some(view_annotations) = P::VIEW_ANNOTATIONS {
                if !acl.contains(view_annotations) {
                    clear_annotation_sets(&mut record);
                }
            }
            kept.push(record);
        }
        Ok(kept)
    }

    /// Drop the files the user cannot `VIEW`, sharing one context so the
    /// ancestor paths of the whole listing are fetched at most once.
    pub async fn filter_files(
        &self,
        user_id: &str,
        files: Vec<EntityRecord>,
        context: &mut StudyAuthContext,
    ) -> CatalogResult<Vec<EntityRecord>> {
        if files.is_empty()
            || user_id == ADMIN_USER
            || self.is_study_owner(context.study_id(), user_id).await?
        {
            return Ok(files);
        }

        let mut kept = Vec::with_capacity(files.len());
        for file in files {
            let acl = self.file_acl(&file, user_id, context).await?;
            if acl.contains(FilePermission::View) {
                kept.push(file);
            }
        }
        Ok(kept)
    }

    /// Drop the variable sets the user cannot see: confidential variable
    /// sets require `CONFIDENTIAL_VARIABLE_SET_ACCESS`.
    pub async fn filter_variable_sets(
        &self,
        user_id: &str,
        study_id: StudyId,
        variable_sets: Vec<VariableSet>,
    ) -> CatalogResult<Vec<VariableSet>> {
        if variable_sets.iter().all(|vs| !vs.confidential)
            || self
                .has_study_permission(
                    study_id,
                    user_id,
                    StudyPermission::ConfidentialVariableSetAccess,
                )
                .await?
        {
            return Ok(variable_sets);
        }
        Ok(variable_sets
            .into_iter()
            .filter(|vs| !vs.confidential)
            .collect())
    }

    // ── Invariant probes ────────────────────────────────────────────────

    /// Whether a member already has study-level permissions (the
    /// precondition for entity-level ACL creation). The study owner and the
    /// daemon always qualify.
    pub async fn member_has_permissions_in_study(
        &self,
        study_id: StudyId,
        member: &Member,
    ) -> CatalogResult<bool> {
        let mut members = vec![member.clone()];
        if let Member::User(user) = member {
            if user == ADMIN_USER || self.is_study_owner(study_id, user).await? {
                return Ok(true);
            }
            if let Some(group) = self
                .adaptor
                .group_of_members(study_id.get(), std::slice::from_ref(user))
                .await?
            {
                members.push(group.as_member());
            }
        }
        Ok(self.study_acl_belonging(study_id, &members).await?.is_some())
    }
}

/// Clear the annotation sets of a record in place.
fn clear_annotation_sets(record: &mut EntityRecord) {
    match record.attributes.as_object_mut() {
        Some(attributes) => {
            attributes.insert("annotation_sets".to_string(), serde_json::Value::Array(vec![]));
        }
        None => {
            record.attributes = serde_json::json!({ "annotation_sets": [] });
        }
    }
}

impl std::fmt::Debug for AuthorizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationManager").finish()
    }
}
