//! In-memory metadata adaptor.
//!
//! Backs the integration tests and embedded single-process deployments.
//! Locks are process-scoped but follow the same duration/timeout/token
//! protocol as the PostgreSQL adaptor.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::{LockToken, MetadataAdaptor};
use genocat_core::types::acl::{AclEntry, Group};
use genocat_core::types::member::Member;
use genocat_core::types::record::{EntityKind, EntityQuery, EntityRecord};
use genocat_core::types::status::EntityStatus;
use genocat_core::types::study::StudyConfiguration;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// In-memory implementation of [`MetadataAdaptor`].
pub struct MemoryMetadataAdaptor {
    next_id: AtomicI64,
    next_token: AtomicI64,
    users: DashMap<String, ()>,
    entities: DashMap<(EntityKind, i64), EntityRecord>,
    groups: DashMap<(i64, String), Group>,
    acls: DashMap<(EntityKind, i64), BTreeMap<Member, AclEntry>>,
    daemon_acls: DashMap<Member, AclEntry>,
    configs: DashMap<i64, StudyConfiguration>,
    config_names: DashMap<String, i64>,
    locks: DashMap<i64, (i64, Instant)>,
}

impl MemoryMetadataAdaptor {
    /// Create an empty adaptor whose ids start above `id_offset`.
    pub fn new(id_offset: i64) -> Self {
        Self {
            next_id: AtomicI64::new(id_offset + 1),
            next_token: AtomicI64::new(1),
            users: DashMap::new(),
            entities: DashMap::new(),
            groups: DashMap::new(),
            acls: DashMap::new(),
            daemon_acls: DashMap::new(),
            configs: DashMap::new(),
            config_names: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // ── Seeding helpers (tests and embedded bootstrap) ──────────────────

    /// Register a user id.
    pub fn register_user(&self, user_id: &str) {
        self.users.insert(user_id.to_string(), ());
    }

    /// Create a project owned by `owner`; registers the owner as a user.
    pub async fn seed_project(&self, owner: &str, name: &str) -> CatalogResult<i64> {
        self.register_user(owner);
        let mut record = EntityRecord::new(EntityKind::Project, None, name);
        record.attributes = serde_json::json!({ "owner": owner });
        self.create_entity(&record).await
    }

    /// Create a study inside a project.
    pub async fn seed_study(&self, project_id: i64, name: &str) -> CatalogResult<i64> {
        let mut record = EntityRecord::new(EntityKind::Study, None, name);
        record.attributes = serde_json::json!({ "project_id": project_id });
        self.create_entity(&record).await
    }

    /// Define a study group; registers its users.
    pub fn seed_group(&self, study_id: i64, name: &str, user_ids: &[&str]) {
        for user in user_ids {
            self.register_user(user);
        }
        self.groups.insert(
            (study_id, name.to_string()),
            Group::new(name, user_ids.iter().map(|u| u.to_string()).collect()),
        );
    }

    /// Define the daemon ACL of a reserved principal.
    pub fn seed_daemon_acl(&self, member: Member, permissions: BTreeSet<String>) {
        self.daemon_acls
            .insert(member.clone(), AclEntry::new(member, permissions));
    }

    fn owner_of_project(&self, project_id: i64) -> CatalogResult<String> {
        let record = self
            .entities
            .get(&(EntityKind::Project, project_id))
            .ok_or_else(|| {
                CatalogError::not_found(format!("Project {project_id} not found"))
            })?;
        record
            .attributes
            .get("owner")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                CatalogError::internal(format!("Project {project_id} has no owner"))
            })
    }

    fn project_of_study(&self, study_id: i64) -> CatalogResult<i64> {
        let record = self
            .entities
            .get(&(EntityKind::Study, study_id))
            .ok_or_else(|| CatalogError::not_found(format!("Study {study_id} not found")))?;
        record
            .attributes
            .get("project_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| CatalogError::internal(format!("Study {study_id} has no project")))
    }

    /// Whether a user can reach a study: owner, group member, or study ACL
    /// holder (including the wildcard and anonymous entries).
    fn study_accessible(&self, study_id: i64, user_id: &str) -> CatalogResult<bool> {
        if self.study_owner_sync(study_id)? == user_id {
            return Ok(true);
        }
        let in_group = self
            .groups
            .iter()
            .any(|g| g.key().0 == study_id && g.value().contains(user_id));
        if in_group {
            return Ok(true);
        }
        if let Some(acls) = self.acls.get(&(EntityKind::Study, study_id)) {
            let principal = Member::principal(user_id);
            if acls.contains_key(&principal)
                || acls.contains_key(&Member::Anyone)
                || acls.contains_key(&Member::Anonymous)
            {
                return Ok(true);
            }
            for group in self.groups.iter().filter(|g| g.key().0 == study_id) {
                if group.value().contains(user_id)
                    && acls.contains_key(&group.value().as_member())
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn study_owner_sync(&self, study_id: i64) -> CatalogResult<String> {
        let project_id = self.project_of_study(study_id)?;
        self.owner_of_project(project_id)
    }

    fn matches(record: &EntityRecord, query: &EntityQuery) -> bool {
        if let Some(kind) = query.kind {
            if record.kind != kind {
                return false;
            }
        }
        if !query.study_ids.is_empty()
            && !record
                .study_id
                .is_some_and(|study| query.study_ids.contains(&study))
        {
            return false;
        }
        if !query.names.is_empty() && !query.names.iter().any(|n| *n == record.name) {
            return false;
        }
        if let Some(path) = &query.path {
            if record.path.as_deref() != Some(path.as_str()) {
                return false;
            }
        }
        if !query.include_trashed
            && matches!(
                record.status,
                EntityStatus::Trashed | EntityStatus::PendingDelete | EntityStatus::Deleted
            )
        {
            return false;
        }
        true
    }
}

#[async_trait]
impl MetadataAdaptor for MemoryMetadataAdaptor {
    // ── Projects and studies ────────────────────────────────────────────

    async fn project_id_by_alias(&self, owner: &str, alias: &str) -> CatalogResult<Option<i64>> {
        Ok(self
            .entities
            .iter()
            .find(|e| {
                e.key().0 == EntityKind::Project
                    && e.value().name == alias
                    && e.value().attributes.get("owner").and_then(|v| v.as_str()) == Some(owner)
            })
            .map(|e| e.key().1))
    }

    async fn find_project_ids(
        &self,
        owner: Option<&str>,
        alias: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .entities
            .iter()
            .filter(|e| {
                e.key().0 == EntityKind::Project
                    && owner.is_none_or(|o| {
                        e.value().attributes.get("owner").and_then(|v| v.as_str()) == Some(o)
                    })
                    && alias.is_none_or(|a| e.value().name == a)
            })
            .map(|e| e.key().1)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn project_owner(&self, project_id: i64) -> CatalogResult<String> {
        self.owner_of_project(project_id)
    }

    async fn study_ids_of_project(&self, project_id: i64) -> CatalogResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .entities
            .iter()
            .filter(|e| {
                e.key().0 == EntityKind::Study
                    && e.value().attributes.get("project_id").and_then(|v| v.as_i64())
                        == Some(project_id)
            })
            .map(|e| e.key().1)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn study_id_by_alias(&self, project_id: i64, alias: &str) -> CatalogResult<Option<i64>> {
        Ok(self
            .study_ids_of_project(project_id)
            .await?
            .into_iter()
            .find(|id| {
                self.entities
                    .get(&(EntityKind::Study, *id))
                    .is_some_and(|e| e.value().name == alias)
            }))
    }

    async fn find_study_ids_by_alias(
        &self,
        alias: &str,
        accessible_to: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        let candidates: Vec<i64> = self
            .entities
            .iter()
            .filter(|e| e.key().0 == EntityKind::Study && e.value().name == alias)
            .map(|e| e.key().1)
            .collect();
        let mut ids = Vec::with_capacity(candidates.len());
        for id in candidates {
            match accessible_to {
                Some(user) if !self.study_accessible(id, user)? => {}
                _ => ids.push(id),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn study_owner(&self, study_id: i64) -> CatalogResult<String> {
        self.study_owner_sync(study_id)
    }

    // ── Groups and members ──────────────────────────────────────────────

    async fn group(&self, study_id: i64, name: &str) -> CatalogResult<Option<Group>> {
        Ok(self
            .groups
            .get(&(study_id, name.to_string()))
            .map(|g| g.value().clone()))
    }

    async fn group_of_members(
        &self,
        study_id: i64,
        user_ids: &[String],
    ) -> CatalogResult<Option<Group>> {
        Ok(self
            .groups
            .iter()
            .find(|g| {
                g.key().0 == study_id && user_ids.iter().any(|u| g.value().contains(u))
            })
            .map(|g| g.value().clone()))
    }

    async fn member_exists(&self, study_id: i64, member: &Member) -> CatalogResult<bool> {
        Ok(match member {
            Member::User(user) => self.users.contains_key(user),
            Member::Group(name) => self.groups.contains_key(&(study_id, name.clone())),
            Member::Anyone | Member::Anonymous => true,
        })
    }

    async fn daemon_acl(&self, member: &Member) -> CatalogResult<Option<AclEntry>> {
        Ok(self.daemon_acls.get(member).map(|e| e.value().clone()))
    }

    // ── Study configuration ─────────────────────────────────────────────

    async fn study_configuration_by_id(
        &self,
        study_id: i64,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        Ok(self.configs.get(&study_id).and_then(|config| {
            if cached_timestamp == Some(config.timestamp) {
                None
            } else {
                Some(config.value().clone())
            }
        }))
    }

    async fn study_configuration_by_name(
        &self,
        study_name: &str,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        let study_id = self.config_names.get(study_name).map(|e| *e.value());
        match study_id {
            Some(id) => self.study_configuration_by_id(id, cached_timestamp).await,
            None => Ok(None),
        }
    }

    async fn update_study_configuration(&self, config: &StudyConfiguration) -> CatalogResult<()> {
        self.config_names
            .insert(config.study_name.clone(), config.study_id.get());
        self.configs.insert(config.study_id.get(), config.clone());
        Ok(())
    }

    async fn studies(&self) -> CatalogResult<HashMap<String, i64>> {
        Ok(self
            .config_names
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    // ── Study locks ─────────────────────────────────────────────────────

    async fn lock_study(
        &self,
        study_id: i64,
        duration: Duration,
        timeout: Duration,
    ) -> CatalogResult<LockToken> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            let mut acquired = None;
            match self.locks.entry(study_id) {
                dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                    if entry.get().1 <= now {
                        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
                        entry.insert((token, now + duration));
                        acquired = Some(token);
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let token = self.next_token.fetch_add(1, Ordering::SeqCst);
                    entry.insert((token, now + duration));
                    acquired = Some(token);
                }
            }
            if let Some(token) = acquired {
                return Ok(LockToken(token));
            }
            if Instant::now() + LOCK_POLL_INTERVAL > deadline {
                return Err(CatalogError::timeout(format!(
                    "Unable to lock study {study_id} within {timeout:?}"
                )));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn unlock_study(&self, study_id: i64, token: LockToken) -> CatalogResult<()> {
        self.locks
            .remove_if(&study_id, |_, (held, _)| *held == token.0);
        Ok(())
    }

    // ── Entities ────────────────────────────────────────────────────────

    async fn create_entity(&self, record: &EntityRecord) -> CatalogResult<i64> {
        let mut record = record.clone();
        if record.id <= 0 {
            record.id = self.allocate_id();
        }
        let id = record.id;
        self.entities.insert((record.kind, id), record);
        Ok(id)
    }

    async fn entity(&self, kind: EntityKind, id: i64) -> CatalogResult<Option<EntityRecord>> {
        Ok(self.entities.get(&(kind, id)).map(|e| e.value().clone()))
    }

    async fn find_entities(&self, query: &EntityQuery) -> CatalogResult<Vec<EntityRecord>> {
        let mut records: Vec<EntityRecord> = self
            .entities
            .iter()
            .filter(|e| Self::matches(e.value(), query))
            .map(|e| e.value().clone())
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn update_entity(&self, record: &EntityRecord) -> CatalogResult<()> {
        let key = (record.kind, record.id);
        if !self.entities.contains_key(&key) {
            return Err(CatalogError::not_found(format!(
                "{} {} not found",
                record.kind.label(),
                record.id
            )));
        }
        self.entities.insert(key, record.clone());
        Ok(())
    }

    async fn set_entity_status(
        &self,
        kind: EntityKind,
        id: i64,
        status: EntityStatus,
    ) -> CatalogResult<()> {
        match self.entities.get_mut(&(kind, id)) {
            Some(mut entry) => {
                entry.value_mut().status = status;
                Ok(())
            }
            None => Err(CatalogError::not_found(format!(
                "{} {id} not found",
                kind.label()
            ))),
        }
    }

    async fn delete_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        self.entities
            .remove(&(kind, id))
            .map(|_| ())
            .ok_or_else(|| CatalogError::not_found(format!("{} {id} not found", kind.label())))?;
        self.acls.remove(&(kind, id));
        Ok(())
    }

    async fn check_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        if self.entities.contains_key(&(kind, id)) {
            Ok(())
        } else {
            Err(CatalogError::not_found(format!(
                "{} {id} not found",
                kind.label()
            )))
        }
    }

    async fn study_of_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<i64> {
        if kind == EntityKind::Study {
            self.check_entity(kind, id).await?;
            return Ok(id);
        }
        let record = self
            .entities
            .get(&(kind, id))
            .ok_or_else(|| CatalogError::not_found(format!("{} {id} not found", kind.label())))?;
        record.study_id.ok_or_else(|| {
            CatalogError::internal(format!("{} {id} has no enclosing study", kind.label()))
        })
    }

    // ── ACLs ────────────────────────────────────────────────────────────

    async fn entity_acls(
        &self,
        kind: EntityKind,
        id: i64,
        members: &[Member],
    ) -> CatalogResult<Vec<AclEntry>> {
        Ok(self
            .acls
            .get(&(kind, id))
            .map(|acls| {
                members
                    .iter()
                    .filter_map(|m| acls.get(m).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_entity_acls(&self, kind: EntityKind, id: i64) -> CatalogResult<Vec<AclEntry>> {
        Ok(self
            .acls
            .get(&(kind, id))
            .map(|acls| acls.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        entry: &AclEntry,
    ) -> CatalogResult<AclEntry> {
        let mut acls = self.acls.entry((kind, id)).or_default();
        if acls.contains_key(&entry.member) {
            return Err(CatalogError::precondition(format!(
                "Member {} already has an ACL defined for {} {id}",
                entry.member,
                kind.as_str()
            )));
        }
        acls.insert(entry.member.clone(), entry.clone());
        Ok(entry.clone())
    }

    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let mut acls = self.acls.entry((kind, id)).or_default();
        match acls.get_mut(member) {
            Some(entry) => {
                entry.permissions = permissions.clone();
                Ok(())
            }
            None => Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            ))),
        }
    }

    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let mut acls = self.acls.entry((kind, id)).or_default();
        match acls.get_mut(member) {
            Some(entry) => {
                entry.permissions.extend(permissions.iter().cloned());
                Ok(())
            }
            None => Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            ))),
        }
    }

    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let mut acls = self.acls.entry((kind, id)).or_default();
        match acls.get_mut(member) {
            Some(entry) => {
                entry.permissions.retain(|p| !permissions.contains(p));
                Ok(())
            }
            None => Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            ))),
        }
    }

    async fn remove_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
    ) -> CatalogResult<()> {
        let removed = self
            .acls
            .get_mut(&(kind, id))
            .and_then(|mut acls| acls.remove(member));
        match removed {
            Some(_) => Ok(()),
            None => Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            ))),
        }
    }

    async fn path_acls(
        &self,
        study_id: i64,
        paths: &[String],
        members: &[Member],
    ) -> CatalogResult<HashMap<String, Vec<AclEntry>>> {
        let matching: Vec<(String, i64)> = self
            .entities
            .iter()
            .filter(|e| {
                let record = e.value();
                record.kind == EntityKind::File
                    && record.study_id == Some(study_id)
                    && record
                        .path
                        .as_deref()
                        .is_some_and(|path| paths.iter().any(|p| p == path))
            })
            .map(|e| (e.value().path.clone().unwrap_or_default(), e.value().id))
            .collect();

        let mut result: HashMap<String, Vec<AclEntry>> = HashMap::new();
        for (path, file_id) in matching {
            let acls = self.entity_acls(EntityKind::File, file_id, members).await?;
            if !acls.is_empty() {
                result.insert(path, acls);
            }
        }
        Ok(result)
    }
}

impl std::fmt::Debug for MemoryMetadataAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMetadataAdaptor")
            .field("entities", &self.entities.len())
            .finish()
    }
}
