//! The metadata adaptor: the narrow persistence interface the catalog core
//! is written against.
//!
//! Consistency contract: `lock_study` must provide mutual exclusion across
//! all processes sharing the same backend, and `study_configuration_*` must
//! observe any write that completed before the call returned. Entity ids are
//! raw `i64` here; the typed id newtypes are used above this boundary.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::CatalogResult;
use crate::types::acl::{AclEntry, Group};
use crate::types::member::Member;
use crate::types::record::{EntityKind, EntityQuery, EntityRecord};
use crate::types::status::EntityStatus;
use crate::types::study::StudyConfiguration;

/// Opaque token returned by a successful study-lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(pub i64);

/// Persistence interface for the catalog core. Dependency-injected into the
/// authorization manager, the ACL mutator and the study metadata manager.
#[async_trait]
pub trait MetadataAdaptor: Send + Sync + 'static {
    // ── Projects and studies ────────────────────────────────────────────

    /// Project id owned by `owner` with the given alias.
    async fn project_id_by_alias(&self, owner: &str, alias: &str) -> CatalogResult<Option<i64>>;

    /// All project ids matching the optional owner/alias constraints.
    async fn find_project_ids(
        &self,
        owner: Option<&str>,
        alias: Option<&str>,
    ) -> CatalogResult<Vec<i64>>;

    /// Owner of a project.
    async fn project_owner(&self, project_id: i64) -> CatalogResult<String>;

    /// Studies within a project.
    async fn study_ids_of_project(&self, project_id: i64) -> CatalogResult<Vec<i64>>;

    /// Study id by alias within a project.
    async fn study_id_by_alias(&self, project_id: i64, alias: &str) -> CatalogResult<Option<i64>>;

    /// Study ids matching a bare alias, optionally restricted to the studies
    /// a user can reach through ownership, groups or ACLs.
    async fn find_study_ids_by_alias(
        &self,
        alias: &str,
        accessible_to: Option<&str>,
    ) -> CatalogResult<Vec<i64>>;

    /// Owner (user id) of a study.
    async fn study_owner(&self, study_id: i64) -> CatalogResult<String>;

    // ── Groups and members ──────────────────────────────────────────────

    /// A study group by bare name.
    async fn group(&self, study_id: i64, name: &str) -> CatalogResult<Option<Group>>;

    /// The group any of the given users belongs to within the study.
    /// A user belongs to at most one group per study.
    async fn group_of_members(
        &self,
        study_id: i64,
        user_ids: &[String],
    ) -> CatalogResult<Option<Group>>;

    /// Whether a member reference resolves (registered user or defined
    /// group) in the context of a study.
    async fn member_exists(&self, study_id: i64, member: &Member) -> CatalogResult<bool>;

    /// Daemon ACL for a reserved principal, independent of study ACLs.
    async fn daemon_acl(&self, member: &Member) -> CatalogResult<Option<AclEntry>>;

    // ── Study configuration ─────────────────────────────────────────────

    /// Study configuration by id. Returns `None` when `cached_timestamp`
    /// matches the stored document (the caller's copy is current) or when
    /// the study has no configuration yet.
    async fn study_configuration_by_id(
        &self,
        study_id: i64,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>>;

    /// Study configuration by name; same timestamp contract as by-id.
    async fn study_configuration_by_name(
        &self,
        study_name: &str,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>>;

    /// Persist a study configuration document.
    async fn update_study_configuration(&self, config: &StudyConfiguration) -> CatalogResult<()>;

    /// Map of study name → id for every study with a configuration.
    async fn studies(&self) -> CatalogResult<HashMap<String, i64>>;

    // ── Study locks ─────────────────────────────────────────────────────

    /// Acquire the advisory lock of a study for `duration`, waiting at most
    /// `timeout`. Fails with `Timeout` when the lock cannot be obtained.
    async fn lock_study(
        &self,
        study_id: i64,
        duration: Duration,
        timeout: Duration,
    ) -> CatalogResult<LockToken>;

    /// Release a study lock. Idempotent; releasing an expired or foreign
    /// token is silently ignored.
    async fn unlock_study(&self, study_id: i64, token: LockToken) -> CatalogResult<()>;

    // ── Entities ────────────────────────────────────────────────────────

    /// Create an entity and return its assigned id.
    async fn create_entity(&self, record: &EntityRecord) -> CatalogResult<i64>;

    /// Fetch an entity by kind and id.
    async fn entity(&self, kind: EntityKind, id: i64) -> CatalogResult<Option<EntityRecord>>;

    /// Search entities.
    async fn find_entities(&self, query: &EntityQuery) -> CatalogResult<Vec<EntityRecord>>;

    /// Replace an entity record (matched by kind and id).
    async fn update_entity(&self, record: &EntityRecord) -> CatalogResult<()>;

    /// Update only the lifecycle status of an entity.
    async fn set_entity_status(
        &self,
        kind: EntityKind,
        id: i64,
        status: EntityStatus,
    ) -> CatalogResult<()>;

    /// Remove an entity record permanently.
    async fn delete_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()>;

    /// Fail with `NotFound` unless the entity exists.
    async fn check_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()>;

    /// The study an entity belongs to.
    async fn study_of_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<i64>;

    // ── ACLs ────────────────────────────────────────────────────────────

    /// ACL entries of an entity for the given members, in storage order.
    async fn entity_acls(
        &self,
        kind: EntityKind,
        id: i64,
        members: &[Member],
    ) -> CatalogResult<Vec<AclEntry>>;

    /// Every ACL entry of an entity.
    async fn all_entity_acls(&self, kind: EntityKind, id: i64) -> CatalogResult<Vec<AclEntry>>;

    /// Create an ACL entry. Fails with `Precondition` when the member
    /// already has an entry on the entity.
    async fn create_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        entry: &AclEntry,
    ) -> CatalogResult<AclEntry>;

    /// Replace the permission set of an existing entry.
    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()>;

    /// Add permissions to an existing entry.
    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()>;

    /// Remove permissions from an existing entry.
    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()>;

    /// Remove a member's entry entirely. Fails with `NotFound` when the
    /// member has no entry.
    async fn remove_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
    ) -> CatalogResult<()>;

    /// Bulk ACL lookup for the file-path walk: for each requested path of a
    /// study, the entries defined for any of the given members. Paths with
    /// no entries are absent from the result.
    async fn path_acls(
        &self,
        study_id: i64,
        paths: &[String],
        members: &[Member],
    ) -> CatalogResult<HashMap<String, Vec<AclEntry>>>;
}
