//! Shared fixtures for the catalog integration tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use genocat_catalog::{AclMutator, AuthorizationManager, CatalogResolver, JobManager};
use genocat_core::config::LockConfig;
use genocat_core::result::CatalogResult;
use genocat_core::traits::{LockToken, MetadataAdaptor};
use genocat_core::types::acl::{AclEntry, Group};
use genocat_core::types::id::StudyId;
use genocat_core::types::member::Member;
use genocat_core::types::record::{EntityKind, EntityQuery, EntityRecord};
use genocat_core::types::status::EntityStatus;
use genocat_core::types::study::StudyConfiguration;
use genocat_database::MemoryMetadataAdaptor;
use genocat_entity::job::Job;

pub const OWNER: &str = "owner";

/// Adaptor wrapper recording which paths the bulk path-ACL lookup is asked
/// for, to pin the request-scoped cache behavior.
pub struct CountingAdaptor {
    inner: Arc<MemoryMetadataAdaptor>,
    pub requested_paths: Mutex<Vec<String>>,
}

impl CountingAdaptor {
    pub fn new(inner: Arc<MemoryMetadataAdaptor>) -> Self {
        Self {
            inner,
            requested_paths: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MetadataAdaptor for CountingAdaptor {
    async fn project_id_by_alias(&self, owner: &str, alias: &str) -> CatalogResult<Option<i64>> {
        self.inner.project_id_by_alias(owner, alias).await
    }

    async fn find_project_ids(
        &self,
        owner: Option<&str>,
        alias: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        self.inner.find_project_ids(owner, alias).await
    }

    async fn project_owner(&self, project_id: i64) -> CatalogResult<String> {
        self.inner.project_owner(project_id).await
    }

    async fn study_ids_of_project(&self, project_id: i64) -> CatalogResult<Vec<i64>> {
        self.inner.study_ids_of_project(project_id).await
    }

    async fn study_id_by_alias(&self, project_id: i64, alias: &str) -> CatalogResult<Option<i64>> {
        self.inner.study_id_by_alias(project_id, alias).await
    }

    async fn find_study_ids_by_alias(
        &self,
        alias: &str,
        accessible_to: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        self.inner.find_study_ids_by_alias(alias, accessible_to).await
    }

    async fn study_owner(&self, study_id: i64) -> CatalogResult<String> {
        self.inner.study_owner(study_id).await
    }

    async fn group(&self, study_id: i64, name: &str) -> CatalogResult<Option<Group>> {
        self.inner.group(study_id, name).await
    }

    async fn group_of_members(
        &self,
        study_id: i64,
        user_ids: &[String],
    ) -> CatalogResult<Option<Group>> {
        self.inner.group_of_members(study_id, user_ids).await
    }

    async fn member_exists(&self, study_id: i64, member: &Member) -> CatalogResult<bool> {
        self.inner.member_exists(study_id, member).await
    }

    async fn daemon_acl(&self, member: &Member) -> CatalogResult<Option<AclEntry>> {
        self.inner.daemon_acl(member).await
    }

    async fn study_configuration_by_id(
        &self,
        study_id: i64,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        self.inner
            .study_configuration_by_id(study_id, cached_timestamp)
            .await
    }

    async fn study_configuration_by_name(
        &self,
        study_name: &str,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        self.inner
            .study_configuration_by_name(study_name, cached_timestamp)
            .await
    }

    async fn update_study_configuration(&self, config: &StudyConfiguration) -> CatalogResult<()> {
        self.inner.update_study_configuration(config).await
    }

    async fn studies(&self) -> CatalogResult<HashMap<String, i64>> {
        self.inner.studies().await
    }

    async fn lock_study(
        &self,
        study_id: i64,
        duration: Duration,
        timeout: Duration,
    ) -> CatalogResult<LockToken> {
        self.inner.lock_study(study_id, duration, timeout).await
    }

    async fn unlock_study(&self, study_id: i64, token: LockToken) -> CatalogResult<()> {
        self.inner.unlock_study(study_id, token).await
    }

    async fn create_entity(&self, record: &EntityRecord) -> CatalogResult<i64> {
        self.inner.create_entity(record).await
    }

    async fn entity(&self, kind: EntityKind, id: i64) -> CatalogResult<Option<EntityRecord>> {
        self.inner.entity(kind, id).await
    }

    async fn find_entities(&self, query: &EntityQuery) -> CatalogResult<Vec<EntityRecord>> {
        self.inner.find_entities(query).await
    }

    async fn update_entity(&self, record: &EntityRecord) -> CatalogResult<()> {
        self.inner.update_entity(record).await
    }

    async fn set_entity_status(
        &self,
        kind: EntityKind,
        id: i64,
        status: EntityStatus,
    ) -> CatalogResult<()> {
        self.inner.set_entity_status(kind, id, status).await
    }

    async fn delete_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        self.inner.delete_entity(kind, id).await
    }

    async fn check_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        self.inner.check_entity(kind, id).await
    }

    async fn study_of_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<i64> {
        self.inner.study_of_entity(kind, id).await
    }

    async fn entity_acls(
        &self,
        kind: EntityKind,
        id: i64,
        members: &[Member],
    ) -> CatalogResult<Vec<AclEntry>> {
        self.inner.entity_acls(kind, id, members).await
    }

    async fn all_entity_acls(&self, kind: EntityKind, id: i64) -> CatalogResult<Vec<AclEntry>> {
        self.inner.all_entity_acls(kind, id).await
    }

    async fn create_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        entry: &AclEntry,
    ) -> CatalogResult<AclEntry> {
        self.inner.create_entity_acl(kind, id, entry).await
    }

    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        self.inner.set_acls_to_member(kind, id, member, permissions).await
    }

    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        self.inner.add_acls_to_member(kind, id, member, permissions).await
    }

    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        self.inner
            .remove_acls_from_member(kind, id, member, permissions)
            .await
    }

    async fn remove_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
    ) -> CatalogResult<()> {
        self.inner.remove_entity_acl(kind, id, member).await
    }

    async fn path_acls(
        &self,
        study_id: i64,
        paths: &[String],
        members: &[Member],
    ) -> CatalogResult<HashMap<String, Vec<AclEntry>>> {
        self.requested_paths
            .lock()
            .unwrap()
            .extend(paths.iter().cloned());
        self.inner.path_acls(study_id, paths, members).await
    }
}

/// One seeded project/study with every manager wired over it.
pub struct TestCatalog {
    pub memory: Arc<MemoryMetadataAdaptor>,
    pub counting: Arc<CountingAdaptor>,
    pub adaptor: Arc<dyn MetadataAdaptor>,
    pub authz: AuthorizationManager,
    pub resolver: CatalogResolver,
    pub mutator: AclMutator,
    pub jobs: JobManager,
    pub project_id: i64,
    pub study_id: StudyId,
}

impl TestCatalog {
    pub async fn new() -> Self {
        let memory = Arc::new(MemoryMetadataAdaptor::new(0));
        let project_id = memory.seed_project(OWNER, "1000g").await.unwrap();
        let study_id = memory.seed_study(project_id, "phase1").await.unwrap();

        let counting = Arc::new(CountingAdaptor::new(Arc::clone(&memory)));
        let adaptor: Arc<dyn MetadataAdaptor> = counting.clone();
        let authz = AuthorizationManager::new(Arc::clone(&adaptor));
        let resolver = CatalogResolver::new(Arc::clone(&adaptor), 0);
        let mutator = AclMutator::new(
            Arc::clone(&adaptor),
            authz.clone(),
            LockConfig {
                duration_ms: 2_000,
                timeout_ms: 500,
            },
        );
        let jobs = JobManager::new(Arc::clone(&adaptor), authz.clone(), resolver.clone());

        Self {
            memory,
            counting,
            adaptor,
            authz,
            resolver,
            mutator,
            jobs,
            project_id,
            study_id: StudyId::new(study_id),
        }
    }

    /// Create a `READY` job in the seeded study.
    pub async fn seed_job(&self, name: &str) -> i64 {
        let job = Job::new(
            name,
            self.study_id,
            "samtools",
            format!("/data/jobs/{name}"),
            "samtools stats in.bam",
        );
        self.adaptor
            .create_entity(&job.to_record().unwrap())
            .await
            .unwrap()
    }

    /// Create a file (or folder, when the path ends with `/`).
    pub async fn seed_file(&self, path: &str) -> i64 {
        let mut record = EntityRecord::new(
            EntityKind::File,
            Some(self.study_id.get()),
            genocat_entity::file::file_name(path),
        );
        record.path = Some(path.to_string());
        self.adaptor.create_entity(&record).await.unwrap()
    }

    /// Create a sample carrying annotation sets.
    pub async fn seed_sample(&self, name: &str) -> i64 {
        let mut record =
            EntityRecord::new(EntityKind::Sample, Some(self.study_id.get()), name);
        record.attributes = serde_json::json!({
            "annotation_sets": [{ "name": "clinical", "annotations": { "age": 40 } }]
        });
        self.adaptor.create_entity(&record).await.unwrap()
    }

    /// Grant a study-level ACL as the owner.
    pub async fn grant_study_acl(&self, member: Member, permissions: &[&str]) {
        let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        self.mutator
            .create_study_acls(OWNER, self.study_id, &[member], &permissions, None)
            .await
            .unwrap();
    }
}
