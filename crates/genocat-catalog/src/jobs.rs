//! Job read operations: bulk info, search, and the visit flag.
//!
//! Bulk operations accept references in input order and return one result
//! envelope per reference; the permission check and the envelope are
//! independent per id. In silent mode per-item failures become per-item
//! error envelopes instead of aborting the batch.

use std::sync::Arc;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::MetadataAdaptor;
use genocat_core::types::record::{EntityKind, EntityQuery};
use genocat_core::types::response::QueryResult;
use genocat_entity::job::Job;
use genocat_entity::permission::JobPermission;

use crate::authz::AuthorizationManager;
use crate::resolver::CatalogResolver;

/// Job reads over the resolver and the authorization manager.
#[derive(Clone)]
pub struct JobManager {
    adaptor: Arc<dyn MetadataAdaptor>,
    authz: AuthorizationManager,
    resolver: CatalogResolver,
}

impl JobManager {
    /// Create a job manager.
    pub fn new(
        adaptor: Arc<dyn MetadataAdaptor>,
        authz: AuthorizationManager,
        resolver: CatalogResolver,
    ) -> Self {
        Self {
            adaptor,
            authz,
            resolver,
        }
    }

    /// Fetch jobs by reference, preserving input order.
    pub async fn get(
        &self,
        user_id: &str,
        job_refs: &[String],
        study_ref: Option<&str>,
        silent: bool,
    ) -> CatalogResult<Vec<QueryResult<Job>>> {
        let resources = self
            .resolver
            .entity_ids(user_id, EntityKind::Job, job_refs, study_ref, silent)
            .await?;

        let mut results = Vec::with_capacity(job_refs.len());
        for (job_ref, id) in job_refs.iter().zip(resources.ids.iter()) {
            let envelope = match id {
                Some(id) => match self.fetch_one(user_id, *id).await {
                    Ok(job) => {
                        let mut result = QueryResult::new(job.name.clone(), vec![job]);
                        result.id = job_ref.clone();
                        result
                    }
                    Err(e) if silent => QueryResult::error(job_ref.clone(), e.message),
                    Err(e) => return Err(e),
                },
                None => QueryResult::error(
                    job_ref.clone(),
                    format!("Job id '{job_ref}' does not exist"),
                ),
            };
            results.push(envelope);
        }
        Ok(results)
    }

    async fn fetch_one(&self, user_id: &str, job_id: i64) -> CatalogResult<Job> {
        self.authz
            .check_entity_permission(job_id, user_id, JobPermission::View)
            .await?;
        let record = self
            .adaptor
            .entity(EntityKind::Job, job_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("Job id '{job_id}' does not exist")))?;
        Job::from_record(&record)
    }

    /// Mark a job as visited and return it. Requires `VIEW`.
    pub async fn visit(
        &self,
        user_id: &str,
        job_ref: &str,
        study_ref: Option<&str>,
    ) -> CatalogResult<QueryResult<Job>> {
        let resource = self
            .resolver
            .entity_id(user_id, EntityKind::Job, job_ref, study_ref)
            .await?;
        self.authz
            .check_entity_permission(resource.id, user_id, JobPermission::View)
            .await?;

        let mut record = self
            .adaptor
            .entity(EntityKind::Job, resource.id)
            .await?
            .ok_or_else(|| {
                CatalogError::not_found(format!("Job id '{job_ref}' does not exist"))
            })?;
        record.visited = Some(true);
        self.adaptor.update_entity(&record).await?;

        let job = Job::from_record(&record)?;
        Ok(QueryResult::new("visit job", vec![job]))
    }

    /// Search jobs in a study, optionally by name, dropping the ones the
    /// caller cannot view.
    pub async fn search(
        &self,
        user_id: &str,
        study_ref: &str,
        name: Option<&str>,
    ) -> CatalogResult<QueryResult<Job>> {
        let study_id = self.resolver.study_id(user_id, study_ref).await?;

        let mut query = EntityQuery::kind(EntityKind::Job).in_study(study_id.get());
        if let Some(name) = name {
            query = query.named(name);
        }
        let records = self.adaptor.find_entities(&query).await?;
        let visible = self
            .authz
            .filter_entities::<JobPermission>(user_id, study_id, records)
            .await?;

        let jobs = visible
            .iter()
            .map(Job::from_record)
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(QueryResult::new("search jobs", jobs))
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager").finish()
    }
}
