//! The study configuration manager.
//!
//! Keeps a per-process cache of configuration documents keyed by both study
//! id and study name (two maps kept consistent). Reads present the cached
//! timestamp to the adaptor, which returns nothing when the cached version
//! is current; callers receive defensive copies unless they ask for a
//! read-only view. Writes happen only inside the study lock.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use genocat_core::config::LockConfig;
use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::traits::{LockToken, MetadataAdaptor};
use genocat_core::types::id::{CohortId, FileId, SampleId, StudyId};
use genocat_core::types::study::{BatchStatus, StudyConfiguration};

use crate::operations::set_status;

/// How a configuration read behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Serve straight from the process cache without consulting the
    /// adaptor.
    pub cached: bool,
}

impl ReadOptions {
    /// Fresh read: validate the cached timestamp against the adaptor.
    pub fn fresh() -> Self {
        Self { cached: false }
    }

    /// Cached read: use the process cache when populated.
    pub fn cached() -> Self {
        Self { cached: true }
    }
}

/// Manager over the injected metadata adaptor.
pub struct StudyConfigurationManager {
    adaptor: Arc<dyn MetadataAdaptor>,
    lock: LockConfig,
    by_id: DashMap<StudyId, Arc<StudyConfiguration>>,
    by_name: DashMap<String, Arc<StudyConfiguration>>,
}

impl StudyConfigurationManager {
    /// Create a manager with an empty cache.
    pub fn new(adaptor: Arc<dyn MetadataAdaptor>, lock: LockConfig) -> Self {
        Self {
            adaptor,
            lock,
            by_id: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    fn store(&self, config: StudyConfiguration) -> Arc<StudyConfiguration> {
        let config = Arc::new(config);
        self.by_id.insert(config.study_id, Arc::clone(&config));
        self.by_name
            .insert(config.study_name.clone(), Arc::clone(&config));
        config
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Read-only view of a study configuration. No defensive copy is made;
    /// the returned value must not be mutated into a later update.
    pub async fn get_read_only(
        &self,
        study_id: StudyId,
        options: ReadOptions,
    ) -> CatalogResult<Option<Arc<StudyConfiguration>>> {
        let cached = self.by_id.get(&study_id).map(|e| Arc::clone(e.value()));
        match cached {
            Some(current) => {
                if options.cached {
                    return Ok(Some(current));
                }
                match self
                    .adaptor
                    .study_configuration_by_id(study_id.get(), Some(current.timestamp))
                    .await?
                {
                    // No changes since our timestamp.
                    None => Ok(Some(current)),
                    Some(fresh) => Ok(Some(self.store(fresh))),
                }
            }
            None => {
                match self
                    .adaptor
                    .study_configuration_by_id(study_id.get(), None)
                    .await?
                {
                    Some(fresh) => Ok(Some(self.store(fresh))),
                    None => Ok(None),
                }
            }
        }
    }

    /// Defensive copy of a study configuration.
    pub async fn get(
        &self,
        study_id: StudyId,
        options: ReadOptions,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        Ok(self
            .get_read_only(study_id, options)
            .await?
            .map(|arc| (*arc).clone()))
    }

    /// Defensive copy, looked up by study name. Numeric names are treated
    /// as ids.
    pub async fn get_by_name(
        &self,
        study_name: &str,
        options: ReadOptions,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        if let Ok(id) = study_name.parse::<i64>() {
            return self.get(StudyId::new(id), options).await;
        }

        let cached = self.by_name.get(study_name).map(|e| Arc::clone(e.value()));
        let result = match cached {
            Some(current) => {
                if options.cached {
                    return Ok(Some((*current).clone()));
                }
                match self
                    .adaptor
                    .study_configuration_by_name(study_name, Some(current.timestamp))
                    .await?
                {
                    None => return Ok(Some((*current).clone())),
                    Some(fresh) => Some(self.store(fresh)),
                }
            }
            None => self
                .adaptor
                .study_configuration_by_name(study_name, None)
                .await?
                .map(|fresh| self.store(fresh)),
        };
        Ok(result.map(|arc| (*arc).clone()))
    }

    /// Map of study name → id for every known study.
    pub async fn studies(&self) -> CatalogResult<std::collections::HashMap<String, i64>> {
        self.adaptor.studies().await
    }

    /// Every known study name.
    pub async fn study_names(&self) -> CatalogResult<Vec<String>> {
        Ok(self.studies().await?.into_keys().collect())
    }

    // ── Locking and updates ─────────────────────────────────────────────

    /// Acquire the study lock with the configured duration and timeout.
    pub async fn lock_study(&self, study_id: StudyId) -> CatalogResult<LockToken> {
        self.adaptor
            .lock_study(study_id.get(), self.lock.duration(), self.lock.timeout())
            .await
            .map_err(|e| {
                CatalogError::new(e.kind, format!("Unable to lock the study {study_id}: {}", e.message))
            })
    }

    /// Release the study lock. Expired tokens are ignored.
    pub async fn unlock_study(&self, study_id: StudyId, token: LockToken) -> CatalogResult<()> {
        self.adaptor.unlock_study(study_id.get(), token).await
    }

    /// Persist a configuration: stamp a monotonic timestamp, refresh the
    /// process cache with a copy, and write through the adaptor. Must be
    /// called while holding the study lock.
    pub async fn update_study_configuration(
        &self,
        mut config: StudyConfiguration,
    ) -> CatalogResult<StudyConfiguration> {
        let now = Utc::now().timestamp_millis();
        let timestamp = now.max(config.timestamp + 1);
        tracing::debug!(
            study = config.study_id.get(),
            from = config.timestamp,
            to = timestamp,
            "Updating study configuration timestamp"
        );
        config.timestamp = timestamp;

        self.store(config.clone());
        self.adaptor.update_study_configuration(&config).await?;
        Ok(config)
    }

    /// Lock, read fresh, apply `updater`, persist, unlock. The lock is
    /// released on every exit path.
    pub async fn lock_and_update<F>(
        &self,
        study_id: StudyId,
        updater: F,
    ) -> CatalogResult<StudyConfiguration>
    where
        F: FnOnce(StudyConfiguration) -> CatalogResult<StudyConfiguration>,
    {
        let token = self.lock_study(study_id).await?;
        let result = self.locked_update(study_id, updater).await;
        if let Err(e) = self.unlock_study(study_id, token).await {
            tracing::warn!(study = study_id.get(), error = %e, "Failed to release study lock");
        }
        result
    }

    async fn locked_update<F>(
        &self,
        study_id: StudyId,
        updater: F,
    ) -> CatalogResult<StudyConfiguration>
    where
        F: FnOnce(StudyConfiguration) -> CatalogResult<StudyConfiguration>,
    {
        let config = self
            .get(study_id, ReadOptions::fresh())
            .await?
            .ok_or_else(|| {
                CatalogError::not_found(format!("Study configuration {study_id} not found"))
            })?;
        let updated = updater(config)?;
        self.update_study_configuration(updated).await
    }

    /// Change the status of a batch operation under the study lock,
    /// returning the previous status.
    pub async fn atomic_set_status(
        &self,
        study_id: StudyId,
        status: BatchStatus,
        operation_name: &str,
        file_ids: &[FileId],
    ) -> CatalogResult<BatchStatus> {
        let mut previous = None;
        self.lock_and_update(study_id, |mut config| {
            previous = Some(set_status(&mut config, status, operation_name, file_ids)?);
            Ok(config)
        })
        .await?;
        previous.ok_or_else(|| CatalogError::internal("Batch status update produced no result"))
    }

    // ── Storage-level reference resolution ──────────────────────────────

    /// Resolve study references to ids, replacing names by ids and
    /// excluding references negated with `!`.
    pub async fn study_ids(&self, references: &[String]) -> CatalogResult<Vec<StudyId>> {
        let studies = self.studies().await?;
        let mut ids = Vec::with_capacity(references.len());
        for reference in references {
            if let Some(id) = Self::study_id_with(reference, true, &studies)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Resolve one study reference. Negated references resolve to `None`
    /// when `skip_negated` is set and to their plain id otherwise.
    pub fn study_id_with(
        reference: &str,
        skip_negated: bool,
        studies: &std::collections::HashMap<String, i64>,
    ) -> CatalogResult<Option<StudyId>> {
        let mut name = reference;
        if let Some(stripped) = name.strip_prefix('!') {
            if skip_negated {
                return Ok(None);
            }
            name = stripped;
        }
        let id = if name.bytes().all(|b| b.is_ascii_digit()) && !name.is_empty() {
            name.parse::<i64>().map_err(|_| {
                CatalogError::invalid_argument(format!("Invalid study reference '{reference}'"))
            })?
        } else {
            *studies.get(name).ok_or_else(|| {
                CatalogError::not_found(format!(
                    "Study {name} not found. Available studies: {:?}",
                    studies.keys().collect::<Vec<_>>()
                ))
            })?
        };
        if !studies.values().any(|v| *v == id) {
            return Err(CatalogError::not_found(format!(
                "Study {id} not found. Available studies: {:?}",
                studies.keys().collect::<Vec<_>>()
            )));
        }
        Ok(Some(StudyId::new(id)))
    }

    /// File id within a study configuration, from a name or numeric
    /// reference. `None` when the file is unknown.
    pub fn file_id_from_study(reference: &str, config: &StudyConfiguration) -> Option<FileId> {
        resource_id_from_study(reference, config, &config.file_ids)
    }

    /// Sample id within a study configuration. With `indexed`, only
    /// samples present in an indexed file resolve.
    pub fn sample_id_from_study(
        reference: &str,
        config: &StudyConfiguration,
        indexed: bool,
    ) -> Option<SampleId> {
        let sample_id = resource_id_from_study(reference, config, &config.sample_ids)?;
        if !indexed {
            return Some(sample_id);
        }
        for file_id in &config.indexed_files {
            if config
                .samples_in_files
                .get(file_id)
                .is_some_and(|samples| samples.contains(&sample_id))
            {
                return Some(sample_id);
            }
        }
        None
    }

    /// Cohort id within a study configuration.
    pub fn cohort_id_from_study(reference: &str, config: &StudyConfiguration) -> Option<CohortId> {
        resource_id_from_study(reference, config, &config.cohort_ids)
    }

    /// File ids within a study, failing on the first unknown reference.
    pub fn file_ids_from_study(
        references: &[String],
        config: &StudyConfiguration,
    ) -> CatalogResult<Vec<FileId>> {
        references
            .iter()
            .map(|reference| {
                Self::file_id_from_study(reference, config).ok_or_else(|| {
                    CatalogError::not_found(format!(
                        "File {reference} not found in study {}",
                        config.study_name
                    ))
                })
            })
            .collect()
    }
}

/// Resolve a resource reference against one of the name↔id bimaps.
///
/// Accepted shapes: numeric id (validated against the map values), plain
/// name, `study:resource` (the study part must match this configuration),
/// and the negation prefix `!` which is stripped before resolution.
fn resource_id_from_study<I>(
    reference: &str,
    config: &StudyConfiguration,
    map: &std::collections::HashMap<String, I>,
) -> Option<I>
where
    I: Copy + From<i64> + Into<i64> + PartialEq,
{
    let mut value = reference.strip_prefix('!').unwrap_or(reference);

    if let Some((study, resource)) = value.split_once(':') {
        let matches_study = study == config.study_name
            || study
                .parse::<i64>()
                .is_ok_and(|id| id == config.study_id.get());
        if !matches_study {
            return None;
        }
        value = resource;
    }

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let id: i64 = value.parse().ok()?;
        let typed = I::from(id);
        map.values().any(|v| *v == typed).then_some(typed)
    } else {
        map.get(value).copied()
    }
}

impl std::fmt::Debug for StudyConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyConfigurationManager")
            .field("cached_studies", &self.by_id.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StudyConfiguration {
        let mut sc = StudyConfiguration::new(StudyId::new(1), "platinum");
        sc.file_ids.insert("chr20.vcf.gz".into(), FileId::new(10));
        sc.sample_ids.insert("NA12877".into(), SampleId::new(1));
        sc.sample_ids.insert("NA12878".into(), SampleId::new(2));
        sc.cohort_ids.insert("ALL".into(), CohortId::new(7));
        sc.samples_in_files
            .insert(FileId::new(10), vec![SampleId::new(1), SampleId::new(2)]);
        sc.indexed_files.insert(FileId::new(10));
        sc
    }

    #[test]
    fn test_resource_resolution_shapes() {
        let sc = config();
        assert_eq!(
            StudyConfigurationManager::file_id_from_study("chr20.vcf.gz", &sc),
            Some(FileId::new(10))
        );
        assert_eq!(
            StudyConfigurationManager::file_id_from_study("10", &sc),
            Some(FileId::new(10))
        );
        assert_eq!(
            StudyConfigurationManager::file_id_from_study("platinum:chr20.vcf.gz", &sc),
            Some(FileId::new(10))
        );
        assert_eq!(
            StudyConfigurationManager::file_id_from_study("1:chr20.vcf.gz", &sc),
            Some(FileId::new(10))
        );
        assert_eq!(
            StudyConfigurationManager::file_id_from_study("other:chr20.vcf.gz", &sc),
            None
        );
        assert_eq!(StudyConfigurationManager::file_id_from_study("99", &sc), None);
    }

    #[test]
    fn test_negated_reference_is_stripped() {
        let sc = config();
        assert_eq!(
            StudyConfigurationManager::cohort_id_from_study("!ALL", &sc),
            Some(CohortId::new(7))
        );
    }

    #[test]
    fn test_indexed_sample_resolution() {
        let mut sc = config();
        assert_eq!(
            StudyConfigurationManager::sample_id_from_study("NA12877", &sc, true),
            Some(SampleId::new(1))
        );
        sc.indexed_files.clear();
        assert_eq!(
            StudyConfigurationManager::sample_id_from_study("NA12877", &sc, true),
            None
        );
        assert_eq!(
            StudyConfigurationManager::sample_id_from_study("NA12877", &sc, false),
            Some(SampleId::new(1))
        );
    }

    #[test]
    fn test_study_id_with_negation_and_names() {
        let studies = std::collections::HashMap::from([("platinum".to_string(), 1)]);
        assert_eq!(
            StudyConfigurationManager::study_id_with("platinum", true, &studies).unwrap(),
            Some(StudyId::new(1))
        );
        assert_eq!(
            StudyConfigurationManager::study_id_with("!platinum", true, &studies).unwrap(),
            None
        );
        assert_eq!(
            StudyConfigurationManager::study_id_with("!platinum", false, &studies).unwrap(),
            Some(StudyId::new(1))
        );
        assert!(StudyConfigurationManager::study_id_with("hg38", true, &studies).is_err());
    }
}
