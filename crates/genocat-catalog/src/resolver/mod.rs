//! Identifier resolution.
//!
//! Turns the mixed textual/numeric references accepted at the API surface
//! (`user@projectAlias:studyAlias`, bare names, negated `!name`, numeric ids
//! above the configured offset, comma-separated lists) into typed ids,
//! validating existence along the way.

mod reference;

pub use reference::{is_negated, remove_negation, split_reference_list};

use std::collections::HashMap;
use std::sync::Arc;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::id::{ProjectId, StudyId};
use genocat_core::types::member::ANONYMOUS_USER;
use genocat_core::types::record::{EntityKind, EntityQuery};
use genocat_core::traits::MetadataAdaptor;

/// A fully resolved single-entity reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// The caller the reference was resolved for.
    pub user_id: String,
    /// The enclosing study.
    pub study_id: StudyId,
    /// The entity id.
    pub id: i64,
}

/// A fully resolved bulk reference, preserving input order.
///
/// In silent mode unresolvable items are `None`; legacy boundaries render
/// them as `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIds {
    /// The caller the references were resolved for.
    pub user_id: String,
    /// The enclosing study.
    pub study_id: StudyId,
    /// Per-item ids, in input order.
    pub ids: Vec<Option<i64>>,
}

/// Resolves textual references against the metadata store.
#[derive(Clone)]
pub struct CatalogResolver {
    adaptor: Arc<dyn MetadataAdaptor>,
    id_offset: i64,
}

impl CatalogResolver {
    /// Create a resolver. `id_offset` comes from
    /// `CatalogSettings::id_offset`: numeric references at or below it are
    /// treated as names.
    pub fn new(adaptor: Arc<dyn MetadataAdaptor>, id_offset: i64) -> Self {
        Self { adaptor, id_offset }
    }

    /// Parse a reference as a numeric id above the offset.
    fn numeric_id(&self, reference: &str) -> Option<i64> {
        if reference.is_empty() || !reference.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        reference.parse::<i64>().ok().filter(|id| *id > self.id_offset)
    }

    /// Resolve a project reference for a caller.
    ///
    /// Accepted shapes: a numeric id above the offset, `user@alias`, or a
    /// bare alias. The owner defaults to the caller; anonymous callers
    /// search by alias alone and fail `Ambiguous` when the alias is not
    /// unique.
    pub async fn project_id(&self, user_id: &str, project_ref: &str) -> CatalogResult<ProjectId> {
        if let Some(id) = self.numeric_id(project_ref) {
            self.adaptor.check_entity(EntityKind::Project, id).await?;
            return Ok(ProjectId::new(id));
        }

        let (owner, alias) = match project_ref.split_once('@') {
            Some((owner, alias)) => (owner.to_string(), Some(alias.to_string())),
            None if project_ref.is_empty() => (user_id.to_string(), None),
            None => (user_id.to_string(), Some(project_ref.to_string())),
        };

        if owner != ANONYMOUS_USER {
            if let Some(alias) = &alias {
                return match self.adaptor.project_id_by_alias(&owner, alias).await? {
                    Some(id) => Ok(ProjectId::new(id)),
                    None => Err(CatalogError::not_found(format!(
                        "No projects found with alias {alias}"
                    ))),
                };
            }
        }

        let ids = self
            .adaptor
            .find_project_ids(
                (owner != ANONYMOUS_USER).then_some(owner.as_str()),
                alias.as_deref(),
            )
            .await?;
        match ids.as_slice() {
            [id] => Ok(ProjectId::new(*id)),
            [] => Err(CatalogError::not_found(format!(
                "No projects found with alias {}",
                alias.as_deref().unwrap_or("")
            ))),
            _ => Err(CatalogError::ambiguous(format!(
                "More than one project found with alias {}",
                alias.as_deref().unwrap_or("")
            ))),
        }
    }

    /// Resolve a study reference for a caller.
    ///
    /// Accepted shapes: a numeric id above the offset,
    /// `user@projectAlias:studyAlias`, `projectAlias:studyAlias`, or a bare
    /// study alias searched within the caller's accessible studies.
    pub async fn study_id(&self, user_id: &str, study_ref: &str) -> CatalogResult<StudyId> {
        let ids = self.study_ids(user_id, study_ref).await?;
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(CatalogError::not_found(format!(
                "No studies found for '{study_ref}'"
            ))),
            _ => Err(CatalogError::ambiguous(format!(
                "More than one study found for '{study_ref}'"
            ))),
        }
    }

    /// Resolve a study reference to every matching study.
    pub async fn study_ids(&self, user_id: &str, study_ref: &str) -> CatalogResult<Vec<StudyId>> {
        if study_ref.is_empty() {
            return Err(CatalogError::invalid_argument("Missing study parameter"));
        }
        if let Some(id) = self.numeric_id(study_ref) {
            self.adaptor.check_entity(EntityKind::Study, id).await?;
            return Ok(vec![StudyId::new(id)]);
        }

        let (project_part, study_alias) = match study_ref.rsplit_once(':') {
            Some((project, study)) => (Some(project), study),
            None => (None, study_ref),
        };

        match project_part {
            Some(project_ref) => {
                let project_id = self.project_id(user_id, project_ref).await?;
                match self
                    .adaptor
                    .study_id_by_alias(project_id.get(), study_alias)
                    .await?
                {
                    Some(id) => Ok(vec![StudyId::new(id)]),
                    None => Err(CatalogError::not_found(format!(
                        "Study {study_alias} not found in project {project_ref}"
                    ))),
                }
            }
            None => {
                let ids = self
                    .adaptor
                    .find_study_ids_by_alias(study_alias, Some(user_id))
                    .await?;
                Ok(ids.into_iter().map(StudyId::new).collect())
            }
        }
    }

    /// Resolve a single entity reference.
    ///
    /// Comma-separated lists are rejected here; use
    /// [`CatalogResolver::entity_ids`] for bulk resolution.
    pub async fn entity_id(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_ref: &str,
        study_ref: Option<&str>,
    ) -> CatalogResult<ResourceId> {
        if entity_ref.is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "Missing {} parameter",
                kind.as_str()
            )));
        }

        if let Some(id) = self.numeric_id(entity_ref) {
            self.adaptor.check_entity(kind, id).await?;
            let study_id = self.adaptor.study_of_entity(kind, id).await?;
            return Ok(ResourceId {
                user_id: user_id.to_string(),
                study_id: StudyId::new(study_id),
                id,
            });
        }

        if entity_ref.contains(',') {
            return Err(CatalogError::invalid_argument(format!(
                "More than one {} found",
                kind.as_str()
            )));
        }

        let study_id = self
            .study_id(user_id, study_ref.unwrap_or_default())
            .await?;
        let matches = self
            .adaptor
            .find_entities(
                &EntityQuery::kind(kind)
                    .in_study(study_id.get())
                    .named(entity_ref),
            )
            .await?;
        match matches.as_slice() {
            [record] => Ok(ResourceId {
                user_id: user_id.to_string(),
                study_id,
                id: record.id,
            }),
            [] => Err(CatalogError::not_found(format!(
                "{} '{entity_ref}' not found in study {study_id}",
                kind.label()
            ))),
            _ => Err(CatalogError::ambiguous(format!(
                "More than one {} found under '{entity_ref}' in study {study_id}",
                kind.as_str()
            ))),
        }
    }

    /// Resolve a bulk entity reference, preserving input order.
    ///
    /// In silent mode unresolvable items become `None` instead of aborting
    /// the batch; otherwise the first missing reference fails the whole
    /// call with `NotFound`.
    pub async fn entity_ids(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_refs: &[String],
        study_ref: Option<&str>,
        silent: bool,
    ) -> CatalogResult<ResourceIds> {
        if entity_refs.is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "Missing {} parameter",
                kind.as_str()
            )));
        }

        // A single numeric reference does not need the study parameter.
        if entity_refs.len() == 1 {
            if let Some(id) = self.numeric_id(&entity_refs[0]) {
                self.adaptor.check_entity(kind, id).await?;
                let study_id = self.adaptor.study_of_entity(kind, id).await?;
                return Ok(ResourceIds {
                    user_id: user_id.to_string(),
                    study_id: StudyId::new(study_id),
                    ids: vec![Some(id)],
                });
            }
        }

        let study_id = self
            .study_id(user_id, study_ref.unwrap_or_default())
            .await?;

        // Numeric references are validated individually; the remaining
        // names are resolved through one bulk query.
        let mut resolved: HashMap<&str, i64> = HashMap::new();
        let mut names: Vec<String> = Vec::new();
        for entity_ref in entity_refs {
            if let Some(id) = self.numeric_id(entity_ref) {
                match self.adaptor.check_entity(kind, id).await {
                    Ok(()) => {
                        resolved.insert(entity_ref.as_str(), id);
                    }
                    Err(e) if silent && e.kind == genocat_core::error::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            } else if !names.contains(entity_ref) {
                names.push(entity_ref.clone());
            }
        }

        if !names.is_empty() {
            let records = self
                .adaptor
                .find_entities(
                    &EntityQuery::kind(kind)
                        .in_study(study_id.get())
                        .named_any(names),
                )
                .await?;
            for record in &records {
                if let Some(reference) = entity_refs.iter().find(|r| **r == record.name) {
                    resolved.insert(reference.as_str(), record.id);
                }
            }
        }

        let mut ids = Vec::with_capacity(entity_refs.len());
        for entity_ref in entity_refs {
            match resolved.get(entity_ref.as_str()) {
                Some(id) => ids.push(Some(*id)),
                None if silent => ids.push(None),
                None => {
                    return Err(CatalogError::not_found(format!(
                        "{} id '{entity_ref}' does not exist",
                        kind.label()
                    )));
                }
            }
        }

        Ok(ResourceIds {
            user_id: user_id.to_string(),
            study_id,
            ids,
        })
    }
}

impl std::fmt::Debug for CatalogResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogResolver")
            .field("id_offset", &self.id_offset)
            .finish()
    }
}
