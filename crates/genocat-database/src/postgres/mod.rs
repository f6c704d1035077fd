//! PostgreSQL metadata adaptor.
//!
//! Projects and studies live in the shared `catalog_entities` table; the
//! project owner and the study's enclosing project are carried inside the
//! JSONB payload (`attributes.owner`, `attributes.project_id`). The study
//! lock is an expiry-based row in `study_locks`: acquisition atomically
//! replaces an expired holder, so mutual exclusion holds across every
//! process sharing the database.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use genocat_core::error::{CatalogError, ErrorKind};
use genocat_core::result::CatalogResult;
use genocat_core::traits::{LockToken, MetadataAdaptor};
use genocat_core::types::acl::{AclEntry, Group};
use genocat_core::types::member::Member;
use genocat_core::types::record::{EntityKind, EntityQuery, EntityRecord};
use genocat_core::types::status::EntityStatus;
use genocat_core::types::study::StudyConfiguration;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// PostgreSQL implementation of [`MetadataAdaptor`].
pub struct PostgresMetadataAdaptor {
    pool: PgPool,
    next_token: AtomicI64,
}

fn db_err(context: &str, e: sqlx::Error) -> CatalogError {
    CatalogError::with_source(ErrorKind::Database, format!("{context}: {e}"), e)
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: i64,
    kind: String,
    study_id: Option<i64>,
    name: String,
    path: Option<String>,
    status: String,
    visited: Option<bool>,
    creation_date: DateTime<Utc>,
    attributes: serde_json::Value,
}

impl EntityRow {
    fn into_record(self) -> CatalogResult<EntityRecord> {
        Ok(EntityRecord {
            id: self.id,
            kind: self.kind.parse()?,
            study_id: self.study_id,
            name: self.name,
            path: self.path,
            status: self.status.parse::<EntityStatus>()?,
            visited: self.visited,
            creation_date: self.creation_date,
            attributes: self.attributes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AclRow {
    member: String,
    permissions: Vec<String>,
}

impl AclRow {
    fn into_entry(self) -> CatalogResult<AclEntry> {
        Ok(AclEntry {
            member: self.member.parse()?,
            permissions: self.permissions.into_iter().collect(),
        })
    }
}

fn member_strings(members: &[Member]) -> Vec<String> {
    members.iter().map(Member::to_string).collect()
}

impl PostgresMetadataAdaptor {
    /// Create an adaptor over a connected pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            next_token: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    async fn entity_row(&self, kind: EntityKind, id: i64) -> CatalogResult<Option<EntityRow>> {
        sqlx::query_as::<_, EntityRow>(
            "SELECT id, kind, study_id, name, path, status, visited, creation_date, attributes \
             FROM catalog_entities WHERE kind = $1 AND id = $2",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch entity", e))
    }
}

#[async_trait]
impl MetadataAdaptor for PostgresMetadataAdaptor {
    // ── Projects and studies ────────────────────────────────────────────

    async fn project_id_by_alias(&self, owner: &str, alias: &str) -> CatalogResult<Option<i64>> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM catalog_entities \
             WHERE kind = 'project' AND name = $2 AND attributes->>'owner' = $1",
        )
        .bind(owner)
        .bind(alias)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to resolve project alias", e))?;
        Ok(row.map(|(id,)| id))
    }

    async fn find_project_ids(
        &self,
        owner: Option<&str>,
        alias: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM catalog_entities WHERE kind = 'project' \
             AND ($1::TEXT IS NULL OR attributes->>'owner' = $1) \
             AND ($2::TEXT IS NULL OR name = $2) \
             ORDER BY id",
        )
        .bind(owner)
        .bind(alias)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to search projects", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn project_owner(&self, project_id: i64) -> CatalogResult<String> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT attributes->>'owner' FROM catalog_entities \
             WHERE kind = 'project' AND id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch project owner", e))?;
        match row {
            Some((Some(owner),)) => Ok(owner),
            Some((None,)) => Err(CatalogError::internal(format!(
                "Project {project_id} has no owner"
            ))),
            None => Err(CatalogError::not_found(format!(
                "Project {project_id} not found"
            ))),
        }
    }

    async fn study_ids_of_project(&self, project_id: i64) -> CatalogResult<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM catalog_entities WHERE kind = 'study' \
             AND (attributes->>'project_id')::BIGINT = $1 ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list studies of project", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn study_id_by_alias(&self, project_id: i64, alias: &str) -> CatalogResult<Option<i64>> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM catalog_entities WHERE kind = 'study' \
             AND (attributes->>'project_id')::BIGINT = $1 AND name = $2",
        )
        .bind(project_id)
        .bind(alias)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to resolve study alias", e))?;
        Ok(row.map(|(id,)| id))
    }

    async fn find_study_ids_by_alias(
        &self,
        alias: &str,
        accessible_to: Option<&str>,
    ) -> CatalogResult<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT s.id FROM catalog_entities s \
             JOIN catalog_entities p \
               ON p.kind = 'project' AND p.id = (s.attributes->>'project_id')::BIGINT \
             WHERE s.kind = 'study' AND s.name = $1 AND ( \
               $2::TEXT IS NULL \
               OR p.attributes->>'owner' = $2 \
               OR EXISTS (SELECT 1 FROM study_groups g \
                          WHERE g.study_id = s.id AND $2 = ANY(g.user_ids)) \
               OR EXISTS (SELECT 1 FROM acl_entries a \
                          WHERE a.entity_kind = 'study' AND a.entity_id = s.id \
                            AND (a.member = $2 OR a.member = '*' OR a.member = 'anonymous' \
                                 OR a.member IN (SELECT '@' || g2.name FROM study_groups g2 \
                                                 WHERE g2.study_id = s.id \
                                                   AND $2 = ANY(g2.user_ids)))) \
             ) ORDER BY s.id",
        )
        .bind(alias)
        .bind(accessible_to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to search studies by alias", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn study_owner(&self, study_id: i64) -> CatalogResult<String> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT p.attributes->>'owner' FROM catalog_entities s \
             JOIN catalog_entities p \
               ON p.kind = 'project' AND p.id = (s.attributes->>'project_id')::BIGINT \
             WHERE s.kind = 'study' AND s.id = $1",
        )
        .bind(study_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch study owner", e))?;
        match row {
            Some((Some(owner),)) => Ok(owner),
            Some((None,)) => Err(CatalogError::internal(format!(
                "Study {study_id} has no owner"
            ))),
            None => Err(CatalogError::not_found(format!(
                "Study {study_id} not found"
            ))),
        }
    }

    // ── Groups and members ──────────────────────────────────────────────

    async fn group(&self, study_id: i64, name: &str) -> CatalogResult<Option<Group>> {
        let row = sqlx::query_as::<_, (String, Vec<String>)>(
            "SELECT name, user_ids FROM study_groups WHERE study_id = $1 AND name = $2",
        )
        .bind(study_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch group", e))?;
        Ok(row.map(|(name, user_ids)| Group::new(name, user_ids)))
    }

    async fn group_of_members(
        &self,
        study_id: i64,
        user_ids: &[String],
    ) -> CatalogResult<Option<Group>> {
        let row = sqlx::query_as::<_, (String, Vec<String>)>(
            "SELECT name, user_ids FROM study_groups \
             WHERE study_id = $1 AND user_ids && $2 LIMIT 1",
        )
        .bind(study_id)
        .bind(user_ids.to_vec())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch group of members", e))?;
        Ok(row.map(|(name, user_ids)| Group::new(name, user_ids)))
    }

    async fn member_exists(&self, study_id: i64, member: &Member) -> CatalogResult<bool> {
        match member {
            Member::User(user) => {
                let (exists,): (bool,) =
                    sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                        .bind(user)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(|e| db_err("Failed to check user", e))?;
                Ok(exists)
            }
            Member::Group(name) => {
                let (exists,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS(SELECT 1 FROM study_groups WHERE study_id = $1 AND name = $2)",
                )
                .bind(study_id)
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_err("Failed to check group", e))?;
                Ok(exists)
            }
            Member::Anyone | Member::Anonymous => Ok(true),
        }
    }

    async fn daemon_acl(&self, member: &Member) -> CatalogResult<Option<AclEntry>> {
        let row = sqlx::query_as::<_, AclRow>(
            "SELECT member, permissions FROM daemon_acls WHERE member = $1",
        )
        .bind(member.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch daemon ACL", e))?;
        row.map(AclRow::into_entry).transpose()
    }

    // ── Study configuration ─────────────────────────────────────────────

    async fn study_configuration_by_id(
        &self,
        study_id: i64,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT document FROM study_configurations \
             WHERE study_id = $1 AND ($2::BIGINT IS NULL OR updated_timestamp <> $2)",
        )
        .bind(study_id)
        .bind(cached_timestamp)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch study configuration", e))?;
        row.map(|(document,)| serde_json::from_value(document).map_err(CatalogError::from))
            .transpose()
    }

    async fn study_configuration_by_name(
        &self,
        study_name: &str,
        cached_timestamp: Option<i64>,
    ) -> CatalogResult<Option<StudyConfiguration>> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT document FROM study_configurations \
             WHERE study_name = $1 AND ($2::BIGINT IS NULL OR updated_timestamp <> $2)",
        )
        .bind(study_name)
        .bind(cached_timestamp)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch study configuration", e))?;
        row.map(|(document,)| serde_json::from_value(document).map_err(CatalogError::from))
            .transpose()
    }

    async fn update_study_configuration(&self, config: &StudyConfiguration) -> CatalogResult<()> {
        let document = serde_json::to_value(config)?;
        sqlx::query(
            "INSERT INTO study_configurations (study_id, study_name, updated_timestamp, document) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (study_id) DO UPDATE \
             SET study_name = EXCLUDED.study_name, \
                 updated_timestamp = EXCLUDED.updated_timestamp, \
                 document = EXCLUDED.document",
        )
        .bind(config.study_id.get())
        .bind(&config.study_name)
        .bind(config.timestamp)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update study configuration", e))?;
        Ok(())
    }

    async fn studies(&self) -> CatalogResult<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT study_name, study_id FROM study_configurations",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list studies", e))?;
        Ok(rows.into_iter().collect())
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
            let token = self.next_token.fetch_add(1, Ordering::SeqCst);
            let acquired = sqlx::query_as::<_, (i64,)>(
                "INSERT INTO study_locks (study_id, token, expires_at) \
                 VALUES ($1, $2, now() + make_interval(secs => $3)) \
                 ON CONFLICT (study_id) DO UPDATE \
                 SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at \
                 WHERE study_locks.expires_at < now() \
                 RETURNING token",
            )
            .bind(study_id)
            .bind(token)
            .bind(duration.as_secs_f64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("Failed to acquire study lock", e))?;

            if acquired.is_some() {
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
        sqlx::query("DELETE FROM study_locks WHERE study_id = $1 AND token = $2")
            .bind(study_id)
            .bind(token.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to release study lock", e))?;
        Ok(())
    }

    // ── Entities ────────────────────────────────────────────────────────

    async fn create_entity(&self, record: &EntityRecord) -> CatalogResult<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO catalog_entities \
                 (id, kind, study_id, name, path, status, visited, creation_date, attributes) \
             VALUES (CASE WHEN $1 > 0 THEN $1 ELSE nextval('catalog_id_seq') END, \
                     $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id",
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(record.study_id)
        .bind(&record.name)
        .bind(&record.path)
        .bind(record.status.as_str())
        .bind(record.visited)
        .bind(record.creation_date)
        .bind(&record.attributes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create entity", e))?;
        Ok(id)
    }

    async fn entity(&self, kind: EntityKind, id: i64) -> CatalogResult<Option<EntityRecord>> {
        self.entity_row(kind, id)
            .await?
            .map(EntityRow::into_record)
            .transpose()
    }

    async fn find_entities(&self, query: &EntityQuery) -> CatalogResult<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT id, kind, study_id, name, path, status, visited, creation_date, attributes \
             FROM catalog_entities \
             WHERE ($1::TEXT IS NULL OR kind = $1) \
               AND (cardinality($2::BIGINT[]) = 0 OR study_id = ANY($2)) \
               AND (cardinality($3::TEXT[]) = 0 OR name = ANY($3)) \
               AND ($4::TEXT IS NULL OR path = $4) \
               AND ($5 OR status NOT IN ('TRASHED', 'PENDING_DELETE', 'DELETED')) \
             ORDER BY id",
        )
        .bind(query.kind.map(|k| k.as_str()))
        .bind(&query.study_ids)
        .bind(&query.names)
        .bind(&query.path)
        .bind(query.include_trashed)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to search entities", e))?;
        rows.into_iter().map(EntityRow::into_record).collect()
    }

    async fn update_entity(&self, record: &EntityRecord) -> CatalogResult<()> {
        let result = sqlx::query(
            "UPDATE catalog_entities \
             SET study_id = $3, name = $4, path = $5, status = $6, visited = $7, \
                 attributes = $8 \
             WHERE kind = $1 AND id = $2",
        )
        .bind(record.kind.as_str())
        .bind(record.id)
        .bind(record.study_id)
        .bind(&record.name)
        .bind(&record.path)
        .bind(record.status.as_str())
        .bind(record.visited)
        .bind(&record.attributes)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update entity", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "{} {} not found",
                record.kind.label(),
                record.id
            )));
        }
        Ok(())
    }

    async fn set_entity_status(
        &self,
        kind: EntityKind,
        id: i64,
        status: EntityStatus,
    ) -> CatalogResult<()> {
        let result =
            sqlx::query("UPDATE catalog_entities SET status = $3 WHERE kind = $1 AND id = $2")
                .bind(kind.as_str())
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| db_err("Failed to update entity status", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "{} {id} not found",
                kind.label()
            )));
        }
        Ok(())
    }

    async fn delete_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM catalog_entities WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete entity", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "{} {id} not found",
                kind.label()
            )));
        }
        sqlx::query("DELETE FROM acl_entries WHERE entity_kind = $1 AND entity_id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Failed to delete entity ACLs", e))?;
        Ok(())
    }

    async fn check_entity(&self, kind: EntityKind, id: i64) -> CatalogResult<()> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM catalog_entities WHERE kind = $1 AND id = $2)",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to check entity", e))?;
        if exists {
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
        let row = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT study_id FROM catalog_entities WHERE kind = $1 AND id = $2",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch enclosing study", e))?;
        match row {
            Some((Some(study_id),)) => Ok(study_id),
            Some((None,)) => Err(CatalogError::internal(format!(
                "{} {id} has no enclosing study",
                kind.label()
            ))),
            None => Err(CatalogError::not_found(format!(
                "{} {id} not found",
                kind.label()
            ))),
        }
    }

    // ── ACLs ────────────────────────────────────────────────────────────

    async fn entity_acls(
        &self,
        kind: EntityKind,
        id: i64,
        members: &[Member],
    ) -> CatalogResult<Vec<AclEntry>> {
        let rows = sqlx::query_as::<_, AclRow>(
            "SELECT member, permissions FROM acl_entries \
             WHERE entity_kind = $1 AND entity_id = $2 AND member = ANY($3)",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(member_strings(members))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch entity ACLs", e))?;
        let mut entries = rows
            .into_iter()
            .map(AclRow::into_entry)
            .collect::<CatalogResult<Vec<_>>>()?;
        // Preserve the requested member order.
        entries.sort_by_key(|e| members.iter().position(|m| *m == e.member));
        Ok(entries)
    }

    async fn all_entity_acls(&self, kind: EntityKind, id: i64) -> CatalogResult<Vec<AclEntry>> {
        let rows = sqlx::query_as::<_, AclRow>(
            "SELECT member, permissions FROM acl_entries \
             WHERE entity_kind = $1 AND entity_id = $2 ORDER BY member",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch entity ACLs", e))?;
        rows.into_iter().map(AclRow::into_entry).collect()
    }

    async fn create_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        entry: &AclEntry,
    ) -> CatalogResult<AclEntry> {
        let permissions: Vec<String> = entry.permissions.iter().cloned().collect();
        let result = sqlx::query(
            "INSERT INTO acl_entries (entity_kind, entity_id, member, permissions) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(entry.member.to_string())
        .bind(permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create ACL entry", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::precondition(format!(
                "Member {} already has an ACL defined for {} {id}",
                entry.member,
                kind.as_str()
            )));
        }
        Ok(entry.clone())
    }

    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let permissions: Vec<String> = permissions.iter().cloned().collect();
        let result = sqlx::query(
            "UPDATE acl_entries SET permissions = $4 \
             WHERE entity_kind = $1 AND entity_id = $2 AND member = $3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(member.to_string())
        .bind(permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to set ACL permissions", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            )));
        }
        Ok(())
    }

    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let permissions: Vec<String> = permissions.iter().cloned().collect();
        let result = sqlx::query(
            "UPDATE acl_entries \
             SET permissions = ARRAY(SELECT DISTINCT p FROM unnest(permissions || $4) AS p \
                                     ORDER BY p) \
             WHERE entity_kind = $1 AND entity_id = $2 AND member = $3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(member.to_string())
        .bind(permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to add ACL permissions", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            )));
        }
        Ok(())
    }

    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
        permissions: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        let permissions: Vec<String> = permissions.iter().cloned().collect();
        let result = sqlx::query(
            "UPDATE acl_entries \
             SET permissions = ARRAY(SELECT p FROM unnest(permissions) AS p \
                                     WHERE NOT (p = ANY($4))) \
             WHERE entity_kind = $1 AND entity_id = $2 AND member = $3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(member.to_string())
        .bind(permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to remove ACL permissions", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            )));
        }
        Ok(())
    }

    async fn remove_entity_acl(
        &self,
        kind: EntityKind,
        id: i64,
        member: &Member,
    ) -> CatalogResult<()> {
        let result = sqlx::query(
            "DELETE FROM acl_entries \
             WHERE entity_kind = $1 AND entity_id = $2 AND member = $3",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(member.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to remove ACL entry", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!(
                "Member {member} has no ACL on {} {id}",
                kind.as_str()
            )));
        }
        Ok(())
    }

    async fn path_acls(
        &self,
        study_id: i64,
        paths: &[String],
        members: &[Member],
    ) -> CatalogResult<HashMap<String, Vec<AclEntry>>> {
        let rows = sqlx::query_as::<_, (String, String, Vec<String>)>(
            "SELECT e.path, a.member, a.permissions \
             FROM acl_entries a \
             JOIN catalog_entities e ON e.kind = 'file' AND e.id = a.entity_id \
             WHERE a.entity_kind = 'file' AND e.study_id = $1 \
               AND e.path = ANY($2) AND a.member = ANY($3)",
        )
        .bind(study_id)
        .bind(paths.to_vec())
        .bind(member_strings(members))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to fetch path ACLs", e))?;

        let mut result: HashMap<String, Vec<AclEntry>> = HashMap::new();
        for (path, member, permissions) in rows {
            result.entry(path).or_default().push(AclEntry {
                member: member.parse()?,
                permissions: permissions.into_iter().collect(),
            });
        }
        Ok(result)
    }
}

impl std::fmt::Debug for PostgresMetadataAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMetadataAdaptor").finish()
    }
}
