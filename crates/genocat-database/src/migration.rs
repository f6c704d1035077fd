//! Schema migration for the PostgreSQL metadata store.
//!
//! Persisted layout: one row per entity (`catalog_entities`, with
//! kind-specific payload as JSONB), ACL entries as a separate table, one
//! JSONB document per study configuration, and an expiry-based advisory
//! lock table.

use sqlx::PgPool;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;

const SCHEMA: &[&str] = &[
    "CREATE SEQUENCE IF NOT EXISTS catalog_id_seq START WITH 1",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS catalog_entities (
        id BIGINT PRIMARY KEY DEFAULT nextval('catalog_id_seq'),
        kind TEXT NOT NULL,
        study_id BIGINT,
        name TEXT NOT NULL,
        path TEXT,
        status TEXT NOT NULL,
        visited BOOLEAN,
        creation_date TIMESTAMPTZ NOT NULL DEFAULT now(),
        attributes JSONB NOT NULL DEFAULT 'null'::jsonb
    )",
    "CREATE INDEX IF NOT EXISTS idx_entities_kind_study_name
        ON catalog_entities (kind, study_id, name)",
    "CREATE INDEX IF NOT EXISTS idx_entities_kind_study_path
        ON catalog_entities (kind, study_id, path)",
    "CREATE TABLE IF NOT EXISTS study_groups (
        study_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        user_ids TEXT[] NOT NULL DEFAULT '{}',
        PRIMARY KEY (study_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS acl_entries (
        entity_kind TEXT NOT NULL,
        entity_id BIGINT NOT NULL,
        member TEXT NOT NULL,
        permissions TEXT[] NOT NULL DEFAULT '{}',
        PRIMARY KEY (entity_kind, entity_id, member)
    )",
    "CREATE TABLE IF NOT EXISTS daemon_acls (
        member TEXT PRIMARY KEY,
        permissions TEXT[] NOT NULL DEFAULT '{}'
    )",
    "CREATE TABLE IF NOT EXISTS study_configurations (
        study_id BIGINT PRIMARY KEY,
        study_name TEXT NOT NULL UNIQUE,
        updated_timestamp BIGINT NOT NULL,
        document JSONB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS study_locks (
        study_id BIGINT PRIMARY KEY,
        token BIGINT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )",
];

/// Create the schema and move the id sequence above the configured offset.
pub async fn run_migrations(pool: &PgPool, id_offset: i64) -> CatalogResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| {
                CatalogError::with_source(
                    genocat_core::error::ErrorKind::Database,
                    format!("Migration failed: {e}"),
                    e,
                )
            })?;
    }

    sqlx::query(
        "SELECT setval('catalog_id_seq', GREATEST((SELECT last_value FROM catalog_id_seq), $1))",
    )
    .bind(id_offset.max(1))
    .execute(pool)
    .await
    .map_err(|e| {
        CatalogError::with_source(
            genocat_core::error::ErrorKind::Database,
            format!("Failed to adjust the id sequence: {e}"),
            e,
        )
    })?;

    tracing::info!("Metadata store schema is up to date");
    Ok(())
}
