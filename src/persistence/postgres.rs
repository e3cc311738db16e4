//! PostgreSQL document store for snapshots.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::SnapshotRow;
use super::{SnapshotStore, SnapshotSummary};
use crate::domain::snapshot::bytes_to_kb;
use crate::domain::{Snapshot, SnapshotId};
use crate::error::BackupError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS snapshots (\
     id TEXT PRIMARY KEY, \
     workspace_id TEXT NOT NULL, \
     document JSONB NOT NULL, \
     created_at TIMESTAMPTZ NOT NULL, \
     updated_at TIMESTAMPTZ NOT NULL DEFAULT now())";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS snapshots_workspace_idx ON snapshots (workspace_id, created_at DESC)";

const SUMMARY_QUERY: &str = "SELECT id, workspace_id, created_at, \
     document->'settings'->>'name', \
     octet_length(document::text)::BIGINT, \
     jsonb_array_length(COALESCE(document->'roles', '[]'::jsonb))::BIGINT, \
     (SELECT COUNT(*) + COALESCE(SUM(jsonb_array_length(COALESCE(c->'children', '[]'::jsonb))), 0) \
        FROM jsonb_array_elements(COALESCE(document->'channels'->'categories', '[]'::jsonb)) c)::BIGINT \
       + jsonb_array_length(COALESCE(document->'channels'->'others', '[]'::jsonb))::BIGINT \
     FROM snapshots WHERE id = $1";

type SummaryRow = (String, String, DateTime<Utc>, Option<String>, i64, i64, i64);

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn db_error(err: &sqlx::Error) -> BackupError {
    BackupError::Persistence(err.to_string())
}

/// PostgreSQL-backed snapshot store using `sqlx::PgPool`.
///
/// The pool is owned by the store and released by
/// [`SnapshotStore::close`].
#[derive(Debug, Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Persistence`] if no connection can be
    /// established within `connect_timeout`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, BackupError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(|e| db_error(&e))?;
        tracing::info!(max_connections, "connected to snapshot database");
        Ok(Self { pool })
    }

    /// Creates the `snapshots` table and its index when missing.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Persistence`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), BackupError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        Ok(())
    }

    /// Lists the rows captured from one workspace, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Persistence`] on database failure.
    pub async fn list_for_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<SnapshotRow>, BackupError> {
        let rows = sqlx::query_as::<_, (String, String, serde_json::Value, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, workspace_id, document, created_at, updated_at FROM snapshots \
             WHERE workspace_id = $1 ORDER BY created_at DESC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, workspace_id, document, created_at, updated_at)| SnapshotRow {
                    id,
                    workspace_id,
                    document,
                    created_at,
                    updated_at,
                },
            )
            .collect())
    }

    /// Deletes snapshots captured before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Persistence`] on database failure.
    pub async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, BackupError> {
        let result = sqlx::query("DELETE FROM snapshots WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn get(&self, id: &SnapshotId) -> Result<Snapshot, BackupError> {
        let row = sqlx::query_as::<_, (String, String, serde_json::Value, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, workspace_id, document, created_at, updated_at FROM snapshots WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?
        .ok_or_else(|| BackupError::NotFound(format!("snapshot {id}")))?;

        let (id, workspace_id, document, created_at, updated_at) = row;
        SnapshotRow {
            id,
            workspace_id,
            document,
            created_at,
            updated_at,
        }
        .into_snapshot()
    }

    async fn put(&self, id: &SnapshotId, snapshot: &Snapshot) -> Result<(), BackupError> {
        let document = serde_json::to_value(snapshot)?;
        sqlx::query(
            "INSERT INTO snapshots (id, workspace_id, document, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (id) DO UPDATE SET workspace_id = EXCLUDED.workspace_id, \
             document = EXCLUDED.document, created_at = EXCLUDED.created_at, updated_at = now()",
        )
        .bind(id.as_str())
        .bind(&snapshot.workspace_id)
        .bind(&document)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;
        Ok(())
    }

    async fn delete(&self, id: &SnapshotId) -> Result<(), BackupError> {
        let result = sqlx::query("DELETE FROM snapshots WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        if result.rows_affected() == 0 {
            return Err(BackupError::NotFound(format!("snapshot {id}")));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SnapshotId>, BackupError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM snapshots ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
        Ok(ids.into_iter().map(SnapshotId::from).collect())
    }

    async fn summary(&self, id: &SnapshotId) -> Result<SnapshotSummary, BackupError> {
        let (id, workspace_id, created_at, name, bytes, roles, channels) =
            sqlx::query_as::<_, SummaryRow>(SUMMARY_QUERY)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error(&e))?
                .ok_or_else(|| BackupError::NotFound(format!("snapshot {id}")))?;
        Ok(SnapshotSummary {
            id: SnapshotId::from(id),
            workspace_id,
            workspace_name: name.unwrap_or_default(),
            created_at,
            size_kb: bytes_to_kb(count(bytes)),
            roles: count(roles),
            channels: count(channels),
        })
    }

    async fn close(&self) -> Result<(), BackupError> {
        self.pool.close().await;
        tracing::info!("snapshot database pool closed");
        Ok(())
    }
}
