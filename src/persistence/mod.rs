//! Persistence layer: snapshot stores.
//!
//! The engine only needs `get`/`put`/`delete`/`list` over whole snapshots.
//! [`SnapshotStore`] captures that contract; three peers implement it:
//!
//! - [`FileSnapshotStore`]: one JSON document per snapshot under a root
//!   directory.
//! - [`PostgresSnapshotStore`]: JSONB documents in PostgreSQL via
//!   `sqlx::PgPool`.
//! - [`MemorySnapshotStore`]: a process-local map.
//!
//! Writes are overwrite-wins upserts keyed by snapshot id.

pub mod file;
pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
pub use models::{SnapshotInfo, SnapshotSummary};
pub use postgres::PostgresSnapshotStore;

use crate::domain::{Snapshot, SnapshotId};
use crate::error::BackupError;

/// Whole-snapshot storage keyed by [`SnapshotId`].
#[async_trait]
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Loads a snapshot.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when no snapshot has this id.
    async fn get(&self, id: &SnapshotId) -> Result<Snapshot, BackupError>;

    /// Stores `snapshot` under `id`, replacing any previous document.
    ///
    /// # Errors
    ///
    /// [`BackupError::Persistence`] on backend failure.
    async fn put(&self, id: &SnapshotId, snapshot: &Snapshot) -> Result<(), BackupError>;

    /// Deletes a snapshot.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when no snapshot has this id.
    async fn delete(&self, id: &SnapshotId) -> Result<(), BackupError>;

    /// Lists stored ids in ascending order.
    ///
    /// # Errors
    ///
    /// [`BackupError::Persistence`] on backend failure.
    async fn list(&self) -> Result<Vec<SnapshotId>, BackupError>;

    /// Loads a snapshot together with its serialized size.
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::get`].
    async fn info(&self, id: &SnapshotId) -> Result<SnapshotInfo, BackupError> {
        let snapshot = self.get(id).await?;
        SnapshotInfo::new(Arc::new(snapshot))
    }

    /// Loads the listing metadata of a snapshot.
    ///
    /// The default loads the whole document; backends that can read the
    /// summary fields directly override it.
    ///
    /// # Errors
    ///
    /// Same as [`SnapshotStore::get`].
    async fn summary(&self, id: &SnapshotId) -> Result<SnapshotSummary, BackupError> {
        let info = self.info(id).await?;
        Ok(SnapshotSummary::of(&info.snapshot, info.size_kb))
    }

    /// Releases backend resources. Further calls may fail.
    ///
    /// # Errors
    ///
    /// [`BackupError::Persistence`] when the backend cannot shut down
    /// cleanly.
    async fn close(&self) -> Result<(), BackupError> {
        Ok(())
    }
}
