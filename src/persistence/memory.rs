//! Process-local snapshot store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SnapshotStore, SnapshotSummary};
use crate::domain::{Snapshot, SnapshotId};
use crate::error::BackupError;

/// Snapshot store keeping every snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<BTreeMap<SnapshotId, Snapshot>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, id: &SnapshotId) -> Result<Snapshot, BackupError> {
        self.snapshots
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BackupError::NotFound(format!("snapshot {id}")))
    }

    async fn put(&self, id: &SnapshotId, snapshot: &Snapshot) -> Result<(), BackupError> {
        self.snapshots
            .write()
            .await
            .insert(id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete(&self, id: &SnapshotId) -> Result<(), BackupError> {
        self.snapshots
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackupError::NotFound(format!("snapshot {id}")))
    }

    async fn list(&self) -> Result<Vec<SnapshotId>, BackupError> {
        Ok(self.snapshots.read().await.keys().cloned().collect())
    }

    async fn summary(&self, id: &SnapshotId) -> Result<SnapshotSummary, BackupError> {
        let snapshots = self.snapshots.read().await;
        let snapshot = snapshots
            .get(id)
            .ok_or_else(|| BackupError::NotFound(format!("snapshot {id}")))?;
        Ok(SnapshotSummary::of(snapshot, snapshot.size_kb()?))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{WidgetRecord, WorkspaceSettings};

    #[tokio::test]
    async fn put_overwrites_by_id() {
        let store = MemorySnapshotStore::new();
        let mut snap = Snapshot::empty(
            SnapshotId::from("s1"),
            "w",
            WorkspaceSettings {
                name: "one".into(),
                verification_level: 0,
                explicit_content_filter: 0,
                default_message_notifications: 0,
                afk: None,
                widget: WidgetRecord::default(),
                icon: None,
                splash: None,
                banner: None,
            },
        );
        assert!(store.put(&snap.id, &snap).await.is_ok());
        snap.settings.name = "two".into();
        assert!(store.put(&snap.id, &snap).await.is_ok());

        assert_eq!(store.len().await, 1);
        let Ok(loaded) = store.get(&snap.id).await else {
            panic!("get failed");
        };
        assert_eq!(loaded.settings.name, "two");

        let Ok(summary) = store.summary(&snap.id).await else {
            panic!("summary failed");
        };
        assert_eq!(summary.workspace_name, "two");
        assert_eq!(summary.roles, 0);
        assert!(summary.size_kb > 0.0);

        assert!(store.delete(&snap.id).await.is_ok());
        assert!(store.is_empty().await);
        assert!(matches!(
            store.summary(&snap.id).await,
            Err(BackupError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&snap.id).await,
            Err(BackupError::NotFound(_))
        ));
    }
}
