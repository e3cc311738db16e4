//! JSON file snapshot store.
//!
//! Each snapshot lives at `<root>/<id>.json`. Ids that are not path safe
//! (`[A-Za-z0-9_-]` only) are rejected before touching the file system.
//! Writes go to a temporary sibling first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{SnapshotStore, SnapshotSummary};
use crate::domain::{Snapshot, SnapshotId};
use crate::error::BackupError;

const EXTENSION: &str = "json";

/// Snapshot store backed by one JSON file per snapshot.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
    pretty: bool,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            root: root.into(),
            pretty,
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &SnapshotId) -> Result<PathBuf, BackupError> {
        if !id.is_path_safe() {
            return Err(BackupError::Validation(format!(
                "snapshot id {id:?} is not usable as a file name"
            )));
        }
        Ok(self.root.join(format!("{id}.{EXTENSION}")))
    }
}

fn io_error(id: &SnapshotId, err: &std::io::Error) -> BackupError {
    if err.kind() == ErrorKind::NotFound {
        BackupError::NotFound(format!("snapshot {id}"))
    } else {
        BackupError::Persistence(format!("snapshot {id}: {err}"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get(&self, id: &SnapshotId) -> Result<Snapshot, BackupError> {
        let path = self.path_for(id)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(id, &e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put(&self, id: &SnapshotId, snapshot: &Snapshot) -> Result<(), BackupError> {
        let path = self.path_for(id)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BackupError::Persistence(format!("{}: {e}", self.root.display())))?;
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(snapshot)?
        } else {
            serde_json::to_vec(snapshot)?
        };
        let staging = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| io_error(id, &e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| io_error(id, &e))?;
        tracing::debug!(snapshot_id = %id, bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    async fn delete(&self, id: &SnapshotId) -> Result<(), BackupError> {
        let path = self.path_for(id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(id, &e))
    }

    async fn list(&self) -> Result<Vec<SnapshotId>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(BackupError::Persistence(format!(
                    "{}: {err}",
                    self.root.display()
                )));
            }
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackupError::Persistence(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(SnapshotId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn summary(&self, id: &SnapshotId) -> Result<SnapshotSummary, BackupError> {
        let path = self.path_for(id)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(id, &e))?;
        SnapshotSummary::from_json(&bytes)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{WidgetRecord, WorkspaceSettings};

    fn snapshot(id: &str) -> Snapshot {
        Snapshot::empty(
            SnapshotId::from(id),
            "w1",
            WorkspaceSettings {
                name: "guild".into(),
                verification_level: 0,
                explicit_content_filter: 0,
                default_message_notifications: 0,
                afk: None,
                widget: WidgetRecord::default(),
                icon: None,
                splash: None,
                banner: None,
            },
        )
    }

    #[tokio::test]
    async fn put_get_list_delete() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FileSnapshotStore::new(dir.path().join("backups"), true);
        assert!(matches!(store.list().await, Ok(ids) if ids.is_empty()));

        let b = snapshot("b");
        let a = snapshot("a");
        assert!(store.put(&b.id, &b).await.is_ok());
        assert!(store.put(&a.id, &a).await.is_ok());

        let Ok(ids) = store.list().await else {
            panic!("list failed");
        };
        assert_eq!(ids, vec![SnapshotId::from("a"), SnapshotId::from("b")]);

        let Ok(loaded) = store.get(&a.id).await else {
            panic!("get failed");
        };
        assert_eq!(loaded, a);

        assert!(store.delete(&a.id).await.is_ok());
        assert!(matches!(
            store.delete(&a.id).await,
            Err(BackupError::NotFound(_))
        ));
        assert!(matches!(store.get(&a.id).await, Err(BackupError::NotFound(_))));
    }

    #[tokio::test]
    async fn unsafe_ids_are_rejected() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FileSnapshotStore::new(dir.path(), false);
        let id = SnapshotId::from("../escape");
        let snap = snapshot("../escape");
        assert!(matches!(
            store.put(&id, &snap).await,
            Err(BackupError::Validation(_))
        ));
        assert!(matches!(store.get(&id).await, Err(BackupError::Validation(_))));
    }

    #[tokio::test]
    async fn info_reports_size() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FileSnapshotStore::new(dir.path(), false);
        let snap = snapshot("sized");
        assert!(store.put(&snap.id, &snap).await.is_ok());
        let Ok(info) = store.info(&snap.id).await else {
            panic!("info failed");
        };
        assert_eq!(info.id, snap.id);
        assert!(info.size_kb > 0.0);
    }

    #[tokio::test]
    async fn summary_reports_stored_size() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FileSnapshotStore::new(dir.path(), true);
        let snap = snapshot("listed");
        assert!(store.put(&snap.id, &snap).await.is_ok());

        let Ok(summary) = store.summary(&snap.id).await else {
            panic!("summary failed");
        };
        let Ok(meta) = tokio::fs::metadata(dir.path().join("listed.json")).await else {
            panic!("metadata");
        };
        let stored = usize::try_from(meta.len()).unwrap_or(usize::MAX);
        assert_eq!(summary.id, snap.id);
        assert_eq!(summary.workspace_name, "guild");
        assert_eq!(summary.created_at, snap.created_at);
        assert_eq!(summary.size_kb, crate::domain::snapshot::bytes_to_kb(stored));
        assert!(matches!(
            store.summary(&SnapshotId::from("missing")).await,
            Err(BackupError::NotFound(_))
        ));
    }
}
