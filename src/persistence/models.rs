//! Stored snapshot models.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::domain::snapshot::bytes_to_kb;
use crate::domain::{Snapshot, SnapshotId};
use crate::error::BackupError;

/// A stored snapshot with its serialized size.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// Serialized JSON size in kilobytes, two decimals.
    pub size_kb: f64,
    /// The snapshot itself.
    pub snapshot: Arc<Snapshot>,
}

impl SnapshotInfo {
    /// Measures `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Serialization`] if the snapshot cannot be
    /// encoded.
    pub fn new(snapshot: Arc<Snapshot>) -> Result<Self, BackupError> {
        Ok(Self {
            id: snapshot.id.clone(),
            size_kb: snapshot.size_kb()?,
            snapshot,
        })
    }
}

/// Listing metadata for a stored snapshot.
///
/// Stores produce it without materializing the whole [`Snapshot`]. The
/// size is the stored document's size, which for pretty-printed files is
/// larger than [`Snapshot::size_kb`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// Source workspace identifier.
    pub workspace_id: String,
    /// Workspace name at capture time.
    pub workspace_name: String,
    /// Capture timestamp.
    pub created_at: DateTime<Utc>,
    /// Stored size in kilobytes, two decimals.
    pub size_kb: f64,
    /// Number of captured roles.
    pub roles: usize,
    /// Number of captured categories and channels.
    pub channels: usize,
}

impl SnapshotSummary {
    /// Summarizes an already loaded snapshot.
    #[must_use]
    pub fn of(snapshot: &Snapshot, size_kb: f64) -> Self {
        Self {
            id: snapshot.id.clone(),
            workspace_id: snapshot.workspace_id.clone(),
            workspace_name: snapshot.settings.name.clone(),
            created_at: snapshot.created_at,
            size_kb,
            roles: snapshot.roles.len(),
            channels: snapshot.channels.categories.len() + snapshot.channels.channels().count(),
        }
    }

    /// Reads the summary fields out of a serialized snapshot, skipping
    /// over everything else.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Serialization`] when the summary fields are
    /// missing or malformed.
    pub fn from_json(bytes: &[u8]) -> Result<Self, BackupError> {
        let doc: SummaryDocument = serde_json::from_slice(bytes)?;
        let categories = doc.channels.categories.len();
        let children: usize = doc
            .channels
            .categories
            .iter()
            .map(|c| c.children.len())
            .sum();
        Ok(Self {
            id: doc.id,
            workspace_id: doc.workspace_id,
            workspace_name: doc.settings.name,
            created_at: doc.created_at,
            size_kb: bytes_to_kb(bytes.len()),
            roles: doc.roles.len(),
            channels: categories + children + doc.channels.others.len(),
        })
    }
}

#[derive(Deserialize)]
struct SummaryDocument {
    id: SnapshotId,
    workspace_id: String,
    created_at: DateTime<Utc>,
    settings: SummarySettings,
    #[serde(default)]
    roles: Vec<IgnoredAny>,
    #[serde(default)]
    channels: SummaryChannels,
}

#[derive(Deserialize)]
struct SummarySettings {
    name: String,
}

#[derive(Default, Deserialize)]
struct SummaryChannels {
    #[serde(default)]
    categories: Vec<SummaryCategory>,
    #[serde(default)]
    others: Vec<IgnoredAny>,
}

#[derive(Deserialize)]
struct SummaryCategory {
    #[serde(default)]
    children: Vec<IgnoredAny>,
}

/// A row of the `snapshots` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Snapshot identifier (primary key).
    pub id: String,
    /// Source workspace identifier.
    pub workspace_id: String,
    /// Full snapshot as JSONB.
    pub document: serde_json::Value,
    /// Capture timestamp copied from the document.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SnapshotRow {
    /// Decodes the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Serialization`] when the document does not
    /// match the snapshot model.
    pub fn into_snapshot(self) -> Result<Snapshot, BackupError> {
        Ok(serde_json::from_value(self.document)?)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_without_decoding_records() {
        let doc = serde_json::json!({
            "id": "s1",
            "workspace_id": "w1",
            "created_at": "2024-05-01T10:00:00Z",
            "settings": { "name": "guild", "verification_level": 2 },
            "roles": [{ "name": "mods" }, { "name": "helpers" }],
            "channels": {
                "categories": [
                    { "name": "info", "children": [{ "name": "chat" }, { "name": "news" }] },
                    { "name": "empty" }
                ],
                "others": [{ "name": "lobby" }]
            },
            "emojis": [{ "name": "wave" }]
        });
        let Ok(bytes) = serde_json::to_vec(&doc) else {
            panic!("encode");
        };
        let Ok(summary) = SnapshotSummary::from_json(&bytes) else {
            panic!("summary failed");
        };
        assert_eq!(summary.id, SnapshotId::from("s1"));
        assert_eq!(summary.workspace_name, "guild");
        assert_eq!(summary.roles, 2);
        assert_eq!(summary.channels, 5);
        assert_eq!(summary.size_kb, bytes_to_kb(bytes.len()));
    }

    #[test]
    fn summary_requires_identity_fields() {
        assert!(matches!(
            SnapshotSummary::from_json(br#"{"roles": []}"#),
            Err(BackupError::Serialization(_))
        ));
    }
}
