//! Domain events reflecting snapshot lifecycle and restore progress.
//!
//! Every capture, deletion and restore stage emits a [`BackupEvent`]
//! through the [`super::EventBus`]. Events are broadcast to WebSocket
//! subscribers filtered by workspace.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SnapshotId;

/// Domain event emitted after every snapshot or restore milestone.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BackupEvent {
    /// Emitted when a snapshot is built (and persisted, if requested).
    SnapshotCreated {
        /// Snapshot identifier.
        snapshot_id: SnapshotId,
        /// Source workspace.
        workspace_id: String,
        /// Whether the snapshot was written to the store.
        persisted: bool,
        /// Capture timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a change-gated capture found nothing new.
    CaptureSkipped {
        /// Snapshot that is still current.
        snapshot_id: SnapshotId,
        /// Source workspace.
        workspace_id: String,
        /// Check timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a stored snapshot is deleted.
    SnapshotDeleted {
        /// Snapshot identifier.
        snapshot_id: SnapshotId,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted before the first restore stage runs.
    RestoreStarted {
        /// Snapshot being applied.
        snapshot_id: SnapshotId,
        /// Target workspace.
        workspace_id: String,
        /// Start timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after each restore stage settles.
    RestoreStageCompleted {
        /// Snapshot being applied.
        snapshot_id: SnapshotId,
        /// Target workspace.
        workspace_id: String,
        /// Stage name.
        stage: String,
        /// Items applied by the stage.
        applied: usize,
        /// Items skipped by the stage.
        skipped: usize,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when every restore stage has run.
    RestoreFinished {
        /// Snapshot that was applied.
        snapshot_id: SnapshotId,
        /// Target workspace.
        workspace_id: String,
        /// Total skipped items across stages.
        skipped: usize,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl BackupEvent {
    /// Returns the workspace this event concerns, if any.
    #[must_use]
    pub fn workspace_id(&self) -> Option<&str> {
        match self {
            Self::SnapshotCreated { workspace_id, .. }
            | Self::CaptureSkipped { workspace_id, .. }
            | Self::RestoreStarted { workspace_id, .. }
            | Self::RestoreStageCompleted { workspace_id, .. }
            | Self::RestoreFinished { workspace_id, .. } => Some(workspace_id),
            Self::SnapshotDeleted { .. } => None,
        }
    }

    /// Returns the snapshot this event concerns.
    #[must_use]
    pub const fn snapshot_id(&self) -> &SnapshotId {
        match self {
            Self::SnapshotCreated { snapshot_id, .. }
            | Self::CaptureSkipped { snapshot_id, .. }
            | Self::SnapshotDeleted { snapshot_id, .. }
            | Self::RestoreStarted { snapshot_id, .. }
            | Self::RestoreStageCompleted { snapshot_id, .. }
            | Self::RestoreFinished { snapshot_id, .. } => snapshot_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SnapshotCreated { .. } => "snapshot_created",
            Self::CaptureSkipped { .. } => "capture_skipped",
            Self::SnapshotDeleted { .. } => "snapshot_deleted",
            Self::RestoreStarted { .. } => "restore_started",
            Self::RestoreStageCompleted { .. } => "restore_stage_completed",
            Self::RestoreFinished { .. } => "restore_finished",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn stage_event_serializes_with_tag() {
        let event = BackupEvent::RestoreStageCompleted {
            snapshot_id: SnapshotId::from("snap-1"),
            workspace_id: "42".to_string(),
            stage: "roles".to_string(),
            applied: 3,
            skipped: 1,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        assert!(json.contains("restore_stage_completed"));
        assert!(json.contains("\"stage\":\"roles\""));
        assert_eq!(event.event_type_str(), "restore_stage_completed");
    }

    #[test]
    fn deleted_event_has_no_workspace() {
        let event = BackupEvent::SnapshotDeleted {
            snapshot_id: SnapshotId::from("snap-1"),
            timestamp: Utc::now(),
        };
        assert_eq!(event.workspace_id(), None);
        assert_eq!(event.snapshot_id().as_str(), "snap-1");
    }
}
