//! Service layer: capture, restore, diff and their coordination.
//!
//! [`BackupService`] is the entry point used by the binary and the REST
//! handlers. It drives the [`SnapshotBuilder`] and the
//! [`RestoreOrchestrator`], writes through a
//! [`SnapshotStore`](crate::persistence::SnapshotStore) and publishes
//! lifecycle events on the [`EventBus`](crate::domain::EventBus).

pub mod backup_service;
pub mod builder;
pub mod diff;
pub mod pacing;
pub mod reconciler;
pub mod restore;
pub mod retry;
pub mod scheduler;

pub use backup_service::{BackupService, SnapshotRef};
pub use builder::{CaptureOptions, CaptureOutcome, ImageMode, Section, SnapshotBuilder};
pub use diff::{DiffSection, SnapshotDiff, diff_snapshots};
pub use pacing::PacingConfig;
pub use reconciler::IdentifierReconciler;
pub use restore::{
    RestoreOptions, RestoreOrchestrator, RestoreReport, SkipReason, SkippedItem, Stage,
    StageReport,
};
pub use retry::{RetryExecutor, RetryPolicy};
pub use scheduler::{CaptureScheduler, Schedule, ScheduleHandle};
