//! Backup service: the client-facing facade over capture, storage,
//! restore and diff.

use std::sync::Arc;

use chrono::Utc;

use super::builder::{CaptureOptions, CaptureOutcome, SnapshotBuilder};
use super::diff::{SnapshotDiff, diff_snapshots};
use super::restore::{RestoreOptions, RestoreOrchestrator, RestoreReport, StageReport};
use super::retry::RetryPolicy;
use crate::domain::{BackupEvent, EventBus, Snapshot, SnapshotId};
use crate::error::BackupError;
use crate::persistence::{SnapshotInfo, SnapshotStore, SnapshotSummary};
use crate::remote::{AssetFetcher, WorkspaceApi};

/// A snapshot given either by id (loaded from the store) or inline.
#[derive(Debug, Clone)]
pub enum SnapshotRef {
    /// Stored snapshot.
    Id(SnapshotId),
    /// Snapshot held by the caller.
    Inline(Arc<Snapshot>),
}

impl From<SnapshotId> for SnapshotRef {
    fn from(id: SnapshotId) -> Self {
        Self::Id(id)
    }
}

impl From<Arc<Snapshot>> for SnapshotRef {
    fn from(snapshot: Arc<Snapshot>) -> Self {
        Self::Inline(snapshot)
    }
}

impl From<Snapshot> for SnapshotRef {
    fn from(snapshot: Snapshot) -> Self {
        Self::Inline(Arc::new(snapshot))
    }
}

/// Stateless coordinator: owns the [`SnapshotStore`] handle and the
/// [`EventBus`]; every lifecycle operation publishes a [`BackupEvent`].
#[derive(Debug, Clone)]
pub struct BackupService {
    store: Arc<dyn SnapshotStore>,
    builder: SnapshotBuilder,
    orchestrator: RestoreOrchestrator,
    event_bus: EventBus,
}

impl BackupService {
    /// Creates a new `BackupService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        assets: Arc<dyn AssetFetcher>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            builder: SnapshotBuilder::new(assets),
            orchestrator: RestoreOrchestrator::with_events(event_bus.clone()),
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the snapshot store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Captures `api` and, unless `options.persist` is off, stores the
    /// result.
    ///
    /// # Errors
    ///
    /// Capture errors (see [`SnapshotBuilder::build`]) and store failures.
    pub async fn create(
        &self,
        api: &dyn WorkspaceApi,
        options: &CaptureOptions,
    ) -> Result<Arc<Snapshot>, BackupError> {
        let snapshot = Arc::new(self.builder.build(api, options).await?);
        self.finish_capture(&snapshot, options.persist).await?;
        Ok(snapshot)
    }

    /// Loads a stored snapshot with its size.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when no snapshot has this id.
    pub async fn fetch(&self, id: &SnapshotId) -> Result<SnapshotInfo, BackupError> {
        self.store.info(id).await
    }

    /// Loads the listing metadata of a stored snapshot.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when no snapshot has this id.
    pub async fn summary(&self, id: &SnapshotId) -> Result<SnapshotSummary, BackupError> {
        self.store.summary(id).await
    }

    /// Lists stored snapshot ids.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self) -> Result<Vec<SnapshotId>, BackupError> {
        self.store.list().await
    }

    /// Deletes a stored snapshot.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when no snapshot has this id.
    pub async fn remove(&self, id: &SnapshotId) -> Result<(), BackupError> {
        self.store.delete(id).await?;
        self.event_bus.publish(BackupEvent::SnapshotDeleted {
            snapshot_id: id.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(snapshot_id = %id, "snapshot deleted");
        Ok(())
    }

    /// Resolves a [`SnapshotRef`].
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when an id does not resolve.
    pub async fn resolve(&self, snapshot: SnapshotRef) -> Result<Arc<Snapshot>, BackupError> {
        match snapshot {
            SnapshotRef::Id(id) => Ok(Arc::new(self.store.get(&id).await?)),
            SnapshotRef::Inline(snapshot) => Ok(snapshot),
        }
    }

    /// Applies a snapshot to `target`.
    ///
    /// # Errors
    ///
    /// - [`BackupError::InvalidTarget`] when `target` is `None`.
    /// - [`BackupError::NotFound`] when an id does not resolve.
    /// - The first stage-level restore failure.
    pub async fn load(
        &self,
        snapshot: SnapshotRef,
        target: Option<&dyn WorkspaceApi>,
        options: &RestoreOptions,
    ) -> Result<RestoreReport, BackupError> {
        let target = target.ok_or(BackupError::InvalidTarget)?;
        let snapshot = self.resolve(snapshot).await?;
        self.orchestrator
            .restore(snapshot, Some(target), options)
            .await
    }

    /// Compares two snapshots.
    ///
    /// # Errors
    ///
    /// [`BackupError::NotFound`] when an id does not resolve.
    pub async fn diff(
        &self,
        from: SnapshotRef,
        to: SnapshotRef,
    ) -> Result<SnapshotDiff, BackupError> {
        let from = self.resolve(from).await?;
        let to = self.resolve(to).await?;
        diff_snapshots(&from, &to)
    }

    /// Captures `api` only when it differs from `previous`, storing fresh
    /// captures when `options.persist` is on. Without a previous snapshot
    /// this is [`Self::create`].
    ///
    /// # Errors
    ///
    /// Capture errors and store failures.
    pub async fn capture_if_changed(
        &self,
        api: &dyn WorkspaceApi,
        options: &CaptureOptions,
        previous: Option<Arc<Snapshot>>,
    ) -> Result<CaptureOutcome, BackupError> {
        let Some(previous) = previous else {
            return Ok(CaptureOutcome::Captured(self.create(api, options).await?));
        };
        let outcome = self.builder.build_if_changed(api, options, previous).await?;
        match &outcome {
            CaptureOutcome::Captured(snapshot) => {
                self.finish_capture(snapshot, options.persist).await?;
            }
            CaptureOutcome::Unchanged(snapshot) => {
                self.event_bus.publish(BackupEvent::CaptureSkipped {
                    snapshot_id: snapshot.id.clone(),
                    workspace_id: snapshot.workspace_id.clone(),
                    timestamp: Utc::now(),
                });
                tracing::info!(snapshot_id = %snapshot.id, "capture skipped, workspace unchanged");
            }
        }
        Ok(outcome)
    }

    /// Wipes `target`.
    ///
    /// # Errors
    ///
    /// [`BackupError::InvalidTarget`] when `target` is `None`.
    pub async fn clear(
        &self,
        target: Option<&dyn WorkspaceApi>,
        retry: RetryPolicy,
    ) -> Result<StageReport, BackupError> {
        self.orchestrator.clear(target, retry).await
    }

    async fn finish_capture(&self, snapshot: &Snapshot, persist: bool) -> Result<(), BackupError> {
        if persist {
            self.store.put(&snapshot.id, snapshot).await?;
        }
        self.event_bus.publish(BackupEvent::SnapshotCreated {
            snapshot_id: snapshot.id.clone(),
            workspace_id: snapshot.workspace_id.clone(),
            persisted: persist,
            timestamp: Utc::now(),
        });
        tracing::info!(
            snapshot_id = %snapshot.id,
            workspace_id = %snapshot.workspace_id,
            persisted = persist,
            "snapshot created"
        );
        Ok(())
    }
}
