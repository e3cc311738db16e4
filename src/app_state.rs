//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::BackupService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backup service for snapshot storage, restore and diff.
    pub backup_service: Arc<BackupService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds state around `service`, sharing its event bus.
    #[must_use]
    pub fn new(service: BackupService) -> Self {
        let event_bus = service.event_bus().clone();
        Self {
            backup_service: Arc::new(service),
            event_bus,
        }
    }
}
