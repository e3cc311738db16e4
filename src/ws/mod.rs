//! WebSocket layer: connection handling and per-workspace subscriptions.
//!
//! The endpoint at `/ws` streams capture and restore progress. Clients
//! send `subscribe`/`unsubscribe` commands naming workspace ids and
//! receive matching [`BackupEvent`](crate::domain::BackupEvent)s.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
