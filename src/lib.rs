//! # workspace-vault
//!
//! Snapshot, restore and diff engine for hierarchical community
//! workspaces: configuration, roles, the channel tree with recent message
//! history, custom emoji, bans, member roles, onboarding and scheduled
//! events.
//!
//! The engine talks to the platform only through the capability-typed
//! [`remote::WorkspaceApi`] trait, stores snapshots behind
//! [`persistence::SnapshotStore`] and reports progress on a broadcast
//! [`domain::EventBus`].
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── BackupService, CaptureScheduler (service/)
//!     │     ├── SnapshotBuilder ──────┐
//!     │     ├── RestoreOrchestrator ──┼── WorkspaceApi (remote/)
//!     │     └── DiffEngine            │
//!     ├── EventBus (domain/)          │
//!     │                               │
//!     └── SnapshotStore: file, PostgreSQL, memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod remote;
pub mod service;
pub mod ws;
