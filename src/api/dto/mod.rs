//! Data Transfer Objects for REST request/response serialization.
//!
//! Snapshot documents are returned as stored; the DTOs here wrap them with
//! listing and sizing metadata.

pub mod common_dto;
pub mod snapshot_dto;

pub use common_dto::*;
pub use snapshot_dto::*;
