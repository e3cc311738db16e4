//! Stored snapshot handlers: list, fetch, delete, diff.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::future::join_all;

use crate::api::dto::{
    PaginationParams, SnapshotDiffResponse, SnapshotListResponse, SnapshotSummaryDto,
};
use crate::app_state::AppState;
use crate::domain::SnapshotId;
use crate::error::{BackupError, ErrorResponse};

/// `GET /snapshots`: List stored snapshots with pagination.
///
/// # Errors
///
/// Returns [`BackupError::Persistence`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots",
    tag = "Snapshots",
    summary = "List snapshots",
    description = "Returns a paginated list of stored snapshots ordered by id.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated snapshot list", body = SnapshotListResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, BackupError> {
    let ids = state.backup_service.list().await?;
    let (page, pagination) = params.paginate(ids);

    let service = &state.backup_service;
    let summaries = join_all(page.iter().map(|id| service.summary(id))).await;
    let mut data = Vec::with_capacity(summaries.len());
    for (id, summary) in page.iter().zip(summaries) {
        match summary {
            Ok(summary) => data.push(SnapshotSummaryDto::from(summary)),
            // Deleted between list and fetch.
            Err(BackupError::NotFound(_)) => {
                tracing::debug!(snapshot_id = %id, "snapshot vanished while listing");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Json(SnapshotListResponse { data, pagination }))
}

/// `GET /snapshots/{id}`: Get a stored snapshot and its size.
///
/// # Errors
///
/// Returns [`BackupError::NotFound`] if no snapshot has this id.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots/{id}",
    tag = "Snapshots",
    summary = "Get snapshot",
    description = "Returns the full snapshot document with its serialized size in kilobytes.",
    params(
        ("id" = String, Path, description = "Snapshot id"),
    ),
    responses(
        (status = 200, description = "Snapshot with size", body = serde_json::Value),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
    )
)]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BackupError> {
    let id: SnapshotId = id.parse()?;
    let info = state.backup_service.fetch(&id).await?;
    Ok(Json(info))
}

/// `DELETE /snapshots/{id}`: Remove a stored snapshot.
///
/// # Errors
///
/// Returns [`BackupError::NotFound`] if no snapshot has this id.
#[utoipa::path(
    delete,
    path = "/api/v1/snapshots/{id}",
    tag = "Snapshots",
    summary = "Delete snapshot",
    description = "Removes a stored snapshot and emits a SnapshotDeleted event.",
    params(
        ("id" = String, Path, description = "Snapshot id"),
    ),
    responses(
        (status = 204, description = "Snapshot deleted"),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
    )
)]
pub async fn delete_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BackupError> {
    let id: SnapshotId = id.parse()?;
    state.backup_service.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /snapshots/{from}/diff/{to}`: Compare two stored snapshots.
///
/// # Errors
///
/// Returns [`BackupError::NotFound`] if either snapshot is missing.
#[utoipa::path(
    get,
    path = "/api/v1/snapshots/{from}/diff/{to}",
    tag = "Snapshots",
    summary = "Diff snapshots",
    description = "Reports configuration and onboarding changes plus added, removed and changed keys per section.",
    params(
        ("from" = String, Path, description = "Older snapshot id"),
        ("to" = String, Path, description = "Newer snapshot id"),
    ),
    responses(
        (status = 200, description = "Snapshot differences", body = SnapshotDiffResponse),
        (status = 404, description = "Snapshot not found", body = ErrorResponse),
    )
)]
pub async fn diff_snapshots(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<impl IntoResponse, BackupError> {
    let from: SnapshotId = from.parse()?;
    let to: SnapshotId = to.parse()?;
    let diff = state.backup_service.diff(from.into(), to.into()).await?;
    Ok(Json(SnapshotDiffResponse::from(diff)))
}

/// Snapshot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/snapshots", get(list_snapshots))
        .route("/snapshots/{id}", get(get_snapshot).delete(delete_snapshot))
        .route("/snapshots/{from}/diff/{to}", get(diff_snapshots))
}
