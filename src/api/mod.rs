//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Snapshot endpoints are mounted under `/api/v1`; system endpoints at the
//! root. With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable under `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "workspace-vault",
        description = "Snapshot storage, inspection and diff for community workspaces."
    ),
    paths(
        handlers::snapshots::list_snapshots,
        handlers::snapshots::get_snapshot,
        handlers::snapshots::delete_snapshot,
        handlers::snapshots::diff_snapshots,
        handlers::system::health_handler,
        handlers::system::limits_handler,
    ),
    components(schemas(
        dto::PaginationMeta,
        dto::SnapshotSummaryDto,
        dto::SnapshotListResponse,
        dto::DiffSectionDto,
        dto::SnapshotDiffResponse,
        dto::TierLimitsDto,
        dto::LimitsResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Snapshots", description = "Stored snapshots"),
        (name = "System", description = "Health and limits"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
