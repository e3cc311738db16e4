//! System endpoints: health check and platform limits.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::{LimitsResponse, TierLimitsDto};
use crate::app_state::AppState;
use crate::domain::message::MAX_MESSAGE_CONTENT_LEN;
use crate::domain::role::MAX_ROLE_NAME_LEN;
use crate::remote::PremiumTier;
use crate::service::builder::{DEFAULT_MAX_MESSAGES_PER_CHANNEL, MAX_MESSAGES_HARD_CAP};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/limits`: Platform limits applied during restore.
#[utoipa::path(
    get,
    path = "/config/limits",
    tag = "System",
    summary = "List restore limits",
    description = "Returns per-tier bitrate and emoji caps plus the message and name length limits enforced during capture and restore.",
    responses(
        (status = 200, description = "Limits catalog", body = LimitsResponse),
    )
)]
pub async fn limits_handler() -> impl IntoResponse {
    let limits = LimitsResponse {
        tiers: PremiumTier::ALL.into_iter().map(TierLimitsDto::from).collect(),
        default_messages_per_channel: DEFAULT_MAX_MESSAGES_PER_CHANNEL,
        max_messages_per_channel: MAX_MESSAGES_HARD_CAP,
        max_role_name_len: MAX_ROLE_NAME_LEN,
        max_message_len: MAX_MESSAGE_CONTENT_LEN,
    };
    (StatusCode::OK, Json(limits))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/limits", get(limits_handler))
}
