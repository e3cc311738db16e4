//! Snapshot DTOs for list, fetch and diff.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::persistence::SnapshotSummary;
use crate::remote::PremiumTier;
use crate::service::{DiffSection, SnapshotDiff};

/// Snapshot summary for list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotSummaryDto {
    /// Snapshot identifier.
    pub id: String,
    /// Source workspace identifier.
    pub workspace_id: String,
    /// Workspace name at capture time.
    pub workspace_name: String,
    /// Capture timestamp.
    pub created_at: DateTime<Utc>,
    /// Stored size in kilobytes.
    pub size_kb: f64,
    /// Number of captured roles.
    pub roles: usize,
    /// Number of captured categories and channels.
    pub channels: usize,
}

impl From<SnapshotSummary> for SnapshotSummaryDto {
    fn from(summary: SnapshotSummary) -> Self {
        Self {
            id: summary.id.to_string(),
            workspace_id: summary.workspace_id,
            workspace_name: summary.workspace_name,
            created_at: summary.created_at,
            size_kb: summary.size_kb,
            roles: summary.roles,
            channels: summary.channels,
        }
    }
}

/// Paginated list response for `GET /snapshots`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotListResponse {
    /// Snapshot summaries for this page.
    pub data: Vec<SnapshotSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Added, removed and changed keys of one section.
#[derive(Debug, Serialize, ToSchema)]
pub struct DiffSectionDto {
    /// Keys only in the newer snapshot.
    pub added: Vec<String>,
    /// Keys only in the older snapshot.
    pub removed: Vec<String>,
    /// Keys in both whose content differs.
    pub changed: Vec<String>,
}

impl From<DiffSection> for DiffSectionDto {
    fn from(section: DiffSection) -> Self {
        Self {
            added: section.added,
            removed: section.removed,
            changed: section.changed,
        }
    }
}

/// Response body for `GET /snapshots/{from}/diff/{to}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotDiffResponse {
    /// Older snapshot id.
    pub from: String,
    /// Newer snapshot id.
    pub to: String,
    /// Capture time of the older snapshot.
    pub from_created_at: DateTime<Utc>,
    /// Capture time of the newer snapshot.
    pub to_created_at: DateTime<Utc>,
    /// `true` when nothing differs.
    pub identical: bool,
    /// Workspace configuration differs.
    pub config_changed: bool,
    /// Onboarding flow differs.
    pub onboarding_changed: bool,
    /// Roles.
    pub roles: DiffSectionDto,
    /// Categories and channels.
    pub channels: DiffSectionDto,
    /// Custom emoji.
    pub emojis: DiffSectionDto,
    /// Bans.
    pub bans: DiffSectionDto,
    /// Member role assignments.
    pub members: DiffSectionDto,
}

impl From<SnapshotDiff> for SnapshotDiffResponse {
    fn from(diff: SnapshotDiff) -> Self {
        Self {
            identical: diff.is_empty(),
            from: diff.from.to_string(),
            to: diff.to.to_string(),
            from_created_at: diff.from_created_at,
            to_created_at: diff.to_created_at,
            config_changed: diff.config_changed,
            onboarding_changed: diff.onboarding_changed,
            roles: diff.roles.into(),
            channels: diff.channels.into(),
            emojis: diff.emojis.into(),
            bans: diff.bans.into(),
            members: diff.members.into(),
        }
    }
}

/// Limits of one premium tier.
#[derive(Debug, Serialize, ToSchema)]
pub struct TierLimitsDto {
    /// Tier name.
    pub tier: &'static str,
    /// Highest voice bitrate.
    pub max_bitrate: u32,
    /// Custom emoji slots.
    pub max_emojis: usize,
}

impl From<PremiumTier> for TierLimitsDto {
    fn from(tier: PremiumTier) -> Self {
        Self {
            tier: tier.as_str(),
            max_bitrate: tier.max_bitrate(),
            max_emojis: tier.max_emojis(),
        }
    }
}

/// Response body for `GET /config/limits`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LimitsResponse {
    /// Per-tier limits, lowest tier first.
    pub tiers: Vec<TierLimitsDto>,
    /// Default messages captured and replayed per channel.
    pub default_messages_per_channel: usize,
    /// Upper bound on messages captured per channel.
    pub max_messages_per_channel: usize,
    /// Longest role name the platform accepts.
    pub max_role_name_len: usize,
    /// Longest message body the platform accepts.
    pub max_message_len: usize,
}
