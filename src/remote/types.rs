//! Live entities read from the remote platform and the mutation requests
//! sent to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::channel::{DefaultReaction, ForumTag};
use crate::domain::{ChannelKind, EmbedRecord, EventEntityType, ImageData};

/// Premium tier of a workspace; governs bitrate and emoji limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumTier {
    /// No boosts.
    #[default]
    None,
    /// Level 1.
    Tier1,
    /// Level 2.
    Tier2,
    /// Level 3.
    Tier3,
}

impl PremiumTier {
    /// Every tier, lowest first.
    pub const ALL: [Self; 4] = [Self::None, Self::Tier1, Self::Tier2, Self::Tier3];

    /// Highest voice bitrate the tier allows.
    #[must_use]
    pub const fn max_bitrate(self) -> u32 {
        match self {
            Self::None => 64_000,
            Self::Tier1 => 128_000,
            Self::Tier2 => 256_000,
            Self::Tier3 => 384_000,
        }
    }

    /// Returns the wire name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
            Self::Tier3 => "tier3",
        }
    }

    /// Custom emoji slots the tier allows.
    #[must_use]
    pub const fn max_emojis(self) -> usize {
        match self {
            Self::None => 50,
            Self::Tier1 => 100,
            Self::Tier2 => 150,
            Self::Tier3 => 250,
        }
    }

    /// Clamps a bitrate downward until the tier accepts it, substituting the
    /// next-lower tier cap at each step.
    #[must_use]
    pub fn clamp_bitrate(self, bitrate: u32) -> u32 {
        let ceiling = self.max_bitrate();
        let mut bitrate = bitrate;
        while bitrate > ceiling {
            bitrate = Self::ALL
                .iter()
                .rev()
                .map(|tier| tier.max_bitrate())
                .find(|cap| *cap < bitrate)
                .unwrap_or(ceiling);
        }
        bitrate
    }
}

/// Optional platform features a workspace may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceFeature {
    /// Community workspace (rules channel, stage channels, content filter).
    Community,
    /// Announcement channels.
    News,
}

/// Capability grants a caller may hold on a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read workspace structure; the minimum grant for capture.
    ViewWorkspace,
    /// Read channel message history.
    ReadMessageHistory,
    /// Mutate workspace structure.
    ManageWorkspace,
}

/// A channel referenced by id together with its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Channel id.
    pub id: String,
    /// Channel name.
    pub name: String,
}

/// Workspace-level state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    /// Workspace id; also the id of the implicit role.
    pub id: String,
    /// Workspace name.
    pub name: String,
    /// Verification level.
    pub verification_level: u8,
    /// Explicit-content filter level.
    pub explicit_content_filter: u8,
    /// Default notification level.
    pub default_message_notifications: u8,
    /// AFK voice channel.
    pub afk_channel: Option<ChannelRef>,
    /// AFK timeout in seconds.
    pub afk_timeout_secs: u32,
    /// Widget enabled flag.
    pub widget_enabled: bool,
    /// Widget invite channel.
    pub widget_channel: Option<ChannelRef>,
    /// Icon URL.
    pub icon_url: Option<String>,
    /// Splash URL.
    pub splash_url: Option<String>,
    /// Banner URL.
    pub banner_url: Option<String>,
    /// Premium tier.
    pub premium_tier: PremiumTier,
    /// Enabled features.
    pub features: Vec<WorkspaceFeature>,
    /// Rules channel (community workspaces).
    pub rules_channel: Option<ChannelRef>,
    /// Public updates channel (community workspaces).
    pub public_updates_channel: Option<ChannelRef>,
    /// System message channel id.
    pub system_channel_id: Option<String>,
}

impl WorkspaceInfo {
    /// Returns `true` if the feature is enabled.
    #[must_use]
    pub fn has_feature(&self, feature: WorkspaceFeature) -> bool {
        self.features.contains(&feature)
    }
}

/// A role as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRole {
    /// Role id.
    pub id: String,
    /// Role name.
    pub name: String,
    /// RGB color.
    pub color: u32,
    /// Hoist flag.
    pub hoist: bool,
    /// Hierarchy position.
    pub position: i64,
    /// Permission bitmask.
    pub permissions: u64,
    /// Mentionable flag.
    pub mentionable: bool,
    /// Owned by an integration; cannot be deleted or captured.
    pub managed: bool,
    /// The implicit role every member holds.
    pub is_everyone: bool,
    /// Icon URL.
    pub icon_url: Option<String>,
    /// Unicode emoji.
    pub unicode_emoji: Option<String>,
}

/// Who a permission overwrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteKind {
    /// A role.
    Role,
    /// A single member.
    Member,
}

/// A channel permission overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    /// Role or member id.
    pub id: String,
    /// Target kind.
    pub kind: OverwriteKind,
    /// Allowed bits.
    pub allow: u64,
    /// Denied bits.
    pub deny: u64,
}

/// A channel as it exists remotely (threads excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveChannel {
    /// Channel id.
    pub id: String,
    /// Channel name.
    pub name: String,
    /// Channel kind.
    pub kind: ChannelKind,
    /// Parent category id.
    pub parent_id: Option<String>,
    /// Sort position.
    pub position: i64,
    /// Topic.
    pub topic: Option<String>,
    /// Age-restricted flag.
    pub nsfw: bool,
    /// Slow-mode seconds.
    pub rate_limit_per_user: Option<u32>,
    /// Voice bitrate.
    pub bitrate: Option<u32>,
    /// Voice user limit.
    pub user_limit: Option<u32>,
    /// Permission overwrites.
    pub overwrites: Vec<Overwrite>,
    /// Forum tags.
    pub available_tags: Vec<ForumTag>,
    /// Forum default reaction.
    pub default_reaction: Option<DefaultReaction>,
}

/// A thread as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveThread {
    /// Thread id.
    pub id: String,
    /// Owning channel id.
    pub parent_id: String,
    /// Thread name.
    pub name: String,
    /// Archived flag.
    pub archived: bool,
    /// Locked flag.
    pub locked: bool,
    /// Auto-archive minutes.
    pub auto_archive_minutes: u32,
    /// Slow-mode seconds.
    pub rate_limit_per_user: u32,
}

/// Author of a live message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    /// Username.
    pub username: String,
    /// Display avatar URL.
    pub avatar_url: Option<String>,
}

/// A file attached to a live message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAttachment {
    /// File name.
    pub name: String,
    /// Download URL.
    pub url: String,
}

/// A message as it exists remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    /// Message id.
    pub id: String,
    /// Author; `None` for system messages.
    pub author: Option<MessageAuthor>,
    /// Content with mentions rendered as text.
    pub content: String,
    /// Embeds.
    pub embeds: Vec<EmbedRecord>,
    /// Attachments.
    pub attachments: Vec<LiveAttachment>,
    /// Pinned flag.
    pub pinned: bool,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

/// A custom emoji as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEmoji {
    /// Emoji id.
    pub id: String,
    /// Emoji name.
    pub name: String,
    /// Image URL.
    pub url: String,
}

/// A ban as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveBan {
    /// Banned user id.
    pub user_id: String,
    /// Ban reason.
    pub reason: Option<String>,
}

/// A member as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMember {
    /// User id.
    pub user_id: String,
    /// Username.
    pub username: String,
    /// Role ids held, implicit role excluded.
    pub role_ids: Vec<String>,
}

/// A scheduled event as it exists remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveScheduledEvent {
    /// Event id.
    pub id: String,
    /// Event name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Scheduled start.
    pub start: Option<DateTime<Utc>>,
    /// Scheduled end.
    pub end: Option<DateTime<Utc>>,
    /// Privacy level.
    pub privacy_level: u8,
    /// Hosting kind.
    pub entity_type: EventEntityType,
    /// Hosting channel.
    pub channel_id: Option<String>,
    /// External location.
    pub location: Option<String>,
    /// Cover image URL.
    pub image_url: Option<String>,
    /// Recurrence rule.
    pub recurrence_rule: Option<serde_json::Value>,
}

/// A send-as-original-author identity bound to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHandle {
    /// Relay id.
    pub id: String,
    /// Channel the relay posts into.
    pub channel_id: String,
    /// Relay display name.
    pub name: String,
}

/// One workspace-level setting change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEdit {
    /// Rename the workspace.
    Name(String),
    /// Set or clear the icon.
    Icon(Option<ImageData>),
    /// Set or clear the invite splash.
    Splash(Option<ImageData>),
    /// Set or clear the banner.
    Banner(Option<ImageData>),
    /// Set the verification level.
    VerificationLevel(u8),
    /// Set the default notification level.
    DefaultMessageNotifications(u8),
    /// Set the explicit-content filter level.
    ExplicitContentFilter(u8),
    /// Set or clear the AFK channel.
    AfkChannel(Option<String>),
    /// Set the AFK timeout in seconds.
    AfkTimeout(u32),
    /// Configure the widget.
    Widget {
        /// Enabled flag.
        enabled: bool,
        /// Invite channel id.
        channel_id: Option<String>,
    },
    /// Set or clear the system channel.
    SystemChannel(Option<String>),
    /// Set the system channel suppression flags.
    SystemChannelFlags(u32),
}

impl WorkspaceEdit {
    /// Short label used in logs and reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Icon(_) => "icon",
            Self::Splash(_) => "splash",
            Self::Banner(_) => "banner",
            Self::VerificationLevel(_) => "verification_level",
            Self::DefaultMessageNotifications(_) => "default_message_notifications",
            Self::ExplicitContentFilter(_) => "explicit_content_filter",
            Self::AfkChannel(_) => "afk_channel",
            Self::AfkTimeout(_) => "afk_timeout",
            Self::Widget { .. } => "widget",
            Self::SystemChannel(_) => "system_channel",
            Self::SystemChannelFlags(_) => "system_channel_flags",
        }
    }
}

/// Role create/edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    /// Role name.
    pub name: String,
    /// RGB color.
    pub color: u32,
    /// Hoist flag.
    pub hoist: bool,
    /// Permission bitmask.
    pub permissions: u64,
    /// Mentionable flag.
    pub mentionable: bool,
    /// Icon.
    pub icon: Option<ImageData>,
    /// Unicode emoji.
    pub unicode_emoji: Option<String>,
}

/// Channel create/edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel name.
    pub name: String,
    /// Channel kind.
    pub kind: ChannelKind,
    /// Parent category id.
    pub parent_id: Option<String>,
    /// Topic.
    pub topic: Option<String>,
    /// Age-restricted flag.
    pub nsfw: bool,
    /// Slow-mode seconds.
    pub rate_limit_per_user: Option<u32>,
    /// Voice bitrate.
    pub bitrate: Option<u32>,
    /// Voice user limit.
    pub user_limit: Option<u32>,
    /// Forum tags.
    pub available_tags: Vec<ForumTag>,
    /// Forum default reaction.
    pub default_reaction: Option<DefaultReaction>,
}

impl ChannelSpec {
    /// Creates a bare request for a channel of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_id: None,
            topic: None,
            nsfw: false,
            rate_limit_per_user: None,
            bitrate: None,
            user_limit: None,
            available_tags: Vec::new(),
            default_reaction: None,
        }
    }
}

/// Thread creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    /// Thread name.
    pub name: String,
    /// Auto-archive minutes.
    pub auto_archive_minutes: u32,
    /// Starter post content (required by forum channels).
    pub starter_message: Option<String>,
}

/// Message history page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    /// Page size (1..=100).
    pub limit: usize,
    /// Only return messages older than this id.
    pub before: Option<String>,
}

/// Mention classes a relayed message may ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    /// User mentions.
    Users,
    /// Role mentions.
    Roles,
    /// `@everyone` and `@here`.
    Everyone,
}

/// Mention expansion policy for relayed messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedMentions {
    /// Mention classes that are expanded; empty disables all pings.
    pub parse: Vec<MentionKind>,
}

impl AllowedMentions {
    /// Disables every mention.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// File uploaded with a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// File name.
    pub name: String,
    /// Content or source URL.
    pub data: ImageData,
}

/// A message sent through a relay identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage {
    /// Text content.
    pub content: Option<String>,
    /// Display name to post as.
    pub username: String,
    /// Avatar to post with.
    pub avatar_url: Option<String>,
    /// Embeds.
    pub embeds: Vec<EmbedRecord>,
    /// Files.
    pub files: Vec<FileUpload>,
    /// Mention policy.
    pub allowed_mentions: AllowedMentions,
    /// Target thread inside the relay's channel.
    pub thread_id: Option<String>,
}

/// Scheduled event creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEventSpec {
    /// Event name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: Option<DateTime<Utc>>,
    /// Privacy level.
    pub privacy_level: u8,
    /// Hosting kind.
    pub entity_type: EventEntityType,
    /// Hosting channel for channel-bound events.
    pub channel_id: Option<String>,
    /// Location for external events.
    pub location: Option<String>,
    /// Cover image.
    pub image: Option<ImageData>,
    /// Recurrence rule.
    pub recurrence_rule: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_clamps_to_tier_ceiling() {
        assert_eq!(PremiumTier::Tier1.clamp_bitrate(384_000), 128_000);
        assert_eq!(PremiumTier::None.clamp_bitrate(384_000), 64_000);
        assert_eq!(PremiumTier::Tier1.clamp_bitrate(200_000), 128_000);
        assert_eq!(PremiumTier::Tier3.clamp_bitrate(384_000), 384_000);
        assert_eq!(PremiumTier::None.clamp_bitrate(8_000), 8_000);
    }

    #[test]
    fn clamped_bitrate_never_exceeds_ceiling() {
        for tier in PremiumTier::ALL {
            for bitrate in [0, 64_000, 96_000, 128_001, 300_000, 384_000, u32::MAX] {
                assert!(tier.clamp_bitrate(bitrate) <= tier.max_bitrate());
            }
        }
    }

    #[test]
    fn emoji_caps() {
        let caps: Vec<usize> = PremiumTier::ALL.iter().map(|t| t.max_emojis()).collect();
        assert_eq!(caps, vec![50, 100, 150, 250]);
    }
}
