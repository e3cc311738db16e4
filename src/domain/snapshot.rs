//! The snapshot aggregate.
//!
//! A [`Snapshot`] is immutable once built: restore and diff only ever read
//! it, and it is shared behind an `Arc`. Every identifier stored inside is a
//! *source-side* identifier and is only a hint when restoring anywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SnapshotId;
use super::channel::ChannelTree;
use super::image::ImageRecord;
use super::onboarding::OnboardingRecord;
use super::role::RoleRecord;
use super::roster::{BanRecord, EmojiRecord, MemberRoleRecord};
use super::scheduled_event::ScheduledEventRecord;

/// AFK voice channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfkRecord {
    /// Name of the AFK voice channel.
    pub channel_name: String,
    /// Idle seconds before a member is moved.
    pub timeout_secs: u32,
}

/// Widget settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetRecord {
    /// Whether the widget is enabled.
    pub enabled: bool,
    /// Name of the invite channel shown by the widget.
    #[serde(default)]
    pub channel_name: Option<String>,
}

/// Workspace-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Workspace name.
    pub name: String,
    /// Platform verification level.
    #[serde(default)]
    pub verification_level: u8,
    /// Platform explicit-content filter level.
    #[serde(default)]
    pub explicit_content_filter: u8,
    /// Platform default notification level.
    #[serde(default)]
    pub default_message_notifications: u8,
    /// AFK settings.
    #[serde(default)]
    pub afk: Option<AfkRecord>,
    /// Widget settings.
    #[serde(default)]
    pub widget: WidgetRecord,
    /// Workspace icon.
    #[serde(default)]
    pub icon: Option<ImageRecord>,
    /// Invite splash.
    #[serde(default)]
    pub splash: Option<ImageRecord>,
    /// Banner.
    #[serde(default)]
    pub banner: Option<ImageRecord>,
}

/// Identity of the undeletable community channels, by id and by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityLinks {
    /// Source-side rules channel id.
    #[serde(default)]
    pub rules_channel_id: Option<String>,
    /// Rules channel name.
    #[serde(default)]
    pub rules_channel_name: Option<String>,
    /// Source-side public updates channel id.
    #[serde(default)]
    pub public_updates_channel_id: Option<String>,
    /// Public updates channel name.
    #[serde(default)]
    pub public_updates_channel_name: Option<String>,
}

impl CommunityLinks {
    /// Returns `true` if the channel (by id or name) is the rules channel.
    #[must_use]
    pub fn is_rules(&self, channel_id: Option<&str>, name: &str) -> bool {
        matches_link(
            self.rules_channel_id.as_deref(),
            self.rules_channel_name.as_deref(),
            channel_id,
            name,
        )
    }

    /// Returns `true` if the channel (by id or name) is the public updates
    /// channel.
    #[must_use]
    pub fn is_public_updates(&self, channel_id: Option<&str>, name: &str) -> bool {
        matches_link(
            self.public_updates_channel_id.as_deref(),
            self.public_updates_channel_name.as_deref(),
            channel_id,
            name,
        )
    }
}

fn matches_link(
    link_id: Option<&str>,
    link_name: Option<&str>,
    channel_id: Option<&str>,
    name: &str,
) -> bool {
    let by_id = link_id.is_some() && link_id == channel_id;
    let by_name = link_name.is_some_and(|n| n == name);
    by_id || by_name
}

/// Point-in-time structure of a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// Source workspace identifier.
    pub workspace_id: String,
    /// Capture time.
    pub created_at: DateTime<Utc>,
    /// Workspace configuration.
    pub settings: WorkspaceSettings,
    /// Roles, highest position first.
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
    /// Channel hierarchy.
    #[serde(default)]
    pub channels: ChannelTree,
    /// Custom emoji.
    #[serde(default)]
    pub emojis: Vec<EmojiRecord>,
    /// Banned users.
    #[serde(default)]
    pub bans: Vec<BanRecord>,
    /// Member role assignments.
    #[serde(default)]
    pub members: Vec<MemberRoleRecord>,
    /// Onboarding flow, when the platform exposed one.
    #[serde(default)]
    pub onboarding: Option<OnboardingRecord>,
    /// Scheduled events, when the platform exposed them.
    #[serde(default)]
    pub scheduled_events: Option<Vec<ScheduledEventRecord>>,
    /// Rules/public-updates channel identity.
    #[serde(default)]
    pub community: Option<CommunityLinks>,
}

impl Snapshot {
    /// Creates a snapshot with the given configuration and every section
    /// empty.
    #[must_use]
    pub fn empty(id: SnapshotId, workspace_id: impl Into<String>, settings: WorkspaceSettings) -> Self {
        Self {
            id,
            workspace_id: workspace_id.into(),
            created_at: Utc::now(),
            settings,
            roles: Vec::new(),
            channels: ChannelTree::default(),
            emojis: Vec::new(),
            bans: Vec::new(),
            members: Vec::new(),
            onboarding: None,
            scheduled_events: None,
            community: None,
        }
    }

    /// Returns the serialized JSON size in kilobytes, rounded to two decimals.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if the snapshot cannot be encoded.
    pub fn size_kb(&self) -> Result<f64, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(bytes_to_kb(bytes.len()))
    }
}

/// Converts a byte count to kilobytes rounded to two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_kb(bytes: usize) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_matches_by_id_or_name() {
        let links = CommunityLinks {
            rules_channel_id: Some("7".into()),
            rules_channel_name: Some("rules".into()),
            public_updates_channel_id: None,
            public_updates_channel_name: Some("mod-updates".into()),
        };
        assert!(links.is_rules(Some("7"), "renamed"));
        assert!(links.is_rules(None, "rules"));
        assert!(!links.is_rules(Some("8"), "chat"));
        assert!(links.is_public_updates(None, "mod-updates"));
        assert!(!links.is_public_updates(None, "rules"));
    }

    #[test]
    fn kb_rounding() {
        assert!((bytes_to_kb(2048) - 2.0).abs() < f64::EPSILON);
        assert!((bytes_to_kb(1536) - 1.5).abs() < f64::EPSILON);
    }
}
