//! Channel tree records.
//!
//! Channels are modelled as a sum type keyed by their `type` discriminant so
//! every restore path handles each kind exhaustively. Parents are referenced
//! by name because names survive recreation while identifiers do not.

use serde::{Deserialize, Serialize};

use super::message::MessageRecord;

/// Kind discriminant shared by captured records and live channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Category container.
    Category,
    /// Plain text channel.
    Text,
    /// Announcement (news) channel.
    Announcement,
    /// Voice channel.
    Voice,
    /// Stage channel.
    Stage,
    /// Forum channel.
    Forum,
    /// Public thread.
    PublicThread,
    /// Private thread.
    PrivateThread,
    /// Thread inside an announcement channel.
    AnnouncementThread,
}

impl ChannelKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Text => "text",
            Self::Announcement => "announcement",
            Self::Voice => "voice",
            Self::Stage => "stage",
            Self::Forum => "forum",
            Self::PublicThread => "public_thread",
            Self::PrivateThread => "private_thread",
            Self::AnnouncementThread => "announcement_thread",
        }
    }

    /// Returns `true` for thread kinds.
    #[must_use]
    pub const fn is_thread(self) -> bool {
        matches!(
            self,
            Self::PublicThread | Self::PrivateThread | Self::AnnouncementThread
        )
    }

    /// Returns `true` for kinds whose message history is captured.
    #[must_use]
    pub const fn is_text_capable(self) -> bool {
        matches!(self, Self::Text | Self::Announcement)
    }
}

/// Role permission overwrite captured by role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Name of the role the overwrite applies to.
    pub role_name: String,
    /// Allowed permission bitmask (decimal string).
    pub allow: String,
    /// Denied permission bitmask (decimal string).
    pub deny: String,
}

/// Fields common to every non-category channel record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBase {
    /// Source-side channel id (opaque hint).
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Channel name.
    pub name: String,
    /// Name of the parent category.
    #[serde(default)]
    pub parent: Option<String>,
    /// Sort position.
    #[serde(default)]
    pub position: i64,
    /// Role permission overwrites.
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
}

/// Text or announcement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChannelRecord {
    /// Common fields.
    #[serde(flatten)]
    pub base: ChannelBase,
    /// Channel topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Age-restricted flag.
    #[serde(default)]
    pub nsfw: bool,
    /// Slow-mode seconds.
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,
    /// Captured messages, newest first.
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    /// Captured threads.
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

/// Voice channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceChannelRecord {
    /// Common fields.
    #[serde(flatten)]
    pub base: ChannelBase,
    /// Audio bitrate in bits per second.
    pub bitrate: u32,
    /// Maximum connected users (0 = unlimited).
    #[serde(default)]
    pub user_limit: u32,
}

/// Stage channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageChannelRecord {
    /// Common fields.
    #[serde(flatten)]
    pub base: ChannelBase,
    /// Audio bitrate in bits per second.
    pub bitrate: u32,
    /// Maximum connected users (0 = unlimited).
    #[serde(default)]
    pub user_limit: u32,
    /// Stage topic.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Forum channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumChannelRecord {
    /// Common fields.
    #[serde(flatten)]
    pub base: ChannelBase,
    /// Guidelines shown to posters.
    #[serde(default)]
    pub topic: Option<String>,
    /// Age-restricted flag.
    #[serde(default)]
    pub nsfw: bool,
    /// Slow-mode seconds.
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,
    /// Tags posts can carry.
    #[serde(default)]
    pub available_tags: Vec<ForumTag>,
    /// Reaction added to new posts.
    #[serde(default)]
    pub default_reaction: Option<DefaultReaction>,
    /// Captured posts.
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

/// Forum post tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumTag {
    /// Tag name.
    pub name: String,
    /// Whether only moderators may apply the tag.
    #[serde(default)]
    pub moderated: bool,
    /// Custom emoji id.
    #[serde(default)]
    pub emoji_id: Option<String>,
    /// Unicode emoji.
    #[serde(default)]
    pub emoji_name: Option<String>,
}

/// Default forum reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultReaction {
    /// Custom emoji id.
    #[serde(default)]
    pub emoji_id: Option<String>,
    /// Unicode emoji.
    #[serde(default)]
    pub emoji_name: Option<String>,
}

/// Thread (or forum post) with its message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    /// Thread name.
    pub name: String,
    /// Archived flag.
    #[serde(default)]
    pub archived: bool,
    /// Locked flag.
    #[serde(default)]
    pub locked: bool,
    /// Minutes of inactivity before auto-archive.
    pub auto_archive_minutes: u32,
    /// Slow-mode seconds.
    #[serde(default)]
    pub rate_limit_per_user: u32,
    /// Captured messages, newest first.
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

/// Captured channel of any non-category kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelRecord {
    /// Plain text channel.
    Text(TextChannelRecord),
    /// Announcement channel.
    Announcement(TextChannelRecord),
    /// Voice channel.
    Voice(VoiceChannelRecord),
    /// Stage channel.
    Stage(StageChannelRecord),
    /// Forum channel.
    Forum(ForumChannelRecord),
}

impl ChannelRecord {
    /// Returns the shared fields.
    #[must_use]
    pub const fn base(&self) -> &ChannelBase {
        match self {
            Self::Text(c) | Self::Announcement(c) => &c.base,
            Self::Voice(c) => &c.base,
            Self::Stage(c) => &c.base,
            Self::Forum(c) => &c.base,
        }
    }

    /// Returns the kind discriminant.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::Text(_) => ChannelKind::Text,
            Self::Announcement(_) => ChannelKind::Announcement,
            Self::Voice(_) => ChannelKind::Voice,
            Self::Stage(_) => ChannelKind::Stage,
            Self::Forum(_) => ChannelKind::Forum,
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Returns the source-side channel id, if captured.
    #[must_use]
    pub fn channel_id(&self) -> Option<&str> {
        self.base().channel_id.as_deref()
    }

    /// Returns the parent category name.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.base().parent.as_deref()
    }
}

/// Category with its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Source-side category id (opaque hint).
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Category name.
    pub name: String,
    /// Sort position.
    #[serde(default)]
    pub position: i64,
    /// Role permission overwrites.
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
    /// Child channels in position order.
    #[serde(default)]
    pub children: Vec<ChannelRecord>,
}

/// The captured channel hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelTree {
    /// Categories in position order.
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
    /// Channels without a category.
    #[serde(default)]
    pub others: Vec<ChannelRecord>,
}

impl ChannelTree {
    /// Returns `true` if no channel of any kind was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.others.is_empty()
    }

    /// Iterates every non-category channel: category children first (in
    /// category order), then uncategorized channels.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.categories
            .iter()
            .flat_map(|c| c.children.iter())
            .chain(self.others.iter())
    }
}
