//! Captured messages, embeds and attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::{ImageData, decode_base64};

/// Longest message body the platform accepts.
pub const MAX_MESSAGE_CONTENT_LEN: usize = 2000;

/// Maximum embeds carried per message.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

/// Maximum fields carried per embed.
pub const MAX_FIELDS_PER_EMBED: usize = 25;

/// Maximum files carried per message.
pub const MAX_FILES_PER_MESSAGE: usize = 10;

/// One historical message, stored newest-first within its channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Author display name.
    pub username: String,
    /// Author avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Message text with mentions rendered as plain text.
    #[serde(default)]
    pub content: String,
    /// Rich embeds (at most [`MAX_EMBEDS_PER_MESSAGE`]).
    #[serde(default)]
    pub embeds: Vec<EmbedRecord>,
    /// File attachments.
    #[serde(default)]
    pub files: Vec<AttachmentRecord>,
    /// Whether the message was pinned.
    #[serde(default)]
    pub pinned: bool,
    /// Original send time.
    pub sent_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Returns `true` if the message has anything to replay.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        !self.content.is_empty() || !self.embeds.is_empty() || !self.files.is_empty()
    }
}

/// A rich embed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedRecord {
    /// Title line.
    #[serde(default)]
    pub title: Option<String>,
    /// Body text.
    #[serde(default)]
    pub description: Option<String>,
    /// Link target of the title.
    #[serde(default)]
    pub url: Option<String>,
    /// Accent color as RGB.
    #[serde(default)]
    pub color: Option<u32>,
    /// Embed timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Name/value fields.
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    /// Author block.
    #[serde(default)]
    pub author: Option<EmbedAuthor>,
    /// Footer block.
    #[serde(default)]
    pub footer: Option<EmbedFooter>,
    /// Thumbnail URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// A single embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field label.
    pub name: String,
    /// Field content.
    pub value: String,
    /// Whether the field renders inline.
    #[serde(default)]
    pub inline: bool,
}

/// Embed author block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    /// Author name.
    pub name: String,
    /// Author link.
    #[serde(default)]
    pub url: Option<String>,
    /// Author icon.
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Embed footer block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
    /// Footer icon.
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// File name.
    pub name: String,
    /// URL at capture time.
    pub url: String,
    /// Base64 content for inlined raster images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl AttachmentRecord {
    /// Returns the payload to re-upload: decoded bytes when inlined, the URL
    /// otherwise.
    #[must_use]
    pub fn to_upload(&self) -> ImageData {
        self.base64
            .as_deref()
            .and_then(decode_base64)
            .map_or_else(|| ImageData::Url(self.url.clone()), ImageData::Bytes)
    }
}
