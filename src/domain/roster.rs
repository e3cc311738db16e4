//! Emoji, ban and member-role records.

use serde::{Deserialize, Serialize};

/// Platform limit on emoji name length.
pub const MAX_EMOJI_NAME_LEN: usize = 32;

/// Reason attached to re-issued bans that were captured without one.
pub const DEFAULT_BAN_REASON: &str = "Restored from backup";

/// A custom emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiRecord {
    /// Source-side emoji id.
    #[serde(default)]
    pub id: Option<String>,
    /// Emoji name.
    pub name: String,
    /// Image URL at capture time.
    pub url: String,
    /// Inlined image content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// A banned user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Banned user id.
    pub user_id: String,
    /// Ban reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// The roles one member held at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRoleRecord {
    /// Member user id.
    pub user_id: String,
    /// Username at capture time.
    #[serde(default)]
    pub username: Option<String>,
    /// Source-side role ids, implicit role excluded.
    #[serde(default)]
    pub roles: Vec<String>,
}
