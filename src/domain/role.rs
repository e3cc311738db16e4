//! Captured roles.

use serde::{Deserialize, Serialize};

use super::image::ImageRecord;

/// Platform limit on role name length.
pub const MAX_ROLE_NAME_LEN: usize = 100;

/// One role of the workspace's role hierarchy.
///
/// The implicit "everyone" role is flagged with `is_everyone`; it is edited
/// in place on restore, never created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Source-side role id (opaque hint).
    pub role_id: String,
    /// Role name.
    pub name: String,
    /// RGB color (0 = none).
    #[serde(default)]
    pub color: u32,
    /// Whether members are listed separately.
    #[serde(default)]
    pub hoist: bool,
    /// Permission bitmask as a decimal string.
    pub permissions: String,
    /// Whether anyone can mention the role.
    #[serde(default)]
    pub mentionable: bool,
    /// Hierarchy position at capture time.
    #[serde(default)]
    pub position: i64,
    /// Marks the implicit role every member holds.
    #[serde(default)]
    pub is_everyone: bool,
    /// Role icon.
    #[serde(default)]
    pub icon: Option<ImageRecord>,
    /// Unicode emoji shown next to the role.
    #[serde(default)]
    pub unicode_emoji: Option<String>,
}

impl RoleRecord {
    /// Parses the stored permission bitmask as a 64-bit unsigned value.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the string is not a valid `u64`.
    pub fn permission_bits(&self) -> Result<u64, std::num::ParseIntError> {
        self.permissions.trim().parse()
    }
}
