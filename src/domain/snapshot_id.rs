//! Type-safe snapshot identifier.
//!
//! [`SnapshotId`] is a newtype over the identifier string so snapshot ids
//! cannot be confused with the source-side workspace, role or channel ids
//! stored inside a snapshot. Generated ids are UUID v4 strings; callers may
//! also supply their own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BackupError;

/// Unique identifier of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Creates a new random `SnapshotId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id only uses `[A-Za-z0-9_-]` and is therefore
    /// safe to use as a file name.
    #[must_use]
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(BackupError::Validation("snapshot id is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SnapshotId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<uuid::Uuid> for SnapshotId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = SnapshotId::new();
        let b = SnapshotId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn serde_is_transparent() {
        let id = SnapshotId::from("nightly-1");
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"nightly-1\"");
    }

    #[test]
    fn path_safety() {
        assert!(SnapshotId::new().is_path_safe());
        assert!(SnapshotId::from("weekly_02").is_path_safe());
        assert!(!SnapshotId::from("../etc/passwd").is_path_safe());
        assert!(!SnapshotId::from("").is_path_safe());
    }

    #[test]
    fn parse_rejects_blank() {
        assert!("   ".parse::<SnapshotId>().is_err());
        let Ok(id) = " abc ".parse::<SnapshotId>() else {
            panic!("parse failed");
        };
        assert_eq!(id.as_str(), "abc");
    }
}
