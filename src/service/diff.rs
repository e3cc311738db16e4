//! Structural diff between two snapshots.
//!
//! Configuration and onboarding are compared as whole canonical strings.
//! Every entity section is keyed with an entity-specific key function and
//! split into `added` (only in `to`), `removed` (only in `from`) and
//! `changed` (in both, canonical form differs). Categories share one key
//! space with their children. List order follows iteration over `to`
//! (added, changed) or `from` (removed) and carries no meaning.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::stable::IDENTITY_AND_TIME_KEYS;
use crate::domain::{
    BanRecord, CategoryRecord, ChannelKind, ChannelRecord, EmojiRecord, MemberRoleRecord,
    RoleRecord, Snapshot, SnapshotId, StableSerializer,
};
use crate::error::BackupError;

/// Added, removed and changed keys for one entity section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSection {
    /// Keys only present in the newer snapshot.
    pub added: Vec<String>,
    /// Keys only present in the older snapshot.
    pub removed: Vec<String>,
    /// Keys present in both whose content differs.
    pub changed: Vec<String>,
}

impl DiffSection {
    /// Returns `true` when nothing differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Differences between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Older snapshot.
    pub from: SnapshotId,
    /// Newer snapshot.
    pub to: SnapshotId,
    /// Capture time of the older snapshot.
    pub from_created_at: DateTime<Utc>,
    /// Capture time of the newer snapshot.
    pub to_created_at: DateTime<Utc>,
    /// Workspace configuration differs.
    pub config_changed: bool,
    /// Onboarding flow differs.
    pub onboarding_changed: bool,
    /// Roles.
    pub roles: DiffSection,
    /// Categories and channels.
    pub channels: DiffSection,
    /// Custom emoji.
    pub emojis: DiffSection,
    /// Bans.
    pub bans: DiffSection,
    /// Member role assignments.
    pub members: DiffSection,
}

impl SnapshotDiff {
    /// Returns `true` when the snapshots are structurally identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.config_changed
            && !self.onboarding_changed
            && self.roles.is_empty()
            && self.channels.is_empty()
            && self.emojis.is_empty()
            && self.bans.is_empty()
            && self.members.is_empty()
    }
}

/// Compares two snapshots.
///
/// # Errors
///
/// Returns [`BackupError::Serialization`] if a record cannot be serialized.
pub fn diff_snapshots(from: &Snapshot, to: &Snapshot) -> Result<SnapshotDiff, BackupError> {
    let full = StableSerializer::new();
    let config = StableSerializer::excluding(&IDENTITY_AND_TIME_KEYS);

    let config_changed =
        config.to_canonical_string(&from.settings)? != config.to_canonical_string(&to.settings)?;
    let onboarding_changed =
        full.to_canonical_string(&from.onboarding)? != full.to_canonical_string(&to.onboarding)?;

    Ok(SnapshotDiff {
        from: from.id.clone(),
        to: to.id.clone(),
        from_created_at: from.created_at,
        to_created_at: to.created_at,
        config_changed,
        onboarding_changed,
        roles: section(
            keyed(&full, from.roles.iter(), role_key)?,
            keyed(&full, to.roles.iter(), role_key)?,
        ),
        channels: section(channel_entries(&full, from)?, channel_entries(&full, to)?),
        emojis: section(
            keyed(&full, from.emojis.iter(), emoji_key)?,
            keyed(&full, to.emojis.iter(), emoji_key)?,
        ),
        bans: section(
            keyed(&full, from.bans.iter(), ban_key)?,
            keyed(&full, to.bans.iter(), ban_key)?,
        ),
        members: section(
            keyed(&full, from.members.iter(), member_key)?,
            keyed(&full, to.members.iter(), member_key)?,
        ),
    })
}

fn role_key(role: &RoleRecord) -> String {
    if role.role_id.is_empty() {
        role.name.clone()
    } else {
        role.role_id.clone()
    }
}

fn emoji_key(emoji: &EmojiRecord) -> String {
    if emoji.name.is_empty() {
        emoji.id.clone().unwrap_or_default()
    } else {
        emoji.name.clone()
    }
}

fn ban_key(ban: &BanRecord) -> String {
    ban.user_id.clone()
}

fn member_key(member: &MemberRoleRecord) -> String {
    member.user_id.clone()
}

fn structural_channel_key(kind: ChannelKind, name: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!("{}:{name}:{parent}", kind.as_str()),
        None => format!("{}:{name}", kind.as_str()),
    }
}

fn channel_key(channel: &ChannelRecord) -> String {
    channel.channel_id().map_or_else(
        || structural_channel_key(channel.kind(), channel.name(), channel.parent()),
        str::to_string,
    )
}

fn category_key(category: &CategoryRecord) -> String {
    category.channel_id.clone().unwrap_or_else(|| {
        structural_channel_key(ChannelKind::Category, &category.name, None)
    })
}

fn keyed<'a, T: Serialize + 'a>(
    stable: &StableSerializer,
    items: impl Iterator<Item = &'a T>,
    key: fn(&T) -> String,
) -> Result<Vec<(String, String)>, BackupError> {
    items
        .map(|item| Ok((key(item), stable.to_canonical_string(item)?)))
        .collect()
}

/// Categories are compared without their children, which are keyed on
/// their own.
fn channel_entries(
    stable: &StableSerializer,
    snapshot: &Snapshot,
) -> Result<Vec<(String, String)>, BackupError> {
    let shallow = StableSerializer::excluding(&["children"]);
    let mut entries = Vec::new();
    for category in &snapshot.channels.categories {
        entries.push((
            category_key(category),
            shallow.to_canonical_string(category)?,
        ));
        entries.extend(keyed(stable, category.children.iter(), channel_key)?);
    }
    entries.extend(keyed(stable, snapshot.channels.others.iter(), channel_key)?);
    Ok(entries)
}

fn section(from: Vec<(String, String)>, to: Vec<(String, String)>) -> DiffSection {
    let from_map: HashMap<&str, &str> = from
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let to_map: HashMap<&str, &str> = to.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let mut result = DiffSection::default();
    let mut seen = HashSet::new();
    for (key, _) in &to {
        if !seen.insert(key.as_str()) {
            continue;
        }
        match (from_map.get(key.as_str()), to_map.get(key.as_str())) {
            (None, _) => result.added.push(key.clone()),
            (Some(old), Some(new)) if old != new => result.changed.push(key.clone()),
            _ => {}
        }
    }
    let mut seen = HashSet::new();
    for (key, _) in &from {
        if seen.insert(key.as_str()) && !to_map.contains_key(key.as_str()) {
            result.removed.push(key.clone());
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ChannelBase, TextChannelRecord, WidgetRecord, WorkspaceSettings};

    fn settings() -> WorkspaceSettings {
        WorkspaceSettings {
            name: "guild".into(),
            verification_level: 1,
            explicit_content_filter: 0,
            default_message_notifications: 1,
            afk: None,
            widget: WidgetRecord::default(),
            icon: None,
            splash: None,
            banner: None,
        }
    }

    fn role(id: &str, name: &str) -> RoleRecord {
        RoleRecord {
            role_id: id.into(),
            name: name.into(),
            color: 0,
            hoist: false,
            permissions: "0".into(),
            mentionable: false,
            position: 1,
            is_everyone: false,
            icon: None,
            unicode_emoji: None,
        }
    }

    fn snapshot(id: &str) -> Snapshot {
        Snapshot::empty(SnapshotId::from(id), "w", settings())
    }

    fn diff(from: &Snapshot, to: &Snapshot) -> SnapshotDiff {
        let Ok(d) = diff_snapshots(from, to) else {
            panic!("diff failed");
        };
        d
    }

    #[test]
    fn identical_snapshots_have_empty_diff() {
        let mut a = snapshot("a");
        a.roles = vec![role("1", "A")];
        let mut b = a.clone();
        b.id = SnapshotId::from("b");
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn renamed_role_is_changed_by_id() {
        let mut from = snapshot("a");
        from.roles = vec![role("1", "A")];
        let mut to = snapshot("b");
        to.roles = vec![role("1", "A*")];
        let d = diff(&from, &to);
        assert_eq!(d.roles.changed, vec!["1".to_string()]);
        assert!(d.roles.added.is_empty());
        assert!(d.roles.removed.is_empty());

        to.roles.clear();
        let d = diff(&from, &to);
        assert_eq!(d.roles.removed, vec!["1".to_string()]);
        assert!(d.roles.changed.is_empty());
    }

    #[test]
    fn config_ignores_inlined_binaries() {
        let mut from = snapshot("a");
        from.settings.icon = Some(crate::domain::ImageRecord::url("https://cdn/i.png"));
        let mut to = snapshot("b");
        to.settings.icon = Some(crate::domain::ImageRecord {
            url: "https://cdn/i.png".into(),
            base64: Some("AAAA".into()),
        });
        assert!(!diff(&from, &to).config_changed);
        to.settings.name = "renamed".into();
        assert!(diff(&from, &to).config_changed);
    }

    #[test]
    fn channels_without_ids_use_structural_keys() {
        let text = |name: &str, parent: Option<&str>| {
            ChannelRecord::Text(TextChannelRecord {
                base: ChannelBase {
                    channel_id: None,
                    name: name.into(),
                    parent: parent.map(str::to_string),
                    position: 0,
                    permissions: Vec::new(),
                },
                topic: None,
                nsfw: false,
                rate_limit_per_user: None,
                messages: Vec::new(),
                threads: Vec::new(),
            })
        };
        let from = snapshot("a");
        let mut to = snapshot("b");
        to.channels.categories = vec![CategoryRecord {
            channel_id: None,
            name: "Info".into(),
            position: 0,
            permissions: Vec::new(),
            children: vec![text("rules", Some("Info"))],
        }];
        to.channels.others = vec![text("chat", None)];
        let d = diff(&from, &to);
        let added: HashSet<&str> = d.channels.added.iter().map(String::as_str).collect();
        assert_eq!(
            added,
            HashSet::from(["category:Info", "text:rules:Info", "text:chat"])
        );
    }

    #[test]
    fn onboarding_change_is_flagged() {
        let from = snapshot("a");
        let mut to = snapshot("b");
        to.onboarding = Some(crate::domain::OnboardingRecord {
            enabled: true,
            mode: 0,
            default_channel_ids: Vec::new(),
            prompts: Vec::new(),
        });
        let d = diff(&from, &to);
        assert!(d.onboarding_changed);
        assert!(!d.config_changed);
    }
}
