//! Re-resolution of stale snapshot identifiers against a live workspace.
//!
//! Every id stored in a snapshot belongs to the workspace it was captured
//! from. After a restore the target holds freshly assigned ids, so
//! references embedded in onboarding prompts, scheduled events and member
//! records are mapped by structure:
//!
//! - roles: `(name, position)` first, then `name` alone; first match wins.
//!   The name-only fallback can pair a snapshot role with an unrelated live
//!   role when two roles share a name.
//! - channels: a stale id that still exists live short-circuits to itself;
//!   otherwise the snapshot's `(name, kind, parent name)` tuple for that id
//!   is looked up among live channels.
//!
//! Unresolved references are dropped by the consumers.

use std::collections::{HashMap, HashSet};

use crate::domain::{ChannelKind, Snapshot};
use crate::remote::{LiveChannel, LiveRole};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChannelShape {
    name: String,
    kind: ChannelKind,
    parent: Option<String>,
}

#[derive(Debug, Clone)]
struct RoleShape {
    name: String,
    position: i64,
}

/// Maps stale role and channel ids to live ones.
#[derive(Debug, Clone)]
pub struct IdentifierReconciler {
    stale_roles: HashMap<String, RoleShape>,
    stale_channels: HashMap<String, ChannelShape>,
    live_roles: Vec<LiveRole>,
    live_channels: Vec<LiveChannel>,
    live_channel_ids: HashSet<String>,
}

impl IdentifierReconciler {
    /// Indexes the snapshot's roles and channels and the live target.
    #[must_use]
    pub fn new(snapshot: &Snapshot, live_roles: Vec<LiveRole>, live_channels: Vec<LiveChannel>) -> Self {
        let stale_roles = snapshot
            .roles
            .iter()
            .map(|r| {
                (
                    r.role_id.clone(),
                    RoleShape {
                        name: r.name.clone(),
                        position: r.position,
                    },
                )
            })
            .collect();

        let mut stale_channels = HashMap::new();
        for category in &snapshot.channels.categories {
            if let Some(id) = &category.channel_id {
                stale_channels.insert(
                    id.clone(),
                    ChannelShape {
                        name: category.name.clone(),
                        kind: ChannelKind::Category,
                        parent: None,
                    },
                );
            }
        }
        for channel in snapshot.channels.channels() {
            if let Some(id) = channel.channel_id() {
                stale_channels.insert(
                    id.to_string(),
                    ChannelShape {
                        name: channel.name().to_string(),
                        kind: channel.kind(),
                        parent: channel.parent().map(str::to_string),
                    },
                );
            }
        }

        let live_channel_ids = live_channels.iter().map(|c| c.id.clone()).collect();
        Self {
            stale_roles,
            stale_channels,
            live_roles,
            live_channels,
            live_channel_ids,
        }
    }

    /// Resolves a stale role id, or `None` when unresolved.
    #[must_use]
    pub fn resolve_role(&self, stale_id: &str) -> Option<String> {
        let shape = self.stale_roles.get(stale_id)?;
        self.live_roles
            .iter()
            .find(|r| r.name == shape.name && r.position == shape.position)
            .or_else(|| self.live_roles.iter().find(|r| r.name == shape.name))
            .map(|r| r.id.clone())
    }

    /// Resolves a stale channel id, or `None` when unresolved.
    #[must_use]
    pub fn resolve_channel(&self, stale_id: &str) -> Option<String> {
        if self.live_channel_ids.contains(stale_id) {
            return Some(stale_id.to_string());
        }
        let shape = self.stale_channels.get(stale_id)?;
        self.live_channels
            .iter()
            .find(|c| {
                c.name == shape.name
                    && c.kind == shape.kind
                    && self.parent_name(c) == shape.parent.as_deref()
            })
            .map(|c| c.id.clone())
    }

    /// Resolves every id, dropping the unresolved ones.
    #[must_use]
    pub fn resolve_roles(&self, stale_ids: &[String]) -> Vec<String> {
        stale_ids.iter().filter_map(|id| self.resolve_role(id)).collect()
    }

    /// Resolves every id, dropping the unresolved ones.
    #[must_use]
    pub fn resolve_channels(&self, stale_ids: &[String]) -> Vec<String> {
        stale_ids
            .iter()
            .filter_map(|id| self.resolve_channel(id))
            .collect()
    }

    /// Builds the old-to-new map for every snapshot role that resolves.
    #[must_use]
    pub fn role_map(&self) -> HashMap<String, String> {
        self.stale_roles
            .keys()
            .filter_map(|old| self.resolve_role(old).map(|new| (old.clone(), new)))
            .collect()
    }

    fn parent_name(&self, channel: &LiveChannel) -> Option<&str> {
        let parent_id = channel.parent_id.as_deref()?;
        self.live_channels
            .iter()
            .find(|c| c.id == parent_id)
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CategoryRecord, ChannelBase, ChannelRecord, RoleRecord, SnapshotId, TextChannelRecord,
        WorkspaceSettings,
    };

    fn snapshot_role(id: &str, name: &str, position: i64) -> RoleRecord {
        RoleRecord {
            role_id: id.into(),
            name: name.into(),
            color: 0,
            hoist: false,
            permissions: "0".into(),
            mentionable: false,
            position,
            is_everyone: false,
            icon: None,
            unicode_emoji: None,
        }
    }

    fn live_role(id: &str, name: &str, position: i64) -> LiveRole {
        LiveRole {
            id: id.into(),
            name: name.into(),
            color: 0,
            hoist: false,
            position,
            permissions: 0,
            mentionable: false,
            managed: false,
            is_everyone: false,
            icon_url: None,
            unicode_emoji: None,
        }
    }

    fn live_channel(id: &str, name: &str, kind: ChannelKind, parent: Option<&str>) -> LiveChannel {
        LiveChannel {
            id: id.into(),
            name: name.into(),
            kind,
            parent_id: parent.map(str::to_string),
            position: 0,
            topic: None,
            nsfw: false,
            rate_limit_per_user: None,
            bitrate: None,
            user_limit: None,
            overwrites: Vec::new(),
            available_tags: Vec::new(),
            default_reaction: None,
        }
    }

    fn snapshot() -> Snapshot {
        let settings = WorkspaceSettings {
            name: "src".into(),
            verification_level: 0,
            explicit_content_filter: 0,
            default_message_notifications: 0,
            afk: None,
            widget: Default::default(),
            icon: None,
            splash: None,
            banner: None,
        };
        let mut snapshot = Snapshot::empty(SnapshotId::from("s"), "w", settings);
        snapshot.roles = vec![
            snapshot_role("r-mods", "mods", 3),
            snapshot_role("r-gone", "ghost", 1),
        ];
        let text = |id: &str, name: &str, parent: Option<&str>| {
            ChannelRecord::Text(TextChannelRecord {
                base: ChannelBase {
                    channel_id: Some(id.into()),
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
        snapshot.channels.categories = vec![CategoryRecord {
            channel_id: Some("c-info".into()),
            name: "Info".into(),
            position: 0,
            permissions: Vec::new(),
            children: vec![text("c-rules", "rules", Some("Info"))],
        }];
        snapshot.channels.others = vec![text("c-chat", "chat", None)];
        snapshot
    }

    #[test]
    fn role_matches_name_and_position_first() {
        let r = IdentifierReconciler::new(
            &snapshot(),
            vec![live_role("new-a", "mods", 1), live_role("new-b", "mods", 3)],
            Vec::new(),
        );
        assert_eq!(r.resolve_role("r-mods").as_deref(), Some("new-b"));
    }

    #[test]
    fn role_falls_back_to_name() {
        let r = IdentifierReconciler::new(
            &snapshot(),
            vec![live_role("new-a", "mods", 7)],
            Vec::new(),
        );
        assert_eq!(r.resolve_role("r-mods").as_deref(), Some("new-a"));
    }

    #[test]
    fn unresolved_roles_are_dropped() {
        let r = IdentifierReconciler::new(
            &snapshot(),
            vec![live_role("new-a", "mods", 3)],
            Vec::new(),
        );
        assert_eq!(r.resolve_role("r-gone"), None);
        assert_eq!(r.resolve_role("never-seen"), None);
        let resolved = r.resolve_roles(&["r-gone".into(), "r-mods".into()]);
        assert_eq!(resolved, vec!["new-a".to_string()]);
    }

    #[test]
    fn live_channel_id_short_circuits() {
        let r = IdentifierReconciler::new(
            &snapshot(),
            Vec::new(),
            vec![live_channel("c-chat", "renamed", ChannelKind::Text, None)],
        );
        assert_eq!(r.resolve_channel("c-chat").as_deref(), Some("c-chat"));
    }

    #[test]
    fn channel_matches_name_kind_and_parent() {
        let live = vec![
            live_channel("n-info", "Info", ChannelKind::Category, None),
            live_channel("n-rules-top", "rules", ChannelKind::Text, None),
            live_channel("n-rules", "rules", ChannelKind::Text, Some("n-info")),
            live_channel("n-chat-voice", "chat", ChannelKind::Voice, None),
            live_channel("n-chat", "chat", ChannelKind::Text, None),
        ];
        let r = IdentifierReconciler::new(&snapshot(), Vec::new(), live);
        assert_eq!(r.resolve_channel("c-rules").as_deref(), Some("n-rules"));
        assert_eq!(r.resolve_channel("c-chat").as_deref(), Some("n-chat"));
        assert_eq!(r.resolve_channel("c-info").as_deref(), Some("n-info"));
        assert_eq!(r.resolve_channel("c-unknown"), None);
    }
}
