//! Snapshot capture from a live workspace.
//!
//! [`SnapshotBuilder::build`] checks the minimum capability once, up front,
//! then walks the workspace section by section. Every per-entity or
//! per-section read failure is absorbed: the entity is omitted, or the
//! optional sub-collection (onboarding, scheduled events) is recorded as
//! absent. Message history is the only read that goes through the retry
//! policy.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pacing::{PacingConfig, pause};
use super::retry::{RetryExecutor, RetryPolicy};
use crate::domain::image::{MAX_INLINE_ATTACHMENT_BYTES, encode_base64, is_raster_image_url};
use crate::domain::stable::IDENTITY_AND_TIME_KEYS;
use crate::domain::{
    AfkRecord, AttachmentRecord, BanRecord, CategoryRecord, ChannelBase, ChannelKind,
    ChannelRecord, ChannelTree, CommunityLinks, EmojiRecord, ImageRecord, MemberRoleRecord,
    MessageRecord, PermissionRecord, RoleRecord, ScheduledEventRecord, Snapshot, SnapshotId,
    StableSerializer, ThreadRecord, WidgetRecord, WorkspaceSettings,
};
use crate::domain::channel::{ForumChannelRecord, StageChannelRecord, TextChannelRecord, VoiceChannelRecord};
use crate::error::BackupError;
use crate::remote::{
    AssetFetcher, Capability, LiveChannel, LiveMessage, LiveRole, MessageQuery, OverwriteKind,
    WorkspaceApi, WorkspaceFeature, WorkspaceInfo,
};

/// Upper bound on messages captured per channel or thread.
pub const MAX_MESSAGES_HARD_CAP: usize = 1000;

/// Default number of messages captured per channel or thread.
pub const DEFAULT_MAX_MESSAGES_PER_CHANNEL: usize = 10;

const MESSAGE_PAGE_SIZE: usize = 100;

/// Sections that can be left out of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Role hierarchy.
    Roles,
    /// Channel tree, threads and messages.
    Channels,
    /// Custom emoji.
    Emojis,
    /// Ban list.
    Bans,
    /// Scheduled events.
    ScheduledEvents,
}

/// How binary assets are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Keep remote URLs only.
    #[default]
    Url,
    /// Download and inline as base64 (URL kept alongside).
    Base64,
}

/// Capture parameters.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Identifier to store the snapshot under; generated when `None`.
    pub snapshot_id: Option<SnapshotId>,
    /// Messages captured per channel and per thread (capped at
    /// [`MAX_MESSAGES_HARD_CAP`]).
    pub max_messages_per_channel: usize,
    /// Sections left out.
    pub exclude: BTreeSet<Section>,
    /// Capture member role assignments.
    pub include_members: bool,
    /// Asset storage mode.
    pub image_mode: ImageMode,
    /// Retry policy for message paging.
    pub retry: RetryPolicy,
    /// Delay between message pages.
    pub pacing: PacingConfig,
    /// Write the snapshot to the store after capture.
    pub persist: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            snapshot_id: None,
            max_messages_per_channel: DEFAULT_MAX_MESSAGES_PER_CHANNEL,
            exclude: BTreeSet::new(),
            include_members: false,
            image_mode: ImageMode::Url,
            retry: RetryPolicy::default(),
            pacing: PacingConfig::default(),
            persist: true,
        }
    }
}

impl CaptureOptions {
    fn includes(&self, section: Section) -> bool {
        !self.exclude.contains(&section)
    }

    fn message_cap(&self) -> usize {
        self.max_messages_per_channel.min(MAX_MESSAGES_HARD_CAP)
    }
}

/// Result of [`SnapshotBuilder::build_if_changed`].
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// Nothing structural changed; the previous snapshot is returned as is.
    Unchanged(Arc<Snapshot>),
    /// A fresh snapshot was captured.
    Captured(Arc<Snapshot>),
}

impl CaptureOutcome {
    /// Returns the snapshot, previous or fresh.
    #[must_use]
    pub const fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            Self::Unchanged(s) | Self::Captured(s) => s,
        }
    }

    /// Returns `true` when a fresh snapshot was captured.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Captured(_))
    }
}

/// Walks a live workspace and produces a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    assets: Arc<dyn AssetFetcher>,
}

impl SnapshotBuilder {
    /// Creates a builder that downloads inlined assets through `assets`.
    #[must_use]
    pub fn new(assets: Arc<dyn AssetFetcher>) -> Self {
        Self { assets }
    }

    /// Captures the workspace behind `api`.
    ///
    /// # Errors
    ///
    /// - [`BackupError::PermissionDenied`] if the caller lacks
    ///   [`Capability::ViewWorkspace`].
    /// - Any classified error from the initial capability or workspace
    ///   read. Every later read failure is absorbed.
    pub async fn build(
        &self,
        api: &dyn WorkspaceApi,
        options: &CaptureOptions,
    ) -> Result<Snapshot, BackupError> {
        ensure_can_view(api).await?;
        let info = api.workspace().await?;
        let id = options.snapshot_id.clone().unwrap_or_default();
        tracing::info!(snapshot_id = %id, workspace_id = %info.id, "capturing workspace");

        let settings = self.settings(&info, options.image_mode).await;
        let mut snapshot = Snapshot::empty(id, info.id.clone(), settings);

        let live_roles = match api.list_roles().await {
            Ok(roles) => roles,
            Err(err) => {
                tracing::warn!(error = %err, "roles unreadable; section omitted");
                Vec::new()
            }
        };
        if options.includes(Section::Roles) {
            snapshot.roles = self.roles(&live_roles, options.image_mode).await;
        }
        if options.includes(Section::Channels) {
            snapshot.channels = self.channels(api, &live_roles, options).await;
        }
        if options.includes(Section::Emojis) {
            snapshot.emojis = self.emojis(api, options.image_mode).await;
        }
        if options.includes(Section::Bans) {
            snapshot.bans = bans(api).await;
        }
        if options.include_members {
            snapshot.members = members(api, &info.id).await;
        }
        snapshot.onboarding = match api.onboarding().await {
            Ok(onboarding) => onboarding,
            Err(err) => {
                tracing::warn!(error = %err, "onboarding unavailable; recorded as absent");
                None
            }
        };
        if options.includes(Section::ScheduledEvents) {
            snapshot.scheduled_events = self.scheduled_events(api, options.image_mode).await;
        }
        snapshot.community = community_links(&info);

        tracing::info!(
            snapshot_id = %snapshot.id,
            roles = snapshot.roles.len(),
            channels = snapshot.channels.channels().count(),
            emojis = snapshot.emojis.len(),
            bans = snapshot.bans.len(),
            "capture complete"
        );
        Ok(snapshot)
    }

    /// Returns `previous` unchanged when configuration, roles, emoji and
    /// bans match the live workspace (identifiers, timestamps and inlined
    /// binaries ignored); otherwise captures afresh. The comparison issues
    /// no channel, thread or message reads.
    ///
    /// Only those four sections are compared. Edits confined to channels,
    /// messages, member roles, scheduled events or onboarding are not
    /// detected and yield [`CaptureOutcome::Unchanged`] with the stale
    /// `previous`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build`].
    pub async fn build_if_changed(
        &self,
        api: &dyn WorkspaceApi,
        options: &CaptureOptions,
        previous: Arc<Snapshot>,
    ) -> Result<CaptureOutcome, BackupError> {
        ensure_can_view(api).await?;
        let info = api.workspace().await?;
        let stable = StableSerializer::excluding(&IDENTITY_AND_TIME_KEYS);

        let settings = self.settings(&info, ImageMode::Url).await;
        let mut unchanged = stable.equal(&settings, &previous.settings);

        if unchanged && options.includes(Section::Roles) {
            let live = api.list_roles().await?;
            let roles = self.roles(&live, ImageMode::Url).await;
            unchanged = stable.equal(&roles, &previous.roles);
        }
        if unchanged && options.includes(Section::Emojis) {
            let emojis = self.emojis(api, ImageMode::Url).await;
            unchanged = stable.equal(&emojis, &previous.emojis);
        }
        if unchanged && options.includes(Section::Bans) {
            unchanged = stable.equal(&bans(api).await, &previous.bans);
        }

        if unchanged {
            tracing::debug!(snapshot_id = %previous.id, "workspace unchanged since last capture");
            return Ok(CaptureOutcome::Unchanged(previous));
        }
        let snapshot = self.build(api, options).await?;
        Ok(CaptureOutcome::Captured(Arc::new(snapshot)))
    }

    async fn settings(&self, info: &WorkspaceInfo, mode: ImageMode) -> WorkspaceSettings {
        WorkspaceSettings {
            name: info.name.clone(),
            verification_level: info.verification_level,
            explicit_content_filter: info.explicit_content_filter,
            default_message_notifications: info.default_message_notifications,
            afk: info.afk_channel.as_ref().map(|c| AfkRecord {
                channel_name: c.name.clone(),
                timeout_secs: info.afk_timeout_secs,
            }),
            widget: WidgetRecord {
                enabled: info.widget_enabled,
                channel_name: info.widget_channel.as_ref().map(|c| c.name.clone()),
            },
            icon: self.image(info.icon_url.as_deref(), mode).await,
            splash: self.image(info.splash_url.as_deref(), mode).await,
            banner: self.image(info.banner_url.as_deref(), mode).await,
        }
    }

    async fn image(&self, url: Option<&str>, mode: ImageMode) -> Option<ImageRecord> {
        let url = url?;
        let mut record = ImageRecord::url(url);
        if mode == ImageMode::Base64 {
            match self.assets.fetch(url).await {
                Ok(bytes) => record.base64 = Some(encode_base64(&bytes)),
                Err(err) => tracing::warn!(url, error = %err, "asset not inlined"),
            }
        }
        Some(record)
    }

    async fn roles(&self, live: &[LiveRole], mode: ImageMode) -> Vec<RoleRecord> {
        let mut sorted: Vec<&LiveRole> = live.iter().filter(|r| !r.managed).collect();
        sorted.sort_by(|a, b| b.position.cmp(&a.position));
        let mut records = Vec::with_capacity(sorted.len());
        for role in sorted {
            records.push(RoleRecord {
                role_id: role.id.clone(),
                name: role.name.clone(),
                color: role.color,
                hoist: role.hoist,
                permissions: role.permissions.to_string(),
                mentionable: role.mentionable,
                position: role.position,
                is_everyone: role.is_everyone,
                icon: self.image(role.icon_url.as_deref(), mode).await,
                unicode_emoji: role.unicode_emoji.clone(),
            });
        }
        records
    }

    async fn channels(
        &self,
        api: &dyn WorkspaceApi,
        live_roles: &[LiveRole],
        options: &CaptureOptions,
    ) -> ChannelTree {
        let mut live = match api.list_channels().await {
            Ok(channels) => channels,
            Err(err) => {
                tracing::warn!(error = %err, "channels unreadable; section omitted");
                return ChannelTree::default();
            }
        };
        live.sort_by_key(|c| c.position);
        let role_names: HashMap<&str, &str> = live_roles
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str()))
            .collect();
        let category_names: HashMap<&str, &str> = live
            .iter()
            .filter(|c| c.kind == ChannelKind::Category)
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();

        let mut tree = ChannelTree::default();
        for category in live.iter().filter(|c| c.kind == ChannelKind::Category) {
            let mut children = Vec::new();
            for child in live
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(category.id.as_str()))
            {
                if let Some(record) = self
                    .channel(api, child, Some(&category.name), &role_names, options)
                    .await
                {
                    children.push(record);
                }
            }
            tree.categories.push(CategoryRecord {
                channel_id: Some(category.id.clone()),
                name: category.name.clone(),
                position: category.position,
                permissions: permissions(category, &role_names),
                children,
            });
        }
        for channel in live.iter().filter(|c| {
            c.kind != ChannelKind::Category
                && c
                    .parent_id
                    .as_deref()
                    .is_none_or(|p| !category_names.contains_key(p))
        }) {
            if let Some(record) = self
                .channel(api, channel, None, &role_names, options)
                .await
            {
                tree.others.push(record);
            }
        }
        tree
    }

    async fn channel(
        &self,
        api: &dyn WorkspaceApi,
        channel: &LiveChannel,
        parent: Option<&str>,
        role_names: &HashMap<&str, &str>,
        options: &CaptureOptions,
    ) -> Option<ChannelRecord> {
        let base = ChannelBase {
            channel_id: Some(channel.id.clone()),
            name: channel.name.clone(),
            parent: parent.map(str::to_string),
            position: channel.position,
            permissions: permissions(channel, role_names),
        };
        let record = match channel.kind {
            ChannelKind::Text | ChannelKind::Announcement => {
                let text = TextChannelRecord {
                    base,
                    topic: channel.topic.clone(),
                    nsfw: channel.nsfw,
                    rate_limit_per_user: channel.rate_limit_per_user,
                    messages: self.messages(api, &channel.id, options).await,
                    threads: self.threads(api, &channel.id, options).await,
                };
                if channel.kind == ChannelKind::Text {
                    ChannelRecord::Text(text)
                } else {
                    ChannelRecord::Announcement(text)
                }
            }
            ChannelKind::Voice => ChannelRecord::Voice(VoiceChannelRecord {
                base,
                bitrate: channel.bitrate.unwrap_or(64_000),
                user_limit: channel.user_limit.unwrap_or(0),
            }),
            ChannelKind::Stage => ChannelRecord::Stage(StageChannelRecord {
                base,
                bitrate: channel.bitrate.unwrap_or(64_000),
                user_limit: channel.user_limit.unwrap_or(0),
                topic: channel.topic.clone(),
            }),
            ChannelKind::Forum => ChannelRecord::Forum(ForumChannelRecord {
                base,
                topic: channel.topic.clone(),
                nsfw: channel.nsfw,
                rate_limit_per_user: channel.rate_limit_per_user,
                available_tags: channel.available_tags.clone(),
                default_reaction: channel.default_reaction.clone(),
                threads: self.threads(api, &channel.id, options).await,
            }),
            ChannelKind::Category
            | ChannelKind::PublicThread
            | ChannelKind::PrivateThread
            | ChannelKind::AnnouncementThread => {
                tracing::debug!(channel_id = %channel.id, kind = channel.kind.as_str(), "not a leaf channel; skipped");
                return None;
            }
        };
        Some(record)
    }

    async fn threads(
        &self,
        api: &dyn WorkspaceApi,
        channel_id: &str,
        options: &CaptureOptions,
    ) -> Vec<ThreadRecord> {
        let live = match api.list_threads(channel_id).await {
            Ok(threads) => threads,
            Err(err) => {
                tracing::warn!(channel_id, error = %err, "threads unreadable; omitted");
                return Vec::new();
            }
        };
        let mut records = Vec::with_capacity(live.len());
        for thread in live {
            records.push(ThreadRecord {
                messages: self.messages(api, &thread.id, options).await,
                name: thread.name,
                archived: thread.archived,
                locked: thread.locked,
                auto_archive_minutes: thread.auto_archive_minutes,
                rate_limit_per_user: thread.rate_limit_per_user,
            });
        }
        records
    }

    /// Pages backward through history, newest first, stopping at the cap,
    /// an empty page, or the first system (unauthored) message.
    async fn messages(
        &self,
        api: &dyn WorkspaceApi,
        channel_id: &str,
        options: &CaptureOptions,
    ) -> Vec<MessageRecord> {
        let cap = options.message_cap();
        let retry = RetryExecutor::new(options.retry);
        let mut records = Vec::new();
        let mut before: Option<String> = None;

        'paging: while records.len() < cap {
            let limit = (cap - records.len()).min(MESSAGE_PAGE_SIZE);
            let page = retry
                .run("fetch_messages", || {
                    api.fetch_messages(
                        channel_id,
                        MessageQuery {
                            limit,
                            before: before.clone(),
                        },
                    )
                })
                .await;
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(channel_id, error = %err, "history read failed; keeping partial");
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            for message in page {
                before = Some(message.id.clone());
                let Some(record) = self.message(message, options.image_mode).await else {
                    break 'paging;
                };
                records.push(record);
                if records.len() >= cap {
                    break 'paging;
                }
            }
            pause(options.pacing.message_page).await;
        }
        records
    }

    async fn message(&self, message: LiveMessage, mode: ImageMode) -> Option<MessageRecord> {
        let author = message.author?;
        let mut files = Vec::with_capacity(message.attachments.len());
        for attachment in message.attachments {
            let base64 = if mode == ImageMode::Base64 && is_raster_image_url(&attachment.url) {
                self.inline_attachment(&attachment.url).await
            } else {
                None
            };
            files.push(AttachmentRecord {
                name: attachment.name,
                url: attachment.url,
                base64,
            });
        }
        Some(MessageRecord {
            username: author.username,
            avatar_url: author.avatar_url,
            content: message.content,
            embeds: message.embeds,
            files,
            pinned: message.pinned,
            sent_at: message.created_at,
        })
    }

    async fn inline_attachment(&self, url: &str) -> Option<String> {
        match self.assets.fetch(url).await {
            Ok(bytes) if bytes.len() <= MAX_INLINE_ATTACHMENT_BYTES => Some(encode_base64(&bytes)),
            Ok(bytes) => {
                tracing::debug!(url, size = bytes.len(), "attachment too large to inline");
                None
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "attachment not inlined");
                None
            }
        }
    }

    async fn emojis(&self, api: &dyn WorkspaceApi, mode: ImageMode) -> Vec<EmojiRecord> {
        let live = match api.list_emojis().await {
            Ok(emojis) => emojis,
            Err(err) => {
                tracing::warn!(error = %err, "emoji unreadable; section omitted");
                return Vec::new();
            }
        };
        let mut records = Vec::with_capacity(live.len());
        for emoji in live {
            let base64 = self
                .image(Some(&emoji.url), mode)
                .await
                .and_then(|image| image.base64);
            records.push(EmojiRecord {
                id: Some(emoji.id),
                name: emoji.name,
                url: emoji.url,
                base64,
            });
        }
        records
    }

    async fn scheduled_events(
        &self,
        api: &dyn WorkspaceApi,
        mode: ImageMode,
    ) -> Option<Vec<ScheduledEventRecord>> {
        let live = match api.list_scheduled_events().await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "scheduled events unavailable; recorded as absent");
                return None;
            }
        };
        let mut records = Vec::with_capacity(live.len());
        for event in live {
            records.push(ScheduledEventRecord {
                image: self.image(event.image_url.as_deref(), mode).await,
                id: Some(event.id),
                name: event.name,
                description: event.description,
                start: event.start,
                end: event.end,
                privacy_level: event.privacy_level,
                entity_type: event.entity_type,
                channel_id: event.channel_id,
                location: event.location,
                recurrence_rule: event.recurrence_rule,
            });
        }
        Some(records)
    }
}

async fn ensure_can_view(api: &dyn WorkspaceApi) -> Result<(), BackupError> {
    if api.has_capability(Capability::ViewWorkspace).await? {
        Ok(())
    } else {
        Err(BackupError::PermissionDenied(
            "view access to the workspace is required".to_string(),
        ))
    }
}

async fn bans(api: &dyn WorkspaceApi) -> Vec<BanRecord> {
    match api.list_bans().await {
        Ok(bans) => bans
            .into_iter()
            .map(|b| BanRecord {
                user_id: b.user_id,
                reason: b.reason,
            })
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "bans unreadable; section omitted");
            Vec::new()
        }
    }
}

async fn members(api: &dyn WorkspaceApi, everyone_id: &str) -> Vec<MemberRoleRecord> {
    match api.list_members().await {
        Ok(members) => members
            .into_iter()
            .map(|m| MemberRoleRecord {
                user_id: m.user_id,
                username: Some(m.username),
                roles: m.role_ids.into_iter().filter(|r| r != everyone_id).collect(),
            })
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "members unreadable; section omitted");
            Vec::new()
        }
    }
}

fn permissions(channel: &LiveChannel, role_names: &HashMap<&str, &str>) -> Vec<PermissionRecord> {
    channel
        .overwrites
        .iter()
        .filter(|o| o.kind == OverwriteKind::Role)
        .filter_map(|o| {
            role_names.get(o.id.as_str()).map(|name| PermissionRecord {
                role_name: (*name).to_string(),
                allow: o.allow.to_string(),
                deny: o.deny.to_string(),
            })
        })
        .collect()
}

fn community_links(info: &WorkspaceInfo) -> Option<CommunityLinks> {
    if !info.has_feature(WorkspaceFeature::Community)
        && info.rules_channel.is_none()
        && info.public_updates_channel.is_none()
    {
        return None;
    }
    Some(CommunityLinks {
        rules_channel_id: info.rules_channel.as_ref().map(|c| c.id.clone()),
        rules_channel_name: info.rules_channel.as_ref().map(|c| c.name.clone()),
        public_updates_channel_id: info.public_updates_channel.as_ref().map(|c| c.id.clone()),
        public_updates_channel_name: info
            .public_updates_channel
            .as_ref()
            .map(|c| c.name.clone()),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::remote::{
        ChannelSpec, InMemoryWorkspace, Op, Overwrite, RemoteError, RoleSpec, ThreadSpec,
    };

    fn options() -> CaptureOptions {
        CaptureOptions {
            pacing: PacingConfig::immediate(),
            ..CaptureOptions::default()
        }
    }

    fn role(name: &str) -> RoleSpec {
        RoleSpec {
            name: name.into(),
            color: 0x00ff00,
            hoist: true,
            permissions: 8,
            mentionable: false,
            icon: None,
            unicode_emoji: None,
        }
    }

    async fn seeded() -> Arc<InMemoryWorkspace> {
        let ws = Arc::new(InMemoryWorkspace::new("900", "Guild"));
        let Ok(mods) = ws.create_role(role("mods")).await else {
            panic!("role");
        };
        let _ = ws.add_managed_role("bot").await;
        let Ok(cat) = ws
            .create_channel(ChannelSpec::new("Info", ChannelKind::Category))
            .await
        else {
            panic!("category");
        };
        let Ok(chat) = ws
            .create_channel(ChannelSpec {
                parent_id: Some(cat.id.clone()),
                topic: Some("talk".into()),
                ..ChannelSpec::new("chat", ChannelKind::Text)
            })
            .await
        else {
            panic!("channel");
        };
        let _ = ws
            .set_overwrites(
                &chat.id,
                vec![Overwrite {
                    id: mods.id.clone(),
                    kind: OverwriteKind::Role,
                    allow: 1024,
                    deny: 0,
                }],
            )
            .await;
        let _ = ws
            .create_channel(ChannelSpec {
                bitrate: Some(64_000),
                ..ChannelSpec::new("lounge", ChannelKind::Voice)
            })
            .await;
        ws
    }

    fn builder(ws: &Arc<InMemoryWorkspace>) -> SnapshotBuilder {
        SnapshotBuilder::new(Arc::clone(ws) as Arc<dyn AssetFetcher>)
    }

    #[tokio::test]
    async fn captures_tree_and_skips_managed_roles() {
        let ws = seeded().await;
        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        let names: Vec<&str> = snapshot.roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["mods", "@everyone"]);
        assert_eq!(snapshot.channels.categories.len(), 1);
        let Some(category) = snapshot.channels.categories.first() else {
            panic!("no category");
        };
        let Some(ChannelRecord::Text(chat)) = category.children.first() else {
            panic!("expected text child");
        };
        assert_eq!(chat.base.parent.as_deref(), Some("Info"));
        assert_eq!(chat.base.permissions.len(), 1);
        assert_eq!(
            chat.base.permissions.first().map(|p| p.role_name.as_str()),
            Some("mods")
        );
        assert!(matches!(
            snapshot.channels.others.first(),
            Some(ChannelRecord::Voice(_))
        ));
    }

    #[tokio::test]
    async fn missing_view_capability_fails_up_front() {
        let ws = seeded().await;
        ws.set_capability(Capability::ViewWorkspace, false).await;
        ws.clear_calls().await;
        let result = builder(&ws).build(ws.as_ref(), &options()).await;
        assert!(matches!(result, Err(BackupError::PermissionDenied(_))));
        assert_eq!(ws.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn optional_sub_collections_are_absorbed() {
        let ws = seeded().await;
        ws.fail_next(Op::Onboarding, RemoteError::Unknown("500".into()))
            .await;
        ws.fail_next(Op::ListScheduledEvents, RemoteError::PermissionDenied("no".into()))
            .await;
        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        assert!(snapshot.onboarding.is_none());
        assert!(snapshot.scheduled_events.is_none());
    }

    #[tokio::test]
    async fn history_stops_at_cap_and_system_messages() {
        let ws = seeded().await;
        let Ok(channels) = ws.list_channels().await else {
            panic!("list");
        };
        let Some(chat) = channels.iter().find(|c| c.name == "chat") else {
            panic!("chat missing");
        };
        let _ = ws.post_message(&chat.id, Some("old"), "before boundary").await;
        let _ = ws.post_message(&chat.id, None, "user joined").await;
        for i in 0..15 {
            let _ = ws.post_message(&chat.id, Some("ann"), &format!("m{i}")).await;
        }

        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        let Some(ChannelRecord::Text(text)) = snapshot.channels.channels().find(|c| c.name() == "chat") else {
            panic!("chat not captured");
        };
        assert_eq!(text.messages.len(), 10);
        assert_eq!(text.messages.first().map(|m| m.content.as_str()), Some("m14"));

        let wide = CaptureOptions {
            max_messages_per_channel: 50,
            ..options()
        };
        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &wide).await else {
            panic!("build failed");
        };
        let Some(ChannelRecord::Text(text)) = snapshot.channels.channels().find(|c| c.name() == "chat") else {
            panic!("chat not captured");
        };
        assert_eq!(text.messages.len(), 15);
    }

    #[tokio::test]
    async fn base64_mode_inlines_raster_attachments() {
        let ws = seeded().await;
        ws.update_info(|i| i.icon_url = Some("https://cdn/icon.png".into()))
            .await;
        ws.put_asset("https://cdn/icon.png", vec![1, 2, 3]).await;
        let inline = CaptureOptions {
            image_mode: ImageMode::Base64,
            ..options()
        };
        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &inline).await else {
            panic!("build failed");
        };
        let Some(icon) = snapshot.settings.icon else {
            panic!("icon missing");
        };
        assert_eq!(icon.base64.as_deref(), Some("AQID"));
    }

    #[tokio::test]
    async fn forum_threads_are_captured_with_history() {
        let ws = seeded().await;
        let Ok(forum) = ws
            .create_channel(ChannelSpec::new("help", ChannelKind::Forum))
            .await
        else {
            panic!("forum");
        };
        let Ok(thread) = ws
            .create_thread(
                &forum.id,
                ThreadSpec {
                    name: "how to".into(),
                    auto_archive_minutes: 1440,
                    starter_message: Some("question".into()),
                },
            )
            .await
        else {
            panic!("thread");
        };
        let _ = ws.post_message(&thread.id, Some("helper"), "answer").await;
        let Ok(snapshot) = builder(&ws).build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        let Some(ChannelRecord::Forum(help)) = snapshot.channels.channels().find(|c| c.name() == "help") else {
            panic!("forum not captured");
        };
        let Some(captured) = help.threads.first() else {
            panic!("thread not captured");
        };
        let contents: Vec<&str> = captured.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["answer", "question"]);
    }

    #[tokio::test]
    async fn unchanged_workspace_reuses_previous_without_channel_traffic() {
        let ws = seeded().await;
        let b = builder(&ws);
        let Ok(first) = b.build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        let previous = Arc::new(first);
        ws.clear_calls().await;

        let Ok(outcome) = b
            .build_if_changed(ws.as_ref(), &options(), Arc::clone(&previous))
            .await
        else {
            panic!("compare failed");
        };
        assert!(!outcome.is_changed());
        assert!(Arc::ptr_eq(outcome.snapshot(), &previous));
        assert!(!ws.calls().await.iter().any(|c| c.op.is_channel_traffic()));

        let _ = ws.create_role(role("helpers")).await;
        let Ok(outcome) = b
            .build_if_changed(ws.as_ref(), &options(), Arc::clone(&previous))
            .await
        else {
            panic!("compare failed");
        };
        assert!(outcome.is_changed());
    }

    #[tokio::test]
    async fn channel_only_edits_are_not_detected() {
        let ws = seeded().await;
        let b = builder(&ws);
        let Ok(first) = b.build(ws.as_ref(), &options()).await else {
            panic!("build failed");
        };
        let previous = Arc::new(first);

        let _ = ws
            .create_channel(ChannelSpec::new("announcements", ChannelKind::Text))
            .await;
        let Ok(outcome) = b
            .build_if_changed(ws.as_ref(), &options(), Arc::clone(&previous))
            .await
        else {
            panic!("compare failed");
        };
        assert!(!outcome.is_changed());
        assert!(
            !outcome
                .snapshot()
                .channels
                .channels()
                .any(|c| c.name() == "announcements")
        );
    }
}
