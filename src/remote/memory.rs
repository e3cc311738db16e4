//! In-memory simulated workspace.
//!
//! [`InMemoryWorkspace`] implements [`WorkspaceApi`] and [`AssetFetcher`]
//! against plain collections behind a single [`tokio::sync::Mutex`]. It
//! enforces the platform rules the engine has to cope with (name limits,
//! premium-tier caps, feature-gated channel kinds, undeletable community
//! channels, reference validation on onboarding and events), records every
//! call with its timestamp, and lets callers queue failures per operation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::types::{
    Capability, ChannelRef, ChannelSpec, LiveAttachment, LiveBan, LiveChannel, LiveEmoji,
    LiveMember, LiveMessage, LiveRole, LiveScheduledEvent, LiveThread, MessageAuthor,
    MessageQuery, Overwrite, OverwriteKind, RelayHandle, RelayMessage, RoleSpec,
    ScheduledEventSpec, ThreadSpec, WorkspaceEdit, WorkspaceFeature, WorkspaceInfo,
};
use super::{AssetFetcher, RemoteError, RemoteResult, WorkspaceApi};
use crate::domain::message::{
    MAX_EMBEDS_PER_MESSAGE, MAX_FILES_PER_MESSAGE, MAX_MESSAGE_CONTENT_LEN,
};
use crate::domain::role::MAX_ROLE_NAME_LEN;
use crate::domain::roster::MAX_EMOJI_NAME_LEN;
use crate::domain::{ChannelKind, ImageData, OnboardingRecord};

/// Permission bits granted to the implicit role of a fresh workspace.
pub const DEFAULT_EVERYONE_PERMISSIONS: u64 = 104_324_673;

/// Display name of the account that posts forum starter messages.
pub const SYSTEM_AUTHOR: &str = "workspace-vault";

/// Generated ids are unique across every simulated workspace in the
/// process, so a source id never names an unrelated target entity.
static NEXT_GENERATED_ID: AtomicU64 = AtomicU64::new(1000);

/// Remote operations, used for the call log and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Op {
    Workspace,
    HasCapability,
    ListRoles,
    ListChannels,
    ListThreads,
    FetchMessages,
    ListEmojis,
    ListBans,
    ListMembers,
    FetchMember,
    Onboarding,
    ListScheduledEvents,
    ListRelays,
    EditWorkspace,
    CreateRole,
    EditRole,
    DeleteRole,
    CreateChannel,
    EditChannel,
    DeleteChannel,
    SetOverwrites,
    SetChannelPosition,
    CreateThread,
    CreateRelay,
    DeleteRelay,
    RelaySend,
    PinMessage,
    CreateEmoji,
    DeleteEmoji,
    Ban,
    Unban,
    SetMemberRoles,
    EditOnboarding,
    CreateScheduledEvent,
    FetchAsset,
}

impl Op {
    /// Returns `true` for operations that touch channels, threads or
    /// messages.
    #[must_use]
    pub const fn is_channel_traffic(self) -> bool {
        matches!(
            self,
            Self::ListChannels
                | Self::ListThreads
                | Self::FetchMessages
                | Self::CreateChannel
                | Self::EditChannel
                | Self::DeleteChannel
                | Self::CreateThread
                | Self::RelaySend
                | Self::PinMessage
        )
    }
}

/// One logged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// Operation invoked.
    pub op: Op,
    /// Clock reading when the call was made.
    pub at: Instant,
}

#[derive(Debug)]
struct State {
    info: WorkspaceInfo,
    capabilities: HashSet<Capability>,
    roles: Vec<LiveRole>,
    channels: Vec<LiveChannel>,
    threads: Vec<LiveThread>,
    messages: HashMap<String, Vec<LiveMessage>>,
    emojis: Vec<LiveEmoji>,
    bans: Vec<LiveBan>,
    members: Vec<LiveMember>,
    onboarding: Option<OnboardingRecord>,
    events: Vec<LiveScheduledEvent>,
    relays: Vec<RelayHandle>,
    assets: HashMap<String, Vec<u8>>,
    system_channel_flags: u32,
    calls: Vec<CallRecord>,
    failures: HashMap<Op, VecDeque<RemoteError>>,
}

/// A simulated workspace.
#[derive(Debug)]
pub struct InMemoryWorkspace {
    state: Mutex<State>,
}

impl InMemoryWorkspace {
    /// Creates a workspace holding only its implicit role, with every
    /// capability granted and no premium tier.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let everyone = LiveRole {
            id: id.clone(),
            name: "@everyone".to_string(),
            color: 0,
            hoist: false,
            position: 0,
            permissions: DEFAULT_EVERYONE_PERMISSIONS,
            mentionable: false,
            managed: false,
            is_everyone: true,
            icon_url: None,
            unicode_emoji: None,
        };
        let info = WorkspaceInfo {
            id,
            name: name.into(),
            verification_level: 0,
            explicit_content_filter: 0,
            default_message_notifications: 0,
            afk_channel: None,
            afk_timeout_secs: 300,
            widget_enabled: false,
            widget_channel: None,
            icon_url: None,
            splash_url: None,
            banner_url: None,
            premium_tier: super::PremiumTier::None,
            features: Vec::new(),
            rules_channel: None,
            public_updates_channel: None,
            system_channel_id: None,
        };
        let capabilities = [
            Capability::ViewWorkspace,
            Capability::ReadMessageHistory,
            Capability::ManageWorkspace,
        ]
        .into_iter()
        .collect();
        Self {
            state: Mutex::new(State {
                info,
                capabilities,
                roles: vec![everyone],
                channels: Vec::new(),
                threads: Vec::new(),
                messages: HashMap::new(),
                emojis: Vec::new(),
                bans: Vec::new(),
                members: Vec::new(),
                onboarding: None,
                events: Vec::new(),
                relays: Vec::new(),
                assets: HashMap::new(),
                system_channel_flags: 0,
                calls: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    /// Mutates workspace-level state directly (tier, features, community
    /// channels).
    pub async fn update_info(&self, f: impl FnOnce(&mut WorkspaceInfo) + Send) {
        let mut s = self.state.lock().await;
        f(&mut s.info);
    }

    /// Grants or revokes a capability.
    pub async fn set_capability(&self, capability: Capability, granted: bool) {
        let mut s = self.state.lock().await;
        if granted {
            s.capabilities.insert(capability);
        } else {
            s.capabilities.remove(&capability);
        }
    }

    /// Adds an integration-owned role.
    pub async fn add_managed_role(&self, name: &str) -> LiveRole {
        self.state
            .lock()
            .await
            .insert_role(name, 0, 0, false, false, None, None, true)
    }

    /// Adds a member holding no roles.
    pub async fn add_member(&self, user_id: &str, username: &str) -> LiveMember {
        let mut s = self.state.lock().await;
        let member = LiveMember {
            user_id: user_id.to_string(),
            username: username.to_string(),
            role_ids: Vec::new(),
        };
        s.members.retain(|m| m.user_id != user_id);
        s.members.push(member.clone());
        member
    }

    /// Posts a message as `author`; `None` posts a system message.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the channel or thread is absent.
    pub async fn post_message(
        &self,
        channel_id: &str,
        author: Option<&str>,
        content: &str,
    ) -> RemoteResult<LiveMessage> {
        let mut s = self.state.lock().await;
        if !s.has_message_target(channel_id) {
            return Err(RemoteError::NotFound(format!("channel {channel_id}")));
        }
        let message = LiveMessage {
            id: s.next_id(),
            author: author.map(|name| MessageAuthor {
                username: name.to_string(),
                avatar_url: None,
            }),
            content: content.to_string(),
            embeds: Vec::new(),
            attachments: Vec::new(),
            pinned: false,
            created_at: Utc::now(),
        };
        s.messages
            .entry(channel_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Registers downloadable bytes behind `url`.
    pub async fn put_asset(&self, url: &str, bytes: Vec<u8>) {
        let mut s = self.state.lock().await;
        s.assets.insert(url.to_string(), bytes);
    }

    /// Queues a failure returned by the next call to `op`.
    pub async fn fail_next(&self, op: Op, error: RemoteError) {
        let mut s = self.state.lock().await;
        s.failures.entry(op).or_default().push_back(error);
    }

    /// Returns the call log.
    pub async fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().await.calls.clone()
    }

    /// Returns how many times `op` was called.
    pub async fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    /// Empties the call log.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Returns the messages of a channel or thread, oldest first.
    pub async fn messages_in(&self, channel_id: &str) -> Vec<LiveMessage> {
        self.state
            .lock()
            .await
            .messages
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the current system-channel suppression flags.
    pub async fn system_channel_flags(&self) -> u32 {
        self.state.lock().await.system_channel_flags
    }
}

impl State {
    fn enter(&mut self, op: Op) -> RemoteResult<()> {
        self.calls.push(CallRecord {
            op,
            at: Instant::now(),
        });
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> String {
        (NEXT_GENERATED_ID.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    fn has_feature(&self, feature: WorkspaceFeature) -> bool {
        self.info.has_feature(feature)
    }

    fn channel(&self, id: &str) -> Option<&LiveChannel> {
        self.channels.iter().find(|c| c.id == id)
    }

    fn role(&self, id: &str) -> Option<&LiveRole> {
        self.roles.iter().find(|r| r.id == id)
    }

    fn has_message_target(&self, id: &str) -> bool {
        self.channel(id)
            .is_some_and(|c| c.kind.is_text_capable() || c.kind == ChannelKind::Forum)
            || self.threads.iter().any(|t| t.id == id)
    }

    fn store_asset(&mut self, data: ImageData) -> String {
        match data {
            ImageData::Url(url) => url,
            ImageData::Bytes(bytes) => {
                let url = format!("memory://assets/{}", self.next_id());
                self.assets.insert(url.clone(), bytes);
                url
            }
        }
    }

    fn channel_ref(&self, id: Option<&str>) -> RemoteResult<Option<ChannelRef>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let channel = self
            .channel(id)
            .ok_or_else(|| RemoteError::Validation(format!("unknown channel {id}")))?;
        Ok(Some(ChannelRef {
            id: channel.id.clone(),
            name: channel.name.clone(),
        }))
    }

    fn refresh(&self, reference: Option<&ChannelRef>) -> Option<ChannelRef> {
        reference.and_then(|r| {
            self.channel(&r.id).map(|c| ChannelRef {
                id: c.id.clone(),
                name: c.name.clone(),
            })
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_role(
        &mut self,
        name: &str,
        color: u32,
        permissions: u64,
        hoist: bool,
        mentionable: bool,
        icon_url: Option<String>,
        unicode_emoji: Option<String>,
        managed: bool,
    ) -> LiveRole {
        for role in self.roles.iter_mut().filter(|r| !r.is_everyone) {
            role.position += 1;
        }
        let role = LiveRole {
            id: self.next_id(),
            name: name.to_string(),
            color,
            hoist,
            position: 1,
            permissions,
            mentionable,
            managed,
            is_everyone: false,
            icon_url,
            unicode_emoji,
        };
        self.roles.push(role.clone());
        role
    }

    fn validate_channel_spec(&self, spec: &ChannelSpec) -> RemoteResult<()> {
        if spec.name.trim().is_empty() || spec.name.chars().count() > 100 {
            return Err(RemoteError::Validation("channel name length".to_string()));
        }
        match spec.kind {
            kind if kind.is_thread() => {
                return Err(RemoteError::Validation(
                    "threads are created with create_thread".to_string(),
                ));
            }
            ChannelKind::Announcement if !self.has_feature(WorkspaceFeature::News) => {
                return Err(RemoteError::Validation(
                    "announcement channels need the news feature".to_string(),
                ));
            }
            ChannelKind::Stage if !self.has_feature(WorkspaceFeature::Community) => {
                return Err(RemoteError::Validation(
                    "stage channels need the community feature".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(bitrate) = spec.bitrate {
            let max = self.info.premium_tier.max_bitrate();
            if !(8_000..=max).contains(&bitrate) {
                return Err(RemoteError::Validation(format!(
                    "bitrate {bitrate} outside 8000..={max}"
                )));
            }
        }
        if let Some(parent) = spec.parent_id.as_deref() {
            if spec.kind == ChannelKind::Category {
                return Err(RemoteError::Validation(
                    "categories cannot be nested".to_string(),
                ));
            }
            if !self
                .channel(parent)
                .is_some_and(|c| c.kind == ChannelKind::Category)
            {
                return Err(RemoteError::Validation(format!("unknown category {parent}")));
            }
        }
        Ok(())
    }

    fn validate_overwrites(&self, overwrites: &[Overwrite]) -> RemoteResult<()> {
        for overwrite in overwrites {
            if overwrite.kind == OverwriteKind::Role && self.role(&overwrite.id).is_none() {
                return Err(RemoteError::Validation(format!(
                    "unknown role {}",
                    overwrite.id
                )));
            }
        }
        Ok(())
    }

    fn is_community_channel(&self, id: &str) -> bool {
        self.has_feature(WorkspaceFeature::Community)
            && [&self.info.rules_channel, &self.info.public_updates_channel]
                .into_iter()
                .flatten()
                .any(|r| r.id == id)
    }
}

fn apply_channel_spec(channel: &mut LiveChannel, spec: ChannelSpec) {
    channel.name = spec.name;
    channel.parent_id = spec.parent_id;
    channel.topic = spec.topic;
    channel.nsfw = spec.nsfw;
    channel.rate_limit_per_user = spec.rate_limit_per_user;
    channel.bitrate = spec.bitrate;
    channel.user_limit = spec.user_limit;
    channel.available_tags = spec.available_tags;
    channel.default_reaction = spec.default_reaction;
}

#[async_trait]
impl WorkspaceApi for InMemoryWorkspace {
    async fn workspace(&self) -> RemoteResult<WorkspaceInfo> {
        let mut s = self.state.lock().await;
        s.enter(Op::Workspace)?;
        let mut info = s.info.clone();
        info.afk_channel = s.refresh(info.afk_channel.as_ref());
        info.widget_channel = s.refresh(info.widget_channel.as_ref());
        info.rules_channel = s.refresh(info.rules_channel.as_ref());
        info.public_updates_channel = s.refresh(info.public_updates_channel.as_ref());
        Ok(info)
    }

    async fn has_capability(&self, capability: Capability) -> RemoteResult<bool> {
        let mut s = self.state.lock().await;
        s.enter(Op::HasCapability)?;
        Ok(s.capabilities.contains(&capability))
    }

    async fn list_roles(&self) -> RemoteResult<Vec<LiveRole>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListRoles)?;
        Ok(s.roles.clone())
    }

    async fn list_channels(&self) -> RemoteResult<Vec<LiveChannel>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListChannels)?;
        Ok(s.channels.clone())
    }

    async fn list_threads(&self, channel_id: &str) -> RemoteResult<Vec<LiveThread>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListThreads)?;
        if s.channel(channel_id).is_none() {
            return Err(RemoteError::NotFound(format!("channel {channel_id}")));
        }
        Ok(s.threads
            .iter()
            .filter(|t| t.parent_id == channel_id)
            .cloned()
            .collect())
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        query: MessageQuery,
    ) -> RemoteResult<Vec<LiveMessage>> {
        let mut s = self.state.lock().await;
        s.enter(Op::FetchMessages)?;
        if !s.has_message_target(channel_id) {
            return Err(RemoteError::NotFound(format!("channel {channel_id}")));
        }
        let before = query.before.as_deref().and_then(|b| b.parse::<u64>().ok());
        let page = s
            .messages
            .get(channel_id)
            .map(|list| {
                list.iter()
                    .rev()
                    .filter(|m| {
                        before.is_none_or(|b| m.id.parse::<u64>().is_ok_and(|id| id < b))
                    })
                    .take(query.limit.clamp(1, 100))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page)
    }

    async fn list_emojis(&self) -> RemoteResult<Vec<LiveEmoji>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListEmojis)?;
        Ok(s.emojis.clone())
    }

    async fn list_bans(&self) -> RemoteResult<Vec<LiveBan>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListBans)?;
        Ok(s.bans.clone())
    }

    async fn list_members(&self) -> RemoteResult<Vec<LiveMember>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListMembers)?;
        Ok(s.members.clone())
    }

    async fn fetch_member(&self, user_id: &str) -> RemoteResult<Option<LiveMember>> {
        let mut s = self.state.lock().await;
        s.enter(Op::FetchMember)?;
        Ok(s.members.iter().find(|m| m.user_id == user_id).cloned())
    }

    async fn onboarding(&self) -> RemoteResult<Option<OnboardingRecord>> {
        let mut s = self.state.lock().await;
        s.enter(Op::Onboarding)?;
        Ok(s.onboarding.clone())
    }

    async fn list_scheduled_events(&self) -> RemoteResult<Vec<LiveScheduledEvent>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListScheduledEvents)?;
        Ok(s.events.clone())
    }

    async fn list_relays(&self) -> RemoteResult<Vec<RelayHandle>> {
        let mut s = self.state.lock().await;
        s.enter(Op::ListRelays)?;
        Ok(s.relays.clone())
    }

    async fn edit_workspace(&self, edit: WorkspaceEdit) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::EditWorkspace)?;
        match edit {
            WorkspaceEdit::Name(name) => {
                if name.trim().is_empty() || name.chars().count() > 100 {
                    return Err(RemoteError::Validation("workspace name length".to_string()));
                }
                s.info.name = name;
            }
            WorkspaceEdit::Icon(data) => {
                let url = data.map(|d| s.store_asset(d));
                s.info.icon_url = url;
            }
            WorkspaceEdit::Splash(data) => {
                let url = data.map(|d| s.store_asset(d));
                s.info.splash_url = url;
            }
            WorkspaceEdit::Banner(data) => {
                let url = data.map(|d| s.store_asset(d));
                s.info.banner_url = url;
            }
            WorkspaceEdit::VerificationLevel(level) => s.info.verification_level = level,
            WorkspaceEdit::DefaultMessageNotifications(level) => {
                s.info.default_message_notifications = level;
            }
            WorkspaceEdit::ExplicitContentFilter(level) => {
                s.info.explicit_content_filter = level;
            }
            WorkspaceEdit::AfkChannel(id) => {
                let reference = s.channel_ref(id.as_deref())?;
                if let Some(r) = &reference {
                    if s.channel(&r.id).is_some_and(|c| c.kind != ChannelKind::Voice) {
                        return Err(RemoteError::Validation(
                            "afk channel must be a voice channel".to_string(),
                        ));
                    }
                }
                s.info.afk_channel = reference;
            }
            WorkspaceEdit::AfkTimeout(secs) => s.info.afk_timeout_secs = secs,
            WorkspaceEdit::Widget {
                enabled,
                channel_id,
            } => {
                let reference = s.channel_ref(channel_id.as_deref())?;
                s.info.widget_channel = reference;
                s.info.widget_enabled = enabled;
            }
            WorkspaceEdit::SystemChannel(id) => {
                let reference = s.channel_ref(id.as_deref())?;
                s.info.system_channel_id = reference.map(|r| r.id);
            }
            WorkspaceEdit::SystemChannelFlags(flags) => s.system_channel_flags = flags,
        }
        Ok(())
    }

    async fn create_role(&self, spec: RoleSpec) -> RemoteResult<LiveRole> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateRole)?;
        if spec.name.is_empty() || spec.name.chars().count() > MAX_ROLE_NAME_LEN {
            return Err(RemoteError::Validation("role name length".to_string()));
        }
        let icon_url = spec.icon.map(|d| s.store_asset(d));
        Ok(s.insert_role(
            &spec.name,
            spec.color,
            spec.permissions,
            spec.hoist,
            spec.mentionable,
            icon_url,
            spec.unicode_emoji,
            false,
        ))
    }

    async fn edit_role(&self, role_id: &str, spec: RoleSpec) -> RemoteResult<LiveRole> {
        let mut s = self.state.lock().await;
        s.enter(Op::EditRole)?;
        let icon_url = spec.icon.map(|d| s.store_asset(d));
        let role = s
            .roles
            .iter_mut()
            .find(|r| r.id == role_id)
            .ok_or_else(|| RemoteError::NotFound(format!("role {role_id}")))?;
        if role.managed {
            return Err(RemoteError::PermissionDenied(format!(
                "role {role_id} is managed"
            )));
        }
        if !role.is_everyone {
            role.name = spec.name;
        }
        role.color = spec.color;
        role.hoist = spec.hoist;
        role.permissions = spec.permissions;
        role.mentionable = spec.mentionable;
        role.icon_url = icon_url;
        role.unicode_emoji = spec.unicode_emoji;
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::DeleteRole)?;
        let role = s
            .role(role_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("role {role_id}")))?;
        if role.is_everyone {
            return Err(RemoteError::Validation(
                "the implicit role cannot be deleted".to_string(),
            ));
        }
        if role.managed {
            return Err(RemoteError::PermissionDenied(format!(
                "role {role_id} is managed"
            )));
        }
        s.roles.retain(|r| r.id != role_id);
        for other in s
            .roles
            .iter_mut()
            .filter(|r| !r.is_everyone && r.position > role.position)
        {
            other.position -= 1;
        }
        for member in &mut s.members {
            member.role_ids.retain(|id| id != role_id);
        }
        Ok(())
    }

    async fn create_channel(&self, spec: ChannelSpec) -> RemoteResult<LiveChannel> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateChannel)?;
        s.validate_channel_spec(&spec)?;
        let position = s
            .channels
            .iter()
            .filter(|c| c.parent_id == spec.parent_id)
            .map(|c| c.position + 1)
            .max()
            .unwrap_or(0);
        let mut channel = LiveChannel {
            id: s.next_id(),
            name: String::new(),
            kind: spec.kind,
            parent_id: None,
            position,
            topic: None,
            nsfw: false,
            rate_limit_per_user: None,
            bitrate: None,
            user_limit: None,
            overwrites: Vec::new(),
            available_tags: Vec::new(),
            default_reaction: None,
        };
        apply_channel_spec(&mut channel, spec);
        s.channels.push(channel.clone());
        Ok(channel)
    }

    async fn edit_channel(&self, channel_id: &str, spec: ChannelSpec) -> RemoteResult<LiveChannel> {
        let mut s = self.state.lock().await;
        s.enter(Op::EditChannel)?;
        let kind = s
            .channel(channel_id)
            .map(|c| c.kind)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        s.validate_channel_spec(&ChannelSpec { kind, ..spec.clone() })?;
        let channel = s
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        apply_channel_spec(channel, spec);
        Ok(channel.clone())
    }

    async fn delete_channel(&self, channel_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::DeleteChannel)?;
        if s.channel(channel_id).is_none() {
            return Err(RemoteError::NotFound(format!("channel {channel_id}")));
        }
        if s.is_community_channel(channel_id) {
            return Err(RemoteError::Validation(
                "community channels cannot be deleted".to_string(),
            ));
        }
        s.channels.retain(|c| c.id != channel_id);
        for child in s
            .channels
            .iter_mut()
            .filter(|c| c.parent_id.as_deref() == Some(channel_id))
        {
            child.parent_id = None;
        }
        let thread_ids: Vec<String> = s
            .threads
            .iter()
            .filter(|t| t.parent_id == channel_id)
            .map(|t| t.id.clone())
            .collect();
        for id in &thread_ids {
            s.messages.remove(id);
        }
        s.threads.retain(|t| t.parent_id != channel_id);
        s.messages.remove(channel_id);
        s.relays.retain(|r| r.channel_id != channel_id);
        if s.info.system_channel_id.as_deref() == Some(channel_id) {
            s.info.system_channel_id = None;
        }
        Ok(())
    }

    async fn set_overwrites(
        &self,
        channel_id: &str,
        overwrites: Vec<Overwrite>,
    ) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::SetOverwrites)?;
        s.validate_overwrites(&overwrites)?;
        let channel = s
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        channel.overwrites = overwrites;
        Ok(())
    }

    async fn set_channel_position(&self, channel_id: &str, position: i64) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::SetChannelPosition)?;
        let channel = s
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        channel.position = position;
        Ok(())
    }

    async fn create_thread(&self, channel_id: &str, spec: ThreadSpec) -> RemoteResult<LiveThread> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateThread)?;
        let kind = s
            .channel(channel_id)
            .map(|c| c.kind)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        if !kind.is_text_capable() && kind != ChannelKind::Forum {
            return Err(RemoteError::Validation(format!(
                "{} channels cannot hold threads",
                kind.as_str()
            )));
        }
        if kind == ChannelKind::Forum && spec.starter_message.is_none() {
            return Err(RemoteError::Validation(
                "forum posts need a starter message".to_string(),
            ));
        }
        if spec.name.trim().is_empty() {
            return Err(RemoteError::Validation("thread name is empty".to_string()));
        }
        let thread = LiveThread {
            id: s.next_id(),
            parent_id: channel_id.to_string(),
            name: spec.name,
            archived: false,
            locked: false,
            auto_archive_minutes: spec.auto_archive_minutes,
            rate_limit_per_user: 0,
        };
        if let Some(content) = spec.starter_message {
            let message = LiveMessage {
                id: s.next_id(),
                author: Some(MessageAuthor {
                    username: SYSTEM_AUTHOR.to_string(),
                    avatar_url: None,
                }),
                content,
                embeds: Vec::new(),
                attachments: Vec::new(),
                pinned: false,
                created_at: Utc::now(),
            };
            s.messages.insert(thread.id.clone(), vec![message]);
        }
        s.threads.push(thread.clone());
        Ok(thread)
    }

    async fn create_relay(&self, channel_id: &str, name: &str) -> RemoteResult<RelayHandle> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateRelay)?;
        let kind = s
            .channel(channel_id)
            .map(|c| c.kind)
            .ok_or_else(|| RemoteError::NotFound(format!("channel {channel_id}")))?;
        if !kind.is_text_capable() && kind != ChannelKind::Forum {
            return Err(RemoteError::Validation(format!(
                "{} channels cannot hold relays",
                kind.as_str()
            )));
        }
        let relay = RelayHandle {
            id: s.next_id(),
            channel_id: channel_id.to_string(),
            name: name.to_string(),
        };
        s.relays.push(relay.clone());
        Ok(relay)
    }

    async fn delete_relay(&self, relay_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::DeleteRelay)?;
        let before = s.relays.len();
        s.relays.retain(|r| r.id != relay_id);
        if s.relays.len() == before {
            return Err(RemoteError::NotFound(format!("relay {relay_id}")));
        }
        Ok(())
    }

    async fn relay_send(&self, relay: &RelayHandle, message: RelayMessage) -> RemoteResult<String> {
        let mut s = self.state.lock().await;
        s.enter(Op::RelaySend)?;
        if !s.relays.iter().any(|r| r.id == relay.id) {
            return Err(RemoteError::NotFound(format!("relay {}", relay.id)));
        }
        let content = message.content.unwrap_or_default();
        if content.chars().count() > MAX_MESSAGE_CONTENT_LEN {
            return Err(RemoteError::Validation("message content too long".to_string()));
        }
        if message.embeds.len() > MAX_EMBEDS_PER_MESSAGE
            || message.files.len() > MAX_FILES_PER_MESSAGE
        {
            return Err(RemoteError::Validation("too many embeds or files".to_string()));
        }
        if content.is_empty() && message.embeds.is_empty() && message.files.is_empty() {
            return Err(RemoteError::Validation("cannot send an empty message".to_string()));
        }
        let target = match message.thread_id {
            Some(thread_id) => {
                if !s
                    .threads
                    .iter()
                    .any(|t| t.id == thread_id && t.parent_id == relay.channel_id)
                {
                    return Err(RemoteError::NotFound(format!("thread {thread_id}")));
                }
                thread_id
            }
            None => {
                if s
                    .channel(&relay.channel_id)
                    .is_some_and(|c| c.kind == ChannelKind::Forum)
                {
                    return Err(RemoteError::Validation(
                        "forum relays must target a thread".to_string(),
                    ));
                }
                relay.channel_id.clone()
            }
        };
        let attachments = message
            .files
            .into_iter()
            .map(|file| {
                let url = s.store_asset(file.data);
                LiveAttachment {
                    name: file.name,
                    url,
                }
            })
            .collect();
        let live = LiveMessage {
            id: s.next_id(),
            author: Some(MessageAuthor {
                username: message.username,
                avatar_url: message.avatar_url,
            }),
            content,
            embeds: message.embeds,
            attachments,
            pinned: false,
            created_at: Utc::now(),
        };
        let id = live.id.clone();
        s.messages.entry(target).or_default().push(live);
        Ok(id)
    }

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::PinMessage)?;
        let message = s
            .messages
            .get_mut(channel_id)
            .and_then(|list| list.iter_mut().find(|m| m.id == message_id))
            .ok_or_else(|| RemoteError::NotFound(format!("message {message_id}")))?;
        message.pinned = true;
        Ok(())
    }

    async fn create_emoji(&self, name: &str, image: ImageData) -> RemoteResult<LiveEmoji> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateEmoji)?;
        let len = name.chars().count();
        if !(2..=MAX_EMOJI_NAME_LEN).contains(&len) {
            return Err(RemoteError::Validation("emoji name length".to_string()));
        }
        if s.emojis.len() >= s.info.premium_tier.max_emojis() {
            return Err(RemoteError::Validation("emoji slots exhausted".to_string()));
        }
        let url = s.store_asset(image);
        let emoji = LiveEmoji {
            id: s.next_id(),
            name: name.to_string(),
            url,
        };
        s.emojis.push(emoji.clone());
        Ok(emoji)
    }

    async fn delete_emoji(&self, emoji_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::DeleteEmoji)?;
        let before = s.emojis.len();
        s.emojis.retain(|e| e.id != emoji_id);
        if s.emojis.len() == before {
            return Err(RemoteError::NotFound(format!("emoji {emoji_id}")));
        }
        Ok(())
    }

    async fn ban(&self, user_id: &str, reason: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::Ban)?;
        s.bans.retain(|b| b.user_id != user_id);
        s.bans.push(LiveBan {
            user_id: user_id.to_string(),
            reason: Some(reason.to_string()),
        });
        s.members.retain(|m| m.user_id != user_id);
        Ok(())
    }

    async fn unban(&self, user_id: &str) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::Unban)?;
        let before = s.bans.len();
        s.bans.retain(|b| b.user_id != user_id);
        if s.bans.len() == before {
            return Err(RemoteError::NotFound(format!("ban {user_id}")));
        }
        Ok(())
    }

    async fn set_member_roles(&self, user_id: &str, role_ids: Vec<String>) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::SetMemberRoles)?;
        for id in &role_ids {
            if !s.role(id).is_some_and(|r| !r.is_everyone && !r.managed) {
                return Err(RemoteError::Validation(format!("cannot assign role {id}")));
            }
        }
        let member = s
            .members
            .iter_mut()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| RemoteError::NotFound(format!("member {user_id}")))?;
        member.role_ids = role_ids;
        Ok(())
    }

    async fn edit_onboarding(&self, onboarding: OnboardingRecord) -> RemoteResult<()> {
        let mut s = self.state.lock().await;
        s.enter(Op::EditOnboarding)?;
        let channel_ids = onboarding.default_channel_ids.iter().chain(
            onboarding
                .prompts
                .iter()
                .flat_map(|p| p.options.iter())
                .flat_map(|o| o.channel_ids.iter()),
        );
        for id in channel_ids {
            if s.channel(id).is_none() {
                return Err(RemoteError::Validation(format!("unknown channel {id}")));
            }
        }
        for id in onboarding
            .prompts
            .iter()
            .flat_map(|p| p.options.iter())
            .flat_map(|o| o.role_ids.iter())
        {
            if s.role(id).is_none() {
                return Err(RemoteError::Validation(format!("unknown role {id}")));
            }
        }
        s.onboarding = Some(onboarding);
        Ok(())
    }

    async fn create_scheduled_event(
        &self,
        spec: ScheduledEventSpec,
    ) -> RemoteResult<LiveScheduledEvent> {
        let mut s = self.state.lock().await;
        s.enter(Op::CreateScheduledEvent)?;
        if spec.entity_type.is_channel_bound() {
            let bound = spec
                .channel_id
                .as_deref()
                .and_then(|id| s.channel(id))
                .is_some_and(|c| matches!(c.kind, ChannelKind::Voice | ChannelKind::Stage));
            if !bound {
                return Err(RemoteError::Validation(
                    "channel-bound events need a voice or stage channel".to_string(),
                ));
            }
        } else if spec.location.is_none() || spec.end.is_none() {
            return Err(RemoteError::Validation(
                "external events need a location and an end time".to_string(),
            ));
        }
        let image_url = spec.image.map(|d| s.store_asset(d));
        let event = LiveScheduledEvent {
            id: s.next_id(),
            name: spec.name,
            description: spec.description,
            start: Some(spec.start),
            end: spec.end,
            privacy_level: spec.privacy_level,
            entity_type: spec.entity_type,
            channel_id: spec.channel_id,
            location: spec.location,
            image_url,
            recurrence_rule: spec.recurrence_rule,
        };
        s.events.push(event.clone());
        Ok(event)
    }
}

#[async_trait]
impl AssetFetcher for InMemoryWorkspace {
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        let mut s = self.state.lock().await;
        s.enter(Op::FetchAsset)?;
        s.assets
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))
    }
}
