//! Remote platform boundary.
//!
//! The engine never talks to a concrete platform SDK. It consumes the
//! capability-typed [`WorkspaceApi`] trait and downloads binary assets
//! through [`AssetFetcher`]. Every failure is classified as a
//! [`RemoteError`] so the retry policy can decide what to do with it.
//!
//! Two implementations ship with the crate: [`InMemoryWorkspace`], a
//! simulated workspace used by tests and local tooling, and
//! [`HttpAssetFetcher`], which downloads assets with `reqwest`.

pub mod error;
pub mod http;
pub mod memory;
pub mod types;

use std::fmt;

use async_trait::async_trait;

pub use error::RemoteError;
pub use http::HttpAssetFetcher;
pub use memory::{InMemoryWorkspace, Op};
pub use types::{
    AllowedMentions, Capability, ChannelRef, ChannelSpec, FileUpload, LiveAttachment, LiveBan,
    LiveChannel, LiveEmoji, LiveMember, LiveMessage, LiveRole, LiveScheduledEvent, LiveThread,
    MentionKind, MessageAuthor, MessageQuery, Overwrite, OverwriteKind, PremiumTier, RelayHandle,
    RelayMessage, RoleSpec, ScheduledEventSpec, ThreadSpec, WorkspaceEdit, WorkspaceFeature,
    WorkspaceInfo,
};

use crate::domain::{ImageData, OnboardingRecord};

/// Result alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Capability-typed operations on one remote workspace.
///
/// Reads return live state; writes mutate it. Implementations classify
/// every failure into a [`RemoteError`] and never retry on their own.
#[async_trait]
pub trait WorkspaceApi: Send + Sync + fmt::Debug {
    /// Returns workspace-level state.
    async fn workspace(&self) -> RemoteResult<WorkspaceInfo>;

    /// Returns `true` if the caller holds the capability.
    async fn has_capability(&self, capability: Capability) -> RemoteResult<bool>;

    /// Lists every role, including the implicit one.
    async fn list_roles(&self) -> RemoteResult<Vec<LiveRole>>;

    /// Lists every non-thread channel.
    async fn list_channels(&self) -> RemoteResult<Vec<LiveChannel>>;

    /// Lists the active and archived threads of a channel.
    async fn list_threads(&self, channel_id: &str) -> RemoteResult<Vec<LiveThread>>;

    /// Fetches one page of history, newest first.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        query: MessageQuery,
    ) -> RemoteResult<Vec<LiveMessage>>;

    /// Lists custom emoji.
    async fn list_emojis(&self) -> RemoteResult<Vec<LiveEmoji>>;

    /// Lists bans.
    async fn list_bans(&self) -> RemoteResult<Vec<LiveBan>>;

    /// Lists members.
    async fn list_members(&self) -> RemoteResult<Vec<LiveMember>>;

    /// Fetches one member; `Ok(None)` when the user is not a member.
    async fn fetch_member(&self, user_id: &str) -> RemoteResult<Option<LiveMember>>;

    /// Returns the onboarding flow; `Ok(None)` when the platform has none.
    async fn onboarding(&self) -> RemoteResult<Option<OnboardingRecord>>;

    /// Lists scheduled events.
    async fn list_scheduled_events(&self) -> RemoteResult<Vec<LiveScheduledEvent>>;

    /// Lists relay identities.
    async fn list_relays(&self) -> RemoteResult<Vec<RelayHandle>>;

    /// Applies one workspace-level setting.
    async fn edit_workspace(&self, edit: WorkspaceEdit) -> RemoteResult<()>;

    /// Creates a role.
    async fn create_role(&self, spec: RoleSpec) -> RemoteResult<LiveRole>;

    /// Edits a role in place.
    async fn edit_role(&self, role_id: &str, spec: RoleSpec) -> RemoteResult<LiveRole>;

    /// Deletes a role.
    async fn delete_role(&self, role_id: &str) -> RemoteResult<()>;

    /// Creates a channel.
    async fn create_channel(&self, spec: ChannelSpec) -> RemoteResult<LiveChannel>;

    /// Edits a channel in place; the kind is left unchanged.
    async fn edit_channel(&self, channel_id: &str, spec: ChannelSpec) -> RemoteResult<LiveChannel>;

    /// Deletes a channel.
    async fn delete_channel(&self, channel_id: &str) -> RemoteResult<()>;

    /// Replaces a channel's permission overwrites.
    async fn set_overwrites(&self, channel_id: &str, overwrites: Vec<Overwrite>)
    -> RemoteResult<()>;

    /// Moves a channel.
    async fn set_channel_position(&self, channel_id: &str, position: i64) -> RemoteResult<()>;

    /// Creates a thread inside a text or forum channel.
    async fn create_thread(&self, channel_id: &str, spec: ThreadSpec) -> RemoteResult<LiveThread>;

    /// Creates a relay identity bound to a channel.
    async fn create_relay(&self, channel_id: &str, name: &str) -> RemoteResult<RelayHandle>;

    /// Deletes a relay identity.
    async fn delete_relay(&self, relay_id: &str) -> RemoteResult<()>;

    /// Sends a message through a relay; returns the new message id.
    async fn relay_send(&self, relay: &RelayHandle, message: RelayMessage) -> RemoteResult<String>;

    /// Pins a message in a channel or thread.
    async fn pin_message(&self, channel_id: &str, message_id: &str) -> RemoteResult<()>;

    /// Creates a custom emoji.
    async fn create_emoji(&self, name: &str, image: ImageData) -> RemoteResult<LiveEmoji>;

    /// Deletes a custom emoji.
    async fn delete_emoji(&self, emoji_id: &str) -> RemoteResult<()>;

    /// Bans a user.
    async fn ban(&self, user_id: &str, reason: &str) -> RemoteResult<()>;

    /// Lifts a ban.
    async fn unban(&self, user_id: &str) -> RemoteResult<()>;

    /// Replaces a member's role set.
    async fn set_member_roles(&self, user_id: &str, role_ids: Vec<String>) -> RemoteResult<()>;

    /// Replaces the onboarding flow.
    async fn edit_onboarding(&self, onboarding: OnboardingRecord) -> RemoteResult<()>;

    /// Creates a scheduled event.
    async fn create_scheduled_event(
        &self,
        spec: ScheduledEventSpec,
    ) -> RemoteResult<LiveScheduledEvent>;
}

/// Downloads binary assets (icons, emoji, attachments) by URL.
#[async_trait]
pub trait AssetFetcher: Send + Sync + fmt::Debug {
    /// Returns the bytes behind `url`.
    async fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>>;
}
