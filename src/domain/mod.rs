//! Domain layer: the snapshot model, canonical serialization and events.
//!
//! This module contains the portable, versionless snapshot of a workspace
//! (configuration, roles, channel tree, emoji, bans, member roles,
//! onboarding, scheduled events), the [`SnapshotId`] newtype, the
//! [`StableSerializer`] used for equality and diffing, and the event bus
//! for broadcasting capture and restore progress.

pub mod backup_event;
pub mod channel;
pub mod event_bus;
pub mod image;
pub mod message;
pub mod onboarding;
pub mod role;
pub mod roster;
pub mod scheduled_event;
pub mod snapshot;
pub mod snapshot_id;
pub mod stable;

pub use backup_event::BackupEvent;
pub use channel::{
    CategoryRecord, ChannelBase, ChannelKind, ChannelRecord, ChannelTree, ForumChannelRecord,
    PermissionRecord, StageChannelRecord, TextChannelRecord, ThreadRecord, VoiceChannelRecord,
};
pub use event_bus::EventBus;
pub use image::{ImageData, ImageRecord};
pub use message::{AttachmentRecord, EmbedRecord, MessageRecord};
pub use onboarding::{OnboardingPrompt, OnboardingRecord, PromptOption};
pub use role::RoleRecord;
pub use roster::{BanRecord, EmojiRecord, MemberRoleRecord};
pub use scheduled_event::{EventEntityType, ScheduledEventRecord};
pub use snapshot::{AfkRecord, CommunityLinks, Snapshot, WidgetRecord, WorkspaceSettings};
pub use snapshot_id::SnapshotId;
pub use stable::StableSerializer;
