//! Shared fixtures for the end-to-end suites.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use workspace_vault::domain::{ChannelKind, EventBus, EventEntityType, ImageData};
use workspace_vault::persistence::{MemorySnapshotStore, SnapshotStore};
use workspace_vault::remote::{
    AssetFetcher, ChannelRef, ChannelSpec, InMemoryWorkspace, LiveChannel, Overwrite,
    OverwriteKind, PremiumTier, RoleSpec, ScheduledEventSpec, ThreadSpec, WorkspaceApi,
};
use workspace_vault::service::{
    BackupService, CaptureOptions, PacingConfig, RestoreOptions, RetryPolicy,
};

pub const SOURCE_ID: &str = "100";
pub const TARGET_ID: &str = "200";
pub const CHAT_MESSAGES: usize = 25;

pub fn role(name: &str, permissions: u64) -> RoleSpec {
    RoleSpec {
        name: name.into(),
        color: 0x3498db,
        hoist: false,
        permissions,
        mentionable: true,
        icon: None,
        unicode_emoji: None,
    }
}

pub fn capture_options() -> CaptureOptions {
    CaptureOptions {
        pacing: PacingConfig::immediate(),
        include_members: true,
        max_messages_per_channel: 50,
        ..CaptureOptions::default()
    }
}

pub fn restore_options() -> RestoreOptions {
    RestoreOptions {
        pacing: PacingConfig::immediate(),
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        ..RestoreOptions::default()
    }
}

pub fn service(assets: &Arc<InMemoryWorkspace>) -> BackupService {
    service_with_store(assets, Arc::new(MemorySnapshotStore::new()))
}

pub fn service_with_store(
    assets: &Arc<InMemoryWorkspace>,
    store: Arc<dyn SnapshotStore>,
) -> BackupService {
    let assets: Arc<dyn AssetFetcher> = Arc::clone(assets) as Arc<dyn AssetFetcher>;
    BackupService::new(store, assets, EventBus::new(256))
}

pub async fn channel_named(api: &dyn WorkspaceApi, name: &str) -> LiveChannel {
    let Ok(channels) = api.list_channels().await else {
        panic!("list_channels failed");
    };
    let Some(channel) = channels.into_iter().find(|c| c.name == name) else {
        panic!("channel {name} missing");
    };
    channel
}

/// A tier-3 workspace with two roles, a categorised text channel holding
/// `CHAT_MESSAGES` messages and the widget, a high-bitrate voice channel, a forum with one
/// thread, an emoji, a ban, a member and an external scheduled event.
pub async fn seeded_source() -> Arc<InMemoryWorkspace> {
    let ws = Arc::new(InMemoryWorkspace::new(SOURCE_ID, "Source Guild"));
    ws.update_info(|info| {
        info.premium_tier = PremiumTier::Tier3;
        info.verification_level = 2;
        info.default_message_notifications = 1;
    })
    .await;

    let Ok(mods) = ws.create_role(role("mods", 8)).await else {
        panic!("create mods");
    };
    let Ok(_helpers) = ws.create_role(role("helpers", 1024)).await else {
        panic!("create helpers");
    };

    let Ok(info) = ws
        .create_channel(ChannelSpec::new("Info", ChannelKind::Category))
        .await
    else {
        panic!("create category");
    };
    let Ok(chat) = ws
        .create_channel(ChannelSpec {
            parent_id: Some(info.id.clone()),
            topic: Some("general talk".into()),
            ..ChannelSpec::new("chat", ChannelKind::Text)
        })
        .await
    else {
        panic!("create chat");
    };
    let overwrite = Overwrite {
        id: mods.id.clone(),
        kind: OverwriteKind::Role,
        allow: 1024,
        deny: 0,
    };
    if ws.set_overwrites(&chat.id, vec![overwrite]).await.is_err() {
        panic!("set overwrites");
    }
    let widget_channel = ChannelRef {
        id: chat.id.clone(),
        name: chat.name.clone(),
    };
    ws.update_info(|info| {
        info.widget_enabled = true;
        info.widget_channel = Some(widget_channel);
    })
    .await;
    for i in 0..CHAT_MESSAGES {
        if ws
            .post_message(&chat.id, Some("alice"), &format!("m{i}"))
            .await
            .is_err()
        {
            panic!("post message");
        }
    }

    if ws
        .create_channel(ChannelSpec {
            bitrate: Some(384_000),
            user_limit: Some(10),
            ..ChannelSpec::new("lounge", ChannelKind::Voice)
        })
        .await
        .is_err()
    {
        panic!("create lounge");
    }

    let Ok(forum) = ws
        .create_channel(ChannelSpec::new("help", ChannelKind::Forum))
        .await
    else {
        panic!("create forum");
    };
    let Ok(thread) = ws
        .create_thread(
            &forum.id,
            ThreadSpec {
                name: "getting started".into(),
                auto_archive_minutes: 1440,
                starter_message: Some("how do I start?".into()),
            },
        )
        .await
    else {
        panic!("create thread");
    };
    if ws
        .post_message(&thread.id, Some("bob"), "read the docs")
        .await
        .is_err()
    {
        panic!("post reply");
    }

    if ws
        .create_emoji("wave", ImageData::Url("https://cdn.example/wave.png".into()))
        .await
        .is_err()
    {
        panic!("create emoji");
    }
    if ws.ban("666", "spam").await.is_err() {
        panic!("ban");
    }
    let _ = ws.add_member("42", "carol").await;
    if ws
        .set_member_roles("42", vec![mods.id.clone()])
        .await
        .is_err()
    {
        panic!("set member roles");
    }

    let start = Utc.with_ymd_and_hms(2031, 5, 1, 18, 0, 0).single();
    let end = Utc.with_ymd_and_hms(2031, 5, 1, 21, 0, 0).single();
    let Some(start) = start else {
        panic!("bad start");
    };
    if ws
        .create_scheduled_event(ScheduledEventSpec {
            name: "Launch party".into(),
            description: Some("celebrate".into()),
            start,
            end,
            privacy_level: 2,
            entity_type: EventEntityType::External,
            channel_id: None,
            location: Some("Town hall".into()),
            image: None,
            recurrence_rule: None,
        })
        .await
        .is_err()
    {
        panic!("create event");
    }

    ws
}

/// A fresh tier-1 workspace holding one member who also exists on the
/// source.
pub async fn fresh_target() -> Arc<InMemoryWorkspace> {
    let ws = Arc::new(InMemoryWorkspace::new(TARGET_ID, "Target Guild"));
    ws.update_info(|info| info.premium_tier = PremiumTier::Tier1)
        .await;
    let _ = ws.add_member("42", "carol").await;
    ws
}
