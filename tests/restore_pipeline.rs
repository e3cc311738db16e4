//! End-to-end restore scenarios against the simulated workspace.

#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use workspace_vault::domain::ChannelKind;
use workspace_vault::error::BackupError;
use workspace_vault::remote::{
    ChannelSpec, InMemoryWorkspace, Op, RemoteError, WorkspaceApi, WorkspaceFeature,
};
use workspace_vault::service::{RestoreOptions, SkipReason, Stage};

use common::{
    capture_options, channel_named, fresh_target, restore_options, seeded_source, service,
};

#[tokio::test]
async fn full_restore_recreates_the_workspace() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);

    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let options = RestoreOptions {
        restore_members: true,
        ..restore_options()
    };
    let Ok(report) = svc
        .load(Arc::clone(&snapshot).into(), Some(target.as_ref()), &options)
        .await
    else {
        panic!("restore failed");
    };

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Clear,
            Stage::Config,
            Stage::Roles,
            Stage::Members,
            Stage::Channels,
            Stage::Emojis,
            Stage::Bans,
            Stage::Widget,
            Stage::ScheduledEvents,
        ]
    );
    assert!(Arc::ptr_eq(&report.snapshot, &snapshot));

    let Ok(info) = target.workspace().await else {
        panic!("workspace read failed");
    };
    assert_eq!(info.name, "Source Guild");
    assert_eq!(info.verification_level, 2);

    let Ok(roles) = target.list_roles().await else {
        panic!("roles read failed");
    };
    let Some(mods) = roles.iter().find(|r| r.name == "mods") else {
        panic!("mods not restored");
    };
    assert!(roles.iter().any(|r| r.name == "helpers"));

    let chat = channel_named(target.as_ref(), "chat").await;
    let category = channel_named(target.as_ref(), "Info").await;
    assert_eq!(chat.parent_id.as_deref(), Some(category.id.as_str()));
    assert_eq!(chat.topic.as_deref(), Some("general talk"));
    assert!(chat.overwrites.iter().any(|o| o.id == mods.id && o.allow == 1024));

    let Ok(Some(member)) = target.fetch_member("42").await else {
        panic!("member missing");
    };
    assert_eq!(member.role_ids, vec![mods.id.clone()]);

    let Ok(emojis) = target.list_emojis().await else {
        panic!("emoji read failed");
    };
    assert_eq!(emojis.len(), 1);
    let Ok(bans) = target.list_bans().await else {
        panic!("ban read failed");
    };
    assert!(bans.iter().any(|b| b.user_id == "666"));
    let Ok(events) = target.list_scheduled_events().await else {
        panic!("event read failed");
    };
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn voice_bitrate_is_clamped_to_target_tier() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert!(
        svc.load(snapshot.into(), Some(target.as_ref()), &restore_options())
            .await
            .is_ok()
    );

    let lounge = channel_named(target.as_ref(), "lounge").await;
    assert_eq!(lounge.kind, ChannelKind::Voice);
    let Some(bitrate) = lounge.bitrate else {
        panic!("bitrate missing");
    };
    assert!(bitrate <= 128_000);
}

#[tokio::test]
async fn replay_is_capped_to_most_recent_oldest_first() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert!(
        svc.load(snapshot.into(), Some(target.as_ref()), &restore_options())
            .await
            .is_ok()
    );

    let chat = channel_named(target.as_ref(), "chat").await;
    let replayed = target.messages_in(&chat.id).await;
    let contents: Vec<String> = replayed.iter().map(|m| m.content.clone()).collect();
    let expected: Vec<String> = (15..25).map(|i| format!("m{i}")).collect();
    assert_eq!(contents, expected);
    assert!(
        replayed
            .iter()
            .all(|m| m.author.as_ref().is_some_and(|a| a.username == "alice"))
    );
}

#[tokio::test]
async fn forum_threads_use_oldest_message_as_starter() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert!(
        svc.load(snapshot.into(), Some(target.as_ref()), &restore_options())
            .await
            .is_ok()
    );

    let forum = channel_named(target.as_ref(), "help").await;
    let Ok(threads) = target.list_threads(&forum.id).await else {
        panic!("threads read failed");
    };
    let Some(thread) = threads.iter().find(|t| t.name == "getting started") else {
        panic!("thread not restored");
    };
    let contents: Vec<String> = target
        .messages_in(&thread.id)
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["how do I start?", "read the docs"]);
}

#[tokio::test]
async fn replaying_events_twice_creates_no_duplicates() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };

    for _ in 0..2 {
        assert!(
            svc.load(
                Arc::clone(&snapshot).into(),
                Some(target.as_ref()),
                &restore_options()
            )
            .await
            .is_ok()
        );
    }
    assert_eq!(target.count(Op::CreateScheduledEvent).await, 1);

    let Ok(report) = svc
        .load(snapshot.into(), Some(target.as_ref()), &restore_options())
        .await
    else {
        panic!("restore failed");
    };
    let Some(stage) = report.stage(Stage::ScheduledEvents) else {
        panic!("event stage missing");
    };
    assert_eq!(stage.applied, 0);
    assert!(
        stage
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::AlreadyExists)
    );
    let Ok(events) = target.list_scheduled_events().await else {
        panic!("event read failed");
    };
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn clear_wipes_a_populated_target() {
    let source = seeded_source().await;
    let svc = service(&source);

    let Ok(stage) = svc
        .clear(Some(source.as_ref()), restore_options().retry)
        .await
    else {
        panic!("clear failed");
    };
    assert_eq!(stage.stage, Stage::Clear);

    let Ok(roles) = source.list_roles().await else {
        panic!("roles read failed");
    };
    assert!(roles.iter().all(|r| r.is_everyone || r.managed));
    assert!(matches!(source.list_channels().await, Ok(c) if c.is_empty()));
    assert!(matches!(source.list_emojis().await, Ok(e) if e.is_empty()));
    assert!(matches!(source.list_bans().await, Ok(b) if b.is_empty()));

    assert!(matches!(
        svc.clear(None, restore_options().retry).await,
        Err(BackupError::InvalidTarget)
    ));
}

#[tokio::test]
async fn per_item_failures_are_reported_not_raised() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };

    target
        .fail_next(Op::CreateRole, RemoteError::Validation("bad colour".into()))
        .await;
    target
        .fail_next(Op::Ban, RemoteError::PermissionDenied("no ban perms".into()))
        .await;

    let Ok(report) = svc
        .load(snapshot.into(), Some(target.as_ref()), &restore_options())
        .await
    else {
        panic!("restore should absorb per-item failures");
    };
    let Some(roles) = report.stage(Stage::Roles) else {
        panic!("roles stage missing");
    };
    assert_eq!(roles.skipped.len(), 1);
    assert!(matches!(
        roles.skipped.first().map(|s| &s.reason),
        Some(SkipReason::Failed(_))
    ));
    let Some(bans) = report.stage(Stage::Bans) else {
        panic!("bans stage missing");
    };
    assert_eq!(bans.applied, 0);
    assert_eq!(bans.skipped.len(), 1);
    // Permission failures are never retried.
    assert_eq!(target.count(Op::Ban).await, 1);
}

#[tokio::test]
async fn stage_failure_stops_the_pipeline() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };

    target
        .fail_next(Op::EditWorkspace, RemoteError::PermissionDenied("no manage".into()))
        .await;
    let options = RestoreOptions {
        clear_before_restore: false,
        ..restore_options()
    };
    let result = svc
        .load(snapshot.into(), Some(target.as_ref()), &options)
        .await;
    assert!(matches!(result, Err(BackupError::PermissionDenied(_))));
    assert_eq!(target.count(Op::CreateRole).await, 0);
    assert_eq!(target.count(Op::CreateChannel).await, 0);
}

#[tokio::test]
async fn restore_progress_is_published() {
    let source = seeded_source().await;
    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let mut rx = svc.event_bus().subscribe();

    assert!(
        svc.load(snapshot.into(), Some(target.as_ref()), &restore_options())
            .await
            .is_ok()
    );

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.workspace_id(), Some(common::TARGET_ID));
        kinds.push(event.event_type_str());
    }
    assert_eq!(kinds.first(), Some(&"restore_started"));
    assert_eq!(kinds.last(), Some(&"restore_finished"));
    assert!(kinds.iter().filter(|k| **k == "restore_stage_completed").count() >= 8);
}

#[tokio::test]
async fn feature_gated_channels_are_downgraded() {
    let source = Arc::new(InMemoryWorkspace::new("300", "News Guild"));
    source
        .update_info(|info| {
            info.features = vec![WorkspaceFeature::News, WorkspaceFeature::Community];
        })
        .await;
    assert!(
        source
            .create_channel(ChannelSpec::new("updates", ChannelKind::Announcement))
            .await
            .is_ok()
    );
    assert!(
        source
            .create_channel(ChannelSpec::new("town-hall", ChannelKind::Stage))
            .await
            .is_ok()
    );
    let updates = channel_named(source.as_ref(), "updates").await;
    assert!(
        source
            .post_message(&updates.id, Some("staff"), "v2 is out")
            .await
            .is_ok()
    );

    let target = fresh_target().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert!(
        svc.load(snapshot.into(), Some(target.as_ref()), &restore_options())
            .await
            .is_ok()
    );

    let updates = channel_named(target.as_ref(), "updates").await;
    assert_eq!(updates.kind, ChannelKind::Text);
    let replayed = target.messages_in(&updates.id).await;
    assert_eq!(replayed.len(), 1);
    let stage = channel_named(target.as_ref(), "town-hall").await;
    assert_eq!(stage.kind, ChannelKind::Voice);
}

#[tokio::test]
async fn target_is_required() {
    let source = seeded_source().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let result: Result<_, BackupError> = svc
        .load(snapshot.into(), None, &restore_options())
        .await;
    assert!(matches!(result, Err(BackupError::InvalidTarget)));
}
