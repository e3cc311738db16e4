//! Capture, storage and diff scenarios.

#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use workspace_vault::domain::{BackupEvent, SnapshotId};
use workspace_vault::error::BackupError;
use workspace_vault::persistence::FileSnapshotStore;
use workspace_vault::remote::{Op, WorkspaceApi};
use workspace_vault::service::{CaptureOptions, Section, SnapshotRef};

use common::{capture_options, role, seeded_source, service, service_with_store};

#[tokio::test]
async fn unchanged_workspace_diffs_empty() {
    let source = seeded_source().await;
    let svc = service(&source);
    let Ok(first) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let Ok(second) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert_ne!(first.id, second.id);

    let Ok(diff) = svc
        .diff(first.id.clone().into(), second.id.clone().into())
        .await
    else {
        panic!("diff failed");
    };
    assert!(diff.is_empty(), "unexpected diff: {diff:?}");
    assert!(!diff.config_changed);
    assert!(!diff.onboarding_changed);
}

#[tokio::test]
async fn diff_reports_role_changes_by_id() {
    let source = seeded_source().await;
    let svc = service(&source);
    let Ok(before) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };

    let Ok(roles) = source.list_roles().await else {
        panic!("roles read failed");
    };
    let Some(mods) = roles.iter().find(|r| r.name == "mods") else {
        panic!("mods missing");
    };
    assert!(source.edit_role(&mods.id, role("moderators", 8)).await.is_ok());
    let Some(helpers) = roles.iter().find(|r| r.name == "helpers") else {
        panic!("helpers missing");
    };
    assert!(source.delete_role(&helpers.id).await.is_ok());
    let Ok(added) = source.create_role(role("artists", 0)).await else {
        panic!("create failed");
    };

    let Ok(after) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let Ok(diff) = svc
        .diff(SnapshotRef::from(before), SnapshotRef::from(after))
        .await
    else {
        panic!("diff failed");
    };
    assert_eq!(diff.roles.changed, vec![mods.id.clone()]);
    assert_eq!(diff.roles.removed, vec![helpers.id.clone()]);
    assert_eq!(diff.roles.added, vec![added.id]);
    assert!(diff.channels.is_empty());
}

#[tokio::test]
async fn capture_if_changed_is_idempotent_without_channel_traffic() {
    let source = seeded_source().await;
    let svc = service(&source);
    let Ok(first) = svc
        .capture_if_changed(source.as_ref(), &capture_options(), None)
        .await
    else {
        panic!("capture failed");
    };
    let previous = Arc::clone(first.snapshot());
    source.clear_calls().await;

    for _ in 0..2 {
        let Ok(outcome) = svc
            .capture_if_changed(source.as_ref(), &capture_options(), Some(Arc::clone(&previous)))
            .await
        else {
            panic!("capture failed");
        };
        assert!(!outcome.is_changed());
        assert!(Arc::ptr_eq(outcome.snapshot(), &previous));
    }
    assert!(
        !source
            .calls()
            .await
            .iter()
            .any(|c| c.op.is_channel_traffic())
    );
    assert_eq!(source.count(Op::FetchMessages).await, 0);
}

#[tokio::test]
async fn excluded_sections_are_left_empty() {
    let source = seeded_source().await;
    let svc = service(&source);
    let options = CaptureOptions {
        exclude: [Section::Channels, Section::Bans].into_iter().collect(),
        include_members: false,
        ..capture_options()
    };
    let Ok(snapshot) = svc.create(source.as_ref(), &options).await else {
        panic!("capture failed");
    };
    assert!(snapshot.channels.is_empty());
    assert!(snapshot.bans.is_empty());
    assert!(snapshot.members.is_empty());
    assert!(!snapshot.roles.is_empty());
    assert_eq!(source.count(Op::FetchMessages).await, 0);
}

#[tokio::test]
async fn caller_supplied_ids_are_kept() {
    let source = seeded_source().await;
    let svc = service(&source);
    let options = CaptureOptions {
        snapshot_id: Some(SnapshotId::from("nightly-2031-05-01")),
        ..capture_options()
    };
    let Ok(snapshot) = svc.create(source.as_ref(), &options).await else {
        panic!("capture failed");
    };
    assert_eq!(snapshot.id.as_str(), "nightly-2031-05-01");
    let Ok(info) = svc.fetch(&snapshot.id).await else {
        panic!("fetch failed");
    };
    assert!(info.size_kb > 0.0);
}

#[tokio::test]
async fn file_store_round_trips_through_the_service() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("tempdir");
    };
    let source = seeded_source().await;
    let store = Arc::new(FileSnapshotStore::new(dir.path(), true));
    let svc = service_with_store(&source, store);
    let mut rx = svc.event_bus().subscribe();

    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    assert!(dir.path().join(format!("{}.json", snapshot.id)).exists());

    let Ok(loaded) = svc.resolve(snapshot.id.clone().into()).await else {
        panic!("resolve failed");
    };
    assert_eq!(loaded.as_ref(), snapshot.as_ref());

    assert!(svc.remove(&snapshot.id).await.is_ok());
    assert!(matches!(
        svc.fetch(&snapshot.id).await,
        Err(BackupError::NotFound(_))
    ));

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event);
    }
    assert!(matches!(
        kinds.as_slice(),
        [
            BackupEvent::SnapshotCreated { persisted: true, .. },
            BackupEvent::SnapshotDeleted { .. }
        ]
    ));
}

#[tokio::test]
async fn diff_of_missing_snapshot_is_not_found() {
    let source = seeded_source().await;
    let svc = service(&source);
    let Ok(snapshot) = svc.create(source.as_ref(), &capture_options()).await else {
        panic!("capture failed");
    };
    let result = svc
        .diff(snapshot.id.clone().into(), SnapshotId::from("missing").into())
        .await;
    assert!(matches!(result, Err(BackupError::NotFound(_))));
    tokio_test::assert_ok!(svc.list().await);
}
