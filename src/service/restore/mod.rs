//! Ordered restore pipeline.
//!
//! [`RestoreOrchestrator::restore`] drives a target workspace through the
//! stages of [`Stage`], strictly one after the other:
//!
//! clear, config, roles, members, channels, AFK, emoji, bans, widget,
//! onboarding, scheduled events.
//!
//! Members, AFK, widget, onboarding and scheduled events run only when the
//! snapshot carries something for them.
//!
//! Per-item failures never leave their loop: they are recorded as
//! [`SkippedItem`]s in the stage's [`StageReport`]. Stage-level failures
//! (a config edit, a category, the AFK or widget settings, a listing a
//! stage cannot proceed without) abort the restore and propagate.
//!
//! Two restores against the same target must not run concurrently.

mod channels;
pub mod clear;
pub mod relay;
pub mod report;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

pub use relay::select_replay;
pub use report::{RestoreReport, SkipReason, SkippedItem, Stage, StageReport};

use super::builder::DEFAULT_MAX_MESSAGES_PER_CHANNEL;
use super::pacing::{PacingConfig, pause};
use super::reconciler::IdentifierReconciler;
use super::retry::{RetryExecutor, RetryPolicy};
use crate::domain::role::MAX_ROLE_NAME_LEN;
use crate::domain::roster::{DEFAULT_BAN_REASON, MAX_EMOJI_NAME_LEN};
use crate::domain::scheduled_event::DEFAULT_EXTERNAL_LOCATION;
use crate::domain::{
    BackupEvent, ChannelKind, EventBus, ImageRecord, OnboardingRecord, ScheduledEventRecord,
    Snapshot,
};
use crate::error::BackupError;
use crate::remote::{
    AllowedMentions, LiveScheduledEvent, RoleSpec, ScheduledEventSpec, WorkspaceApi,
    WorkspaceEdit, WorkspaceFeature, WorkspaceInfo,
};

/// Name of the relay identity used to replay messages.
pub const DEFAULT_RELAY_NAME: &str = "MessagesBackup";

/// Sibling channels restored at the same time.
pub const DEFAULT_CHANNEL_CONCURRENCY: usize = 4;

/// Two scheduled events with the same name whose starts are closer than
/// this are the same event.
pub const EVENT_DEDUPE_WINDOW_MS: i64 = 60_000;

/// Restore parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Wipe the target before applying the snapshot.
    pub clear_before_restore: bool,
    /// Messages replayed per channel and per thread.
    pub max_messages_per_channel: usize,
    /// Re-apply member role assignments.
    pub restore_members: bool,
    /// Mention kinds expanded in replayed messages.
    pub allowed_mentions: AllowedMentions,
    /// Relay identity name.
    pub relay_name: String,
    /// Sibling channels restored concurrently (at least one).
    pub channel_concurrency: usize,
    /// Retry policy for remote mutations.
    pub retry: RetryPolicy,
    /// Delays between paced operations.
    pub pacing: PacingConfig,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            clear_before_restore: true,
            max_messages_per_channel: DEFAULT_MAX_MESSAGES_PER_CHANNEL,
            restore_members: false,
            allowed_mentions: AllowedMentions::none(),
            relay_name: DEFAULT_RELAY_NAME.to_string(),
            channel_concurrency: DEFAULT_CHANNEL_CONCURRENCY,
            retry: RetryPolicy::default(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Applies snapshots to target workspaces.
#[derive(Debug, Clone, Default)]
pub struct RestoreOrchestrator {
    events: Option<EventBus>,
}

impl RestoreOrchestrator {
    /// Creates an orchestrator that publishes no events.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: None }
    }

    /// Creates an orchestrator publishing progress on `events`.
    #[must_use]
    pub const fn with_events(events: EventBus) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Applies `snapshot` to `target`.
    ///
    /// # Errors
    ///
    /// - [`BackupError::InvalidTarget`] when `target` is `None`.
    /// - The first stage-level failure; stages already run stay applied.
    pub async fn restore(
        &self,
        snapshot: Arc<Snapshot>,
        target: Option<&dyn WorkspaceApi>,
        options: &RestoreOptions,
    ) -> Result<RestoreReport, BackupError> {
        let api = target.ok_or(BackupError::InvalidTarget)?;
        let retry = RetryExecutor::new(options.retry);
        let workspace_id = api.workspace().await?.id;

        tracing::info!(
            snapshot_id = %snapshot.id,
            workspace_id = %workspace_id,
            "restore started"
        );
        self.publish(BackupEvent::RestoreStarted {
            snapshot_id: snapshot.id.clone(),
            workspace_id: workspace_id.clone(),
            timestamp: Utc::now(),
        });

        let mut report = RestoreReport {
            snapshot: Arc::clone(&snapshot),
            stages: Vec::new(),
        };
        let mut complete = |stage: StageReport| {
            tracing::info!(
                stage = %stage.stage,
                applied = stage.applied,
                skipped = stage.skipped.len(),
                "restore stage completed"
            );
            self.publish(BackupEvent::RestoreStageCompleted {
                snapshot_id: snapshot.id.clone(),
                workspace_id: workspace_id.clone(),
                stage: stage.stage.as_str().to_string(),
                applied: stage.applied,
                skipped: stage.skipped.len(),
                timestamp: Utc::now(),
            });
            report.stages.push(stage);
        };

        if options.clear_before_restore {
            complete(clear::clear_workspace(api, retry).await);
        }
        let info = api.workspace().await?;

        complete(restore_config(api, retry, &snapshot, &info).await?);
        complete(restore_roles(api, retry, &snapshot, options).await?);
        if options.restore_members && !snapshot.members.is_empty() {
            complete(restore_members(api, retry, &snapshot, options).await?);
        }
        complete(channels::restore_channels(api, retry, &snapshot, &info, options).await?);
        if let Some(stage) = restore_afk(api, retry, &snapshot).await? {
            complete(stage);
        }
        complete(restore_emojis(api, retry, &snapshot, &info, options).await);
        complete(restore_bans(api, retry, &snapshot, options).await);
        if let Some(stage) = restore_widget(api, retry, &snapshot).await? {
            complete(stage);
        }
        if let Some(onboarding) = &snapshot.onboarding {
            complete(restore_onboarding(api, retry, &snapshot, onboarding).await);
        }
        if let Some(events) = &snapshot.scheduled_events {
            complete(restore_scheduled_events(api, retry, &snapshot, events).await?);
        }

        let skipped = report.skipped_count();
        tracing::info!(
            snapshot_id = %snapshot.id,
            workspace_id = %workspace_id,
            skipped,
            "restore finished"
        );
        self.publish(BackupEvent::RestoreFinished {
            snapshot_id: snapshot.id.clone(),
            workspace_id,
            skipped,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    /// Runs the wipe stage alone.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::InvalidTarget`] when `target` is `None`.
    pub async fn clear(
        &self,
        target: Option<&dyn WorkspaceApi>,
        retry: RetryPolicy,
    ) -> Result<StageReport, BackupError> {
        let api = target.ok_or(BackupError::InvalidTarget)?;
        Ok(clear::clear_workspace(api, RetryExecutor::new(retry)).await)
    }

    fn publish(&self, event: BackupEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

async fn restore_config(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    info: &WorkspaceInfo,
) -> Result<StageReport, BackupError> {
    let settings = &snapshot.settings;
    let mut edits = vec![WorkspaceEdit::Name(settings.name.clone())];
    if let Some(icon) = &settings.icon {
        edits.push(WorkspaceEdit::Icon(Some(icon.to_image_data())));
    }
    if let Some(splash) = &settings.splash {
        edits.push(WorkspaceEdit::Splash(Some(splash.to_image_data())));
    }
    if let Some(banner) = &settings.banner {
        edits.push(WorkspaceEdit::Banner(Some(banner.to_image_data())));
    }
    edits.push(WorkspaceEdit::VerificationLevel(settings.verification_level));
    edits.push(WorkspaceEdit::DefaultMessageNotifications(
        settings.default_message_notifications,
    ));
    if info.has_feature(WorkspaceFeature::Community) {
        edits.push(WorkspaceEdit::ExplicitContentFilter(
            settings.explicit_content_filter,
        ));
    }

    let results = join_all(edits.into_iter().map(|edit| async move {
        let label = edit.label();
        retry
            .run(label, || api.edit_workspace(edit.clone()))
            .await
            .inspect_err(|err| tracing::warn!(setting = label, error = %err, "config edit failed"))
    }))
    .await;

    let mut report = StageReport::new(Stage::Config);
    for result in results {
        result?;
        report.applied();
    }
    Ok(report)
}

async fn restore_roles(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    options: &RestoreOptions,
) -> Result<StageReport, BackupError> {
    let everyone_id = api
        .list_roles()
        .await?
        .into_iter()
        .find(|r| r.is_everyone)
        .map(|r| r.id);

    let mut report = StageReport::new(Stage::Roles);
    let mut created = 0_usize;
    for role in &snapshot.roles {
        let label = format!("role {}", role.name);
        let permissions = match role.permission_bits() {
            Ok(bits) => bits,
            Err(err) => {
                report.skip(
                    label,
                    SkipReason::InvalidData(format!("permissions {:?}: {err}", role.permissions)),
                );
                continue;
            }
        };
        let spec = RoleSpec {
            name: relay::truncate(&role.name, MAX_ROLE_NAME_LEN),
            color: role.color,
            hoist: role.hoist,
            permissions,
            mentionable: role.mentionable,
            icon: role.icon.as_ref().map(ImageRecord::to_image_data),
            unicode_emoji: role.unicode_emoji.clone(),
        };

        let result = if role.is_everyone {
            let Some(id) = everyone_id.as_deref() else {
                report.skip(label, SkipReason::Absent);
                continue;
            };
            retry
                .run("edit_role", || api.edit_role(id, spec.clone()))
                .await
        } else {
            if created > 0 {
                pause(options.pacing.role).await;
            }
            created += 1;
            retry
                .run("create_role", || api.create_role(spec.clone()))
                .await
        };
        match result {
            Ok(live) => {
                tracing::debug!(role_id = %live.id, name = %live.name, "role applied");
                report.applied();
            }
            Err(err) => report.skip(label, SkipReason::Failed(err.to_string())),
        }
    }
    Ok(report)
}

async fn restore_members(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    options: &RestoreOptions,
) -> Result<StageReport, BackupError> {
    let reconciler = IdentifierReconciler::new(snapshot, api.list_roles().await?, Vec::new());
    let role_map: HashMap<String, String> = reconciler.role_map();

    let mut report = StageReport::new(Stage::Members);
    for (i, member) in snapshot.members.iter().enumerate() {
        if i > 0 {
            pause(options.pacing.member).await;
        }
        let label = format!("member {}", member.user_id);
        match api.fetch_member(&member.user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                report.skip(label, SkipReason::Absent);
                continue;
            }
            Err(err) => {
                report.skip(label, SkipReason::Failed(err.to_string()));
                continue;
            }
        }
        let role_ids: Vec<String> = member
            .roles
            .iter()
            .filter_map(|old| role_map.get(old).cloned())
            .collect();
        if role_ids.len() < member.roles.len() {
            tracing::debug!(
                user_id = %member.user_id,
                dropped = member.roles.len() - role_ids.len(),
                "unresolved member roles dropped"
            );
        }
        let result = retry
            .run("set_member_roles", || {
                api.set_member_roles(&member.user_id, role_ids.clone())
            })
            .await;
        match result {
            Ok(()) => report.applied(),
            Err(err) => report.skip(label, SkipReason::Failed(err.to_string())),
        }
    }
    Ok(report)
}

async fn restore_afk(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
) -> Result<Option<StageReport>, BackupError> {
    let Some(afk) = &snapshot.settings.afk else {
        return Ok(None);
    };
    let mut report = StageReport::new(Stage::Afk);
    let channel_id = api
        .list_channels()
        .await?
        .into_iter()
        .find(|c| c.kind == ChannelKind::Voice && c.name == afk.channel_name)
        .map(|c| c.id);
    match channel_id {
        Some(id) => {
            let edit = WorkspaceEdit::AfkChannel(Some(id));
            retry
                .run("edit_workspace", || api.edit_workspace(edit.clone()))
                .await?;
            report.applied();
        }
        None => report.skip(
            "afk channel",
            SkipReason::Unresolved(format!("voice channel {}", afk.channel_name)),
        ),
    }
    let edit = WorkspaceEdit::AfkTimeout(afk.timeout_secs);
    retry
        .run("edit_workspace", || api.edit_workspace(edit.clone()))
        .await?;
    report.applied();
    Ok(Some(report))
}

async fn restore_emojis(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    info: &WorkspaceInfo,
    options: &RestoreOptions,
) -> StageReport {
    let mut report = StageReport::new(Stage::Emojis);
    let cap = info.premium_tier.max_emojis();
    let mut used = match api.list_emojis().await {
        Ok(existing) => existing.len(),
        Err(err) => {
            tracing::warn!(error = %err, "emoji listing failed, assuming none");
            0
        }
    };

    let mut attempted = 0_usize;
    for emoji in &snapshot.emojis {
        let label = format!("emoji :{}:", emoji.name);
        if used >= cap {
            report.skip(label, SkipReason::LimitReached);
            continue;
        }
        if attempted > 0 {
            pause(options.pacing.emoji).await;
        }
        attempted += 1;
        let image = ImageRecord {
            url: emoji.url.clone(),
            base64: emoji.base64.clone(),
        }
        .to_image_data();
        let name = relay::truncate(&emoji.name, MAX_EMOJI_NAME_LEN);
        let result = retry
            .run("create_emoji", || api.create_emoji(&name, image.clone()))
            .await;
        match result {
            Ok(_) => {
                used += 1;
                report.applied();
            }
            Err(err) => report.skip(label, SkipReason::Failed(err.to_string())),
        }
    }
    report
}

async fn restore_bans(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    options: &RestoreOptions,
) -> StageReport {
    let mut report = StageReport::new(Stage::Bans);
    for (i, ban) in snapshot.bans.iter().enumerate() {
        if i > 0 {
            pause(options.pacing.ban).await;
        }
        let reason = ban.reason.as_deref().unwrap_or(DEFAULT_BAN_REASON);
        let result = retry
            .run("ban", || api.ban(&ban.user_id, reason))
            .await;
        match result {
            Ok(()) => report.applied(),
            Err(err) => report.skip(
                format!("ban {}", ban.user_id),
                SkipReason::Failed(err.to_string()),
            ),
        }
    }
    report
}

/// Runs only when the snapshot enables the widget or names its channel;
/// a bare default widget leaves the target's settings alone.
async fn restore_widget(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
) -> Result<Option<StageReport>, BackupError> {
    let widget = &snapshot.settings.widget;
    if !widget.enabled && widget.channel_name.is_none() {
        return Ok(None);
    }
    let mut report = StageReport::new(Stage::Widget);
    let channel_id = match &widget.channel_name {
        Some(name) => {
            let found = api
                .list_channels()
                .await?
                .into_iter()
                .find(|c| &c.name == name)
                .map(|c| c.id);
            if found.is_none() {
                report.skip(
                    "widget channel",
                    SkipReason::Unresolved(format!("channel {name}")),
                );
            }
            found
        }
        None => None,
    };
    let edit = WorkspaceEdit::Widget {
        enabled: widget.enabled,
        channel_id,
    };
    retry
        .run("edit_workspace", || api.edit_workspace(edit.clone()))
        .await?;
    report.applied();
    Ok(Some(report))
}

async fn restore_onboarding(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    onboarding: &OnboardingRecord,
) -> StageReport {
    let mut report = StageReport::new(Stage::Onboarding);
    match apply_onboarding(api, retry, snapshot, onboarding, &mut report).await {
        Ok(()) => report.applied(),
        Err(err) => report.skip("onboarding", SkipReason::Failed(err.to_string())),
    }
    report
}

async fn apply_onboarding(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    onboarding: &OnboardingRecord,
    report: &mut StageReport,
) -> Result<(), BackupError> {
    let reconciler = IdentifierReconciler::new(
        snapshot,
        api.list_roles().await?,
        api.list_channels().await?,
    );
    let resolved = resolve_onboarding(onboarding, &reconciler, report);
    retry
        .run("edit_onboarding", || api.edit_onboarding(resolved.clone()))
        .await
}

/// Maps every channel and role reference of `onboarding` onto the live
/// workspace, dropping (and recording) the ones that do not resolve.
/// Prompt and option ids are kept.
fn resolve_onboarding(
    onboarding: &OnboardingRecord,
    reconciler: &IdentifierReconciler,
    report: &mut StageReport,
) -> OnboardingRecord {
    let resolve_channels = |ids: &[String], report: &mut StageReport| -> Vec<String> {
        ids.iter()
            .filter_map(|id| {
                let live = reconciler.resolve_channel(id);
                if live.is_none() {
                    report.skip(
                        "onboarding channel reference",
                        SkipReason::Unresolved(format!("channel {id}")),
                    );
                }
                live
            })
            .collect()
    };

    let mut resolved = onboarding.clone();
    resolved.default_channel_ids = resolve_channels(&onboarding.default_channel_ids, report);
    for prompt in &mut resolved.prompts {
        for option in &mut prompt.options {
            let title = option.title.clone();
            option.channel_ids = resolve_channels(&option.channel_ids, report);
            option.role_ids = option
                .role_ids
                .iter()
                .filter_map(|id| {
                    let live = reconciler.resolve_role(id);
                    if live.is_none() {
                        report.skip(
                            format!("onboarding option {title}"),
                            SkipReason::Unresolved(format!("role {id}")),
                        );
                    }
                    live
                })
                .collect();
        }
    }
    resolved
}

async fn restore_scheduled_events(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    events: &[ScheduledEventRecord],
) -> Result<StageReport, BackupError> {
    let mut report = StageReport::new(Stage::ScheduledEvents);
    let existing = api.list_scheduled_events().await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "scheduled event listing failed, no dedupe");
        Vec::new()
    });
    let reconciler = IdentifierReconciler::new(snapshot, Vec::new(), api.list_channels().await?);
    let now = Utc::now();

    for event in events {
        let label = format!("scheduled event {}", event.name);
        let start = event.start.unwrap_or(now);
        if is_duplicate(&existing, &event.name, start) {
            report.skip(label, SkipReason::AlreadyExists);
            continue;
        }
        let (channel_id, location) = if event.entity_type.is_channel_bound() {
            match event
                .channel_id
                .as_deref()
                .and_then(|id| reconciler.resolve_channel(id))
            {
                Some(id) => (Some(id), None),
                None => {
                    let reference = event.channel_id.clone().unwrap_or_default();
                    report.skip(label, SkipReason::Unresolved(format!("channel {reference}")));
                    continue;
                }
            }
        } else {
            let location = event
                .location
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_EXTERNAL_LOCATION.to_string());
            (None, Some(location))
        };
        let spec = ScheduledEventSpec {
            name: event.name.clone(),
            description: event.description.clone(),
            start,
            end: event.end,
            privacy_level: event.privacy_level,
            entity_type: event.entity_type,
            channel_id,
            location,
            image: event.image.as_ref().map(ImageRecord::to_image_data),
            recurrence_rule: event.recurrence_rule.clone(),
        };
        let result = retry
            .run("create_scheduled_event", || {
                api.create_scheduled_event(spec.clone())
            })
            .await;
        match result {
            Ok(_) => report.applied(),
            Err(err) => report.skip(label, SkipReason::Failed(err.to_string())),
        }
    }
    Ok(report)
}

fn is_duplicate(
    existing: &[LiveScheduledEvent],
    name: &str,
    start: chrono::DateTime<Utc>,
) -> bool {
    existing.iter().any(|e| {
        e.name == name
            && e
                .start
                .is_some_and(|s| (s - start).num_milliseconds().abs() < EVENT_DEDUPE_WINDOW_MS)
    })
}
