//! Channel stage: categories, channels, threads and message replay.
//!
//! Categories are created in snapshot order and a failure there aborts the
//! stage. Each category's children, then the uncategorized channels, are
//! restored with bounded concurrency; sibling order is not preserved during
//! creation, positions are set explicitly afterwards.

use std::collections::HashMap;

use futures_util::stream::{self, StreamExt};

use super::RestoreOptions;
use super::relay::{ChannelRelay, select_replay, truncate};
use super::report::{SkipReason, Stage, StageReport};
use crate::domain::message::MAX_MESSAGE_CONTENT_LEN;
use crate::domain::{
    ChannelKind, ChannelRecord, CommunityLinks, ForumChannelRecord, PermissionRecord, Snapshot,
    TextChannelRecord,
};
use crate::error::BackupError;
use crate::remote::{
    ChannelRef, ChannelSpec, Overwrite, OverwriteKind, ThreadSpec, WorkspaceApi,
    WorkspaceFeature, WorkspaceInfo,
};
use crate::service::retry::RetryExecutor;

/// Starter post of a forum thread whose history has nothing to replay.
pub const EMPTY_FORUM_STARTER: &str = " ";

pub(super) async fn restore_channels(
    api: &dyn WorkspaceApi,
    retry: RetryExecutor,
    snapshot: &Snapshot,
    info: &WorkspaceInfo,
    options: &RestoreOptions,
) -> Result<StageReport, BackupError> {
    let mut role_ids: HashMap<String, String> = HashMap::new();
    for role in api.list_roles().await? {
        role_ids.entry(role.name).or_insert(role.id);
    }
    let ctx = ChannelContext {
        api,
        retry,
        options,
        info,
        community: snapshot.community.as_ref(),
        role_ids,
    };
    let concurrency = options.channel_concurrency.max(1);
    let mut report = StageReport::new(Stage::Channels);

    for category in &snapshot.channels.categories {
        let spec = ChannelSpec::new(category.name.as_str(), ChannelKind::Category);
        let live = retry
            .run("create_channel", || api.create_channel(spec.clone()))
            .await?;
        tracing::debug!(channel_id = %live.id, name = %live.name, "category created");
        report.applied();
        ctx.apply_layout(
            &live.id,
            &category.name,
            &category.permissions,
            category.position,
            &mut report,
        )
        .await;

        let mut children = stream::iter(
            category
                .children
                .iter()
                .map(|child| ctx.restore_channel(child, Some(live.id.clone()))),
        )
        .buffer_unordered(concurrency);
        while let Some(child) = children.next().await {
            report.merge(child);
        }
    }

    let mut others = stream::iter(
        snapshot
            .channels
            .others
            .iter()
            .map(|channel| ctx.restore_channel(channel, None)),
    )
    .buffer_unordered(concurrency);
    while let Some(other) = others.next().await {
        report.merge(other);
    }
    Ok(report)
}

#[derive(Debug)]
struct ChannelContext<'a> {
    api: &'a dyn WorkspaceApi,
    retry: RetryExecutor,
    options: &'a RestoreOptions,
    info: &'a WorkspaceInfo,
    community: Option<&'a CommunityLinks>,
    role_ids: HashMap<String, String>,
}

impl ChannelContext<'_> {
    async fn restore_channel(&self, record: &ChannelRecord, parent_id: Option<String>) -> StageReport {
        let mut report = StageReport::new(Stage::Channels);
        let label = format!("channel #{}", record.name());
        let spec = self.spec_for(record, parent_id);
        let base = record.base();

        if let Some(existing) = self.existing_community_channel(record) {
            let result = self
                .retry
                .run("edit_channel", || self.api.edit_channel(&existing.id, spec.clone()))
                .await;
            match result {
                Ok(_) => {
                    tracing::debug!(channel_id = %existing.id, "community channel updated in place");
                    report.applied();
                    self.apply_layout(
                        &existing.id,
                        &base.name,
                        &base.permissions,
                        base.position,
                        &mut report,
                    )
                    .await;
                }
                Err(err) => report.skip(label, SkipReason::Failed(err.to_string())),
            }
            return report;
        }

        let live = match self
            .retry
            .run("create_channel", || self.api.create_channel(spec.clone()))
            .await
        {
            Ok(live) => live,
            Err(err) => {
                report.skip(label, SkipReason::Failed(err.to_string()));
                return report;
            }
        };
        if live.kind != record.kind() {
            tracing::info!(
                name = %live.name,
                from = record.kind().as_str(),
                to = live.kind.as_str(),
                "channel kind downgraded"
            );
        }
        report.applied();
        self.apply_layout(&live.id, &base.name, &base.permissions, base.position, &mut report)
            .await;

        match record {
            ChannelRecord::Text(text) | ChannelRecord::Announcement(text) => {
                self.replay_text(&live.id, text, &mut report).await;
            }
            ChannelRecord::Forum(forum) => self.replay_forum(&live.id, forum, &mut report).await,
            ChannelRecord::Voice(_) | ChannelRecord::Stage(_) => {}
        }
        report
    }

    /// Returns the live rules or public-updates channel when `record` is
    /// the snapshot's counterpart and the target has the community feature.
    fn existing_community_channel(&self, record: &ChannelRecord) -> Option<&ChannelRef> {
        let links = self.community?;
        if !self.info.has_feature(WorkspaceFeature::Community) {
            return None;
        }
        let (id, name) = (record.channel_id(), record.name());
        if links.is_rules(id, name) {
            return self.info.rules_channel.as_ref();
        }
        if links.is_public_updates(id, name) {
            return self.info.public_updates_channel.as_ref();
        }
        None
    }

    fn target_kind(&self, kind: ChannelKind) -> ChannelKind {
        match kind {
            ChannelKind::Announcement if !self.info.has_feature(WorkspaceFeature::News) => {
                ChannelKind::Text
            }
            ChannelKind::Stage if !self.info.has_feature(WorkspaceFeature::Community) => {
                ChannelKind::Voice
            }
            other => other,
        }
    }

    fn spec_for(&self, record: &ChannelRecord, parent_id: Option<String>) -> ChannelSpec {
        let kind = self.target_kind(record.kind());
        let tier = self.info.premium_tier;
        let mut spec = ChannelSpec {
            parent_id,
            ..ChannelSpec::new(record.name(), kind)
        };
        match record {
            ChannelRecord::Text(c) | ChannelRecord::Announcement(c) => {
                spec.topic.clone_from(&c.topic);
                spec.nsfw = c.nsfw;
                spec.rate_limit_per_user = c.rate_limit_per_user;
            }
            ChannelRecord::Voice(c) => {
                spec.bitrate = Some(tier.clamp_bitrate(c.bitrate));
                spec.user_limit = Some(c.user_limit);
            }
            ChannelRecord::Stage(c) => {
                spec.bitrate = Some(tier.clamp_bitrate(c.bitrate));
                spec.user_limit = Some(c.user_limit);
                if kind == ChannelKind::Stage {
                    spec.topic.clone_from(&c.topic);
                }
            }
            ChannelRecord::Forum(c) => {
                spec.topic.clone_from(&c.topic);
                spec.nsfw = c.nsfw;
                spec.rate_limit_per_user = c.rate_limit_per_user;
                spec.available_tags.clone_from(&c.available_tags);
                spec.default_reaction.clone_from(&c.default_reaction);
            }
        }
        spec
    }

    /// Sets role overwrites (by role name) and the captured position.
    async fn apply_layout(
        &self,
        channel_id: &str,
        name: &str,
        permissions: &[PermissionRecord],
        position: i64,
        report: &mut StageReport,
    ) {
        let mut overwrites = Vec::with_capacity(permissions.len());
        for permission in permissions {
            let label = format!("overwrite for {} on #{name}", permission.role_name);
            let Some(role_id) = self.role_ids.get(&permission.role_name) else {
                report.skip(
                    label,
                    SkipReason::Unresolved(format!("role {}", permission.role_name)),
                );
                continue;
            };
            match (
                permission.allow.trim().parse::<u64>(),
                permission.deny.trim().parse::<u64>(),
            ) {
                (Ok(allow), Ok(deny)) => overwrites.push(Overwrite {
                    id: role_id.clone(),
                    kind: OverwriteKind::Role,
                    allow,
                    deny,
                }),
                _ => report.skip(
                    label,
                    SkipReason::InvalidData(format!(
                        "allow {:?} deny {:?}",
                        permission.allow, permission.deny
                    )),
                ),
            }
        }

        if !overwrites.is_empty() {
            let result = self
                .retry
                .run("set_overwrites", || {
                    self.api.set_overwrites(channel_id, overwrites.clone())
                })
                .await;
            if let Err(err) = result {
                report.skip(
                    format!("overwrites on #{name}"),
                    SkipReason::Failed(err.to_string()),
                );
            }
        }

        let result = self
            .retry
            .run("set_channel_position", || {
                self.api.set_channel_position(channel_id, position)
            })
            .await;
        if let Err(err) = result {
            report.skip(
                format!("position of #{name}"),
                SkipReason::Failed(err.to_string()),
            );
        }
    }

    async fn replay_text(&self, channel_id: &str, record: &TextChannelRecord, report: &mut StageReport) {
        let cap = self.options.max_messages_per_channel;
        let mut relay = ChannelRelay::new(self.api, self.retry, self.options, channel_id);
        relay
            .replay(&select_replay(&record.messages, cap), None, report)
            .await;

        for thread in &record.threads {
            let spec = ThreadSpec {
                name: thread.name.clone(),
                auto_archive_minutes: thread.auto_archive_minutes,
                starter_message: None,
            };
            let live = match self
                .retry
                .run("create_thread", || self.api.create_thread(channel_id, spec.clone()))
                .await
            {
                Ok(live) => live,
                Err(err) => {
                    report.skip(
                        format!("thread {} in {channel_id}", thread.name),
                        SkipReason::Failed(err.to_string()),
                    );
                    continue;
                }
            };
            report.applied();
            relay
                .replay(&select_replay(&thread.messages, cap), Some(&live.id), report)
                .await;
        }
    }

    /// Forum posts need a starter: the oldest replayed message provides it
    /// and the rest go through the relay.
    async fn replay_forum(&self, channel_id: &str, record: &ForumChannelRecord, report: &mut StageReport) {
        let cap = self.options.max_messages_per_channel;
        let mut relay = ChannelRelay::new(self.api, self.retry, self.options, channel_id);

        for thread in &record.threads {
            let selected = select_replay(&thread.messages, cap);
            let (starter, rest) = match selected.split_first() {
                Some((first, rest)) => (forum_starter(&first.content), rest),
                None => (EMPTY_FORUM_STARTER.to_string(), &[][..]),
            };
            let spec = ThreadSpec {
                name: thread.name.clone(),
                auto_archive_minutes: thread.auto_archive_minutes,
                starter_message: Some(starter),
            };
            let live = match self
                .retry
                .run("create_thread", || self.api.create_thread(channel_id, spec.clone()))
                .await
            {
                Ok(live) => live,
                Err(err) => {
                    report.skip(
                        format!("forum post {} in {channel_id}", thread.name),
                        SkipReason::Failed(err.to_string()),
                    );
                    continue;
                }
            };
            report.applied();
            relay.replay(rest, Some(&live.id), report).await;
        }
    }
}

fn forum_starter(content: &str) -> String {
    let content = truncate(content, MAX_MESSAGE_CONTENT_LEN);
    if content.trim().is_empty() {
        EMPTY_FORUM_STARTER.to_string()
    } else {
        content
    }
}
