//! Best-effort wipe of a target workspace before a restore.
//!
//! Nothing here propagates: every failed read or delete is recorded as a
//! skipped item and the wipe carries on.

use super::report::{SkipReason, Stage, StageReport};
use crate::remote::{WorkspaceApi, WorkspaceEdit, WorkspaceFeature, WorkspaceInfo};
use crate::service::retry::RetryExecutor;

/// AFK timeout restored by the wipe, in seconds.
pub const BASELINE_AFK_TIMEOUT_SECS: u32 = 300;

/// Default notification level "only mentions".
pub const NOTIFY_ONLY_MENTIONS: u8 = 1;

/// System channel flags suppressing every system message kind.
pub const SUPPRESS_ALL_SYSTEM_MESSAGES: u32 = 0b1111;

/// Deletes roles (implicit and managed ones excluded), channels (community
/// channels excluded), emoji, relays and bans, then resets workspace
/// settings to a bare baseline.
pub async fn clear_workspace(api: &dyn WorkspaceApi, retry: RetryExecutor) -> StageReport {
    let mut report = StageReport::new(Stage::Clear);
    let info = match api.workspace().await {
        Ok(info) => Some(info),
        Err(err) => {
            report.skip("workspace settings", SkipReason::Failed(err.to_string()));
            None
        }
    };

    match api.list_roles().await {
        Ok(roles) => {
            for role in roles.iter().filter(|r| !r.is_everyone && !r.managed) {
                let result = retry.run("delete_role", || api.delete_role(&role.id)).await;
                record(&mut report, format!("role {}", role.name), result);
            }
        }
        Err(err) => report.skip("roles", SkipReason::Failed(err.to_string())),
    }

    match api.list_channels().await {
        Ok(channels) => {
            for channel in channels {
                if info.as_ref().is_some_and(|i| is_community_channel(i, &channel.id)) {
                    tracing::debug!(channel_id = %channel.id, "community channel kept");
                    continue;
                }
                let result = retry
                    .run("delete_channel", || api.delete_channel(&channel.id))
                    .await;
                record(&mut report, format!("channel #{}", channel.name), result);
            }
        }
        Err(err) => report.skip("channels", SkipReason::Failed(err.to_string())),
    }

    match api.list_emojis().await {
        Ok(emojis) => {
            for emoji in emojis {
                let result = retry.run("delete_emoji", || api.delete_emoji(&emoji.id)).await;
                record(&mut report, format!("emoji :{}:", emoji.name), result);
            }
        }
        Err(err) => report.skip("emojis", SkipReason::Failed(err.to_string())),
    }

    match api.list_relays().await {
        Ok(relays) => {
            for relay in relays {
                let result = retry.run("delete_relay", || api.delete_relay(&relay.id)).await;
                record(&mut report, format!("relay {}", relay.name), result);
            }
        }
        Err(err) => report.skip("relays", SkipReason::Failed(err.to_string())),
    }

    match api.list_bans().await {
        Ok(bans) => {
            for ban in bans {
                let result = retry.run("unban", || api.unban(&ban.user_id)).await;
                record(&mut report, format!("ban {}", ban.user_id), result);
            }
        }
        Err(err) => report.skip("bans", SkipReason::Failed(err.to_string())),
    }

    let community = info
        .as_ref()
        .is_some_and(|i| i.has_feature(WorkspaceFeature::Community));
    for edit in baseline_edits(community) {
        let label = edit.label();
        let result = retry
            .run("edit_workspace", || api.edit_workspace(edit.clone()))
            .await;
        record(&mut report, format!("reset {label}"), result);
    }

    tracing::info!(
        applied = report.applied,
        skipped = report.skipped.len(),
        "workspace cleared"
    );
    report
}

/// Settings applied by the wipe. Content filter and verification level are
/// only reset on workspaces without the community feature.
#[must_use]
pub fn baseline_edits(community: bool) -> Vec<WorkspaceEdit> {
    let mut edits = vec![
        WorkspaceEdit::AfkChannel(None),
        WorkspaceEdit::AfkTimeout(BASELINE_AFK_TIMEOUT_SECS),
        WorkspaceEdit::Icon(None),
        WorkspaceEdit::Banner(None),
        WorkspaceEdit::Splash(None),
        WorkspaceEdit::DefaultMessageNotifications(NOTIFY_ONLY_MENTIONS),
        WorkspaceEdit::Widget {
            enabled: false,
            channel_id: None,
        },
    ];
    if !community {
        edits.push(WorkspaceEdit::ExplicitContentFilter(0));
        edits.push(WorkspaceEdit::VerificationLevel(0));
    }
    edits.push(WorkspaceEdit::SystemChannel(None));
    edits.push(WorkspaceEdit::SystemChannelFlags(SUPPRESS_ALL_SYSTEM_MESSAGES));
    edits
}

fn is_community_channel(info: &WorkspaceInfo, channel_id: &str) -> bool {
    info.has_feature(WorkspaceFeature::Community)
        && [&info.rules_channel, &info.public_updates_channel]
            .into_iter()
            .flatten()
            .any(|c| c.id == channel_id)
}

fn record<E: std::fmt::Display>(report: &mut StageReport, item: String, result: Result<(), E>) {
    match result {
        Ok(()) => report.applied(),
        Err(err) => report.skip(item, SkipReason::Failed(err.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{ChannelKind, ImageData};
    use crate::remote::{ChannelRef, ChannelSpec, InMemoryWorkspace, RoleSpec};
    use crate::service::retry::RetryPolicy;

    fn retry() -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::new(1, std::time::Duration::ZERO))
    }

    #[test]
    fn community_workspaces_keep_filter_and_verification() {
        let plain = baseline_edits(false);
        let community = baseline_edits(true);
        assert!(plain.contains(&WorkspaceEdit::VerificationLevel(0)));
        assert!(!community.contains(&WorkspaceEdit::VerificationLevel(0)));
        assert!(!community.contains(&WorkspaceEdit::ExplicitContentFilter(0)));
        assert!(community.contains(&WorkspaceEdit::SystemChannelFlags(
            SUPPRESS_ALL_SYSTEM_MESSAGES
        )));
    }

    #[tokio::test]
    async fn wipes_everything_deletable() {
        let ws = Arc::new(InMemoryWorkspace::new("1", "guild"));
        let _ = ws
            .create_role(RoleSpec {
                name: "mods".into(),
                color: 0,
                hoist: false,
                permissions: 0,
                mentionable: false,
                icon: None,
                unicode_emoji: None,
            })
            .await;
        let _ = ws.add_managed_role("bot").await;
        let Ok(rules) = ws
            .create_channel(ChannelSpec::new("rules", ChannelKind::Text))
            .await
        else {
            panic!("channel");
        };
        let _ = ws
            .create_channel(ChannelSpec::new("chat", ChannelKind::Text))
            .await;
        let _ = ws
            .create_emoji("party", ImageData::Bytes(vec![1]))
            .await;
        let _ = ws.ban("42", "spam").await;
        let reference = ChannelRef {
            id: rules.id.clone(),
            name: rules.name.clone(),
        };
        ws.update_info(move |i| {
            i.features.push(WorkspaceFeature::Community);
            i.rules_channel = Some(reference);
        })
        .await;

        let report = clear_workspace(ws.as_ref(), retry()).await;
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);

        let Ok(roles) = ws.list_roles().await else {
            panic!("roles");
        };
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"@everyone"));
        assert!(names.contains(&"bot"));

        let Ok(channels) = ws.list_channels().await else {
            panic!("channels");
        };
        assert_eq!(channels.len(), 1);
        assert_eq!(channels.first().map(|c| c.id.as_str()), Some(rules.id.as_str()));
        assert!(matches!(ws.list_emojis().await, Ok(e) if e.is_empty()));
        assert!(matches!(ws.list_bans().await, Ok(b) if b.is_empty()));
        assert_eq!(ws.system_channel_flags().await, SUPPRESS_ALL_SYSTEM_MESSAGES);
    }
}
