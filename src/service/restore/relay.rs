//! Replays captured messages through a send-as-original-author relay.
//!
//! One relay identity is provisioned per channel (reused when one with the
//! configured name already exists) and shared by the channel's threads.

use super::report::{SkipReason, StageReport};
use super::RestoreOptions;
use crate::domain::MessageRecord;
use crate::domain::message::{
    MAX_EMBEDS_PER_MESSAGE, MAX_FIELDS_PER_EMBED, MAX_FILES_PER_MESSAGE, MAX_MESSAGE_CONTENT_LEN,
};
use crate::error::BackupError;
use crate::remote::{FileUpload, RelayHandle, RelayMessage, WorkspaceApi};
use crate::service::pacing::pause;
use crate::service::retry::RetryExecutor;

/// Longest display name a relayed message can carry.
pub const MAX_RELAY_USERNAME_LEN: usize = 80;

/// Display name used when the captured author name is empty.
pub const UNKNOWN_AUTHOR: &str = "Unknown User";

/// Selects the `cap` most recent messages carrying content, embeds or
/// files, oldest first. `messages` is newest first, as captured.
#[must_use]
pub fn select_replay(messages: &[MessageRecord], cap: usize) -> Vec<&MessageRecord> {
    let mut selected: Vec<&MessageRecord> = messages
        .iter()
        .filter(|m| m.has_payload())
        .take(cap)
        .collect();
    selected.reverse();
    selected
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Relay bound to one channel.
#[derive(Debug)]
pub(crate) struct ChannelRelay<'a> {
    api: &'a dyn WorkspaceApi,
    retry: RetryExecutor,
    options: &'a RestoreOptions,
    channel_id: String,
    handle: Option<RelayHandle>,
}

impl<'a> ChannelRelay<'a> {
    pub(crate) fn new(
        api: &'a dyn WorkspaceApi,
        retry: RetryExecutor,
        options: &'a RestoreOptions,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            retry,
            options,
            channel_id: channel_id.into(),
            handle: None,
        }
    }

    async fn handle(&mut self) -> Result<RelayHandle, BackupError> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        let existing = self
            .api
            .list_relays()
            .await
            .ok()
            .and_then(|relays| {
                relays.into_iter().find(|r| {
                    r.channel_id == self.channel_id && r.name == self.options.relay_name
                })
            });
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let channel_id = self.channel_id.as_str();
                let name = self.options.relay_name.as_str();
                self.retry
                    .run("create_relay", || self.api.create_relay(channel_id, name))
                    .await?
            }
        };
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Replays the selected messages into the channel, or into `thread_id`.
    pub(crate) async fn replay(
        &mut self,
        messages: &[&MessageRecord],
        thread_id: Option<&str>,
        report: &mut StageReport,
    ) {
        if messages.is_empty() {
            return;
        }
        let handle = match self.handle().await {
            Ok(handle) => handle,
            Err(err) => {
                for message in messages {
                    report.skip(
                        format!("message from {} in {}", message.username, self.channel_id),
                        SkipReason::Failed(format!("relay unavailable: {err}")),
                    );
                }
                return;
            }
        };
        let target = thread_id.unwrap_or(&self.channel_id).to_string();

        for (i, message) in messages.iter().enumerate() {
            if i > 0 {
                pause(self.options.pacing.message).await;
            }
            let outgoing = self.outgoing(message, thread_id);
            let sent = self
                .retry
                .run("relay_send", || self.api.relay_send(&handle, outgoing.clone()))
                .await;
            let message_id = match sent {
                Ok(id) => id,
                Err(err) => {
                    report.skip(
                        format!("message from {} in {target}", message.username),
                        SkipReason::Failed(err.to_string()),
                    );
                    continue;
                }
            };
            report.applied();
            if message.pinned {
                let pinned = self
                    .retry
                    .run("pin_message", || self.api.pin_message(&target, &message_id))
                    .await;
                if let Err(err) = pinned {
                    report.skip(
                        format!("pin of message {message_id} in {target}"),
                        SkipReason::Failed(err.to_string()),
                    );
                }
            }
        }
    }

    fn outgoing(&self, message: &MessageRecord, thread_id: Option<&str>) -> RelayMessage {
        let content = truncate(&message.content, MAX_MESSAGE_CONTENT_LEN);
        let username = truncate(message.username.trim(), MAX_RELAY_USERNAME_LEN);
        RelayMessage {
            content: (!content.is_empty()).then_some(content),
            username: if username.is_empty() {
                UNKNOWN_AUTHOR.to_string()
            } else {
                username
            },
            avatar_url: message.avatar_url.clone(),
            embeds: message
                .embeds
                .iter()
                .take(MAX_EMBEDS_PER_MESSAGE)
                .map(|embed| {
                    let mut embed = embed.clone();
                    embed.fields.truncate(MAX_FIELDS_PER_EMBED);
                    embed
                })
                .collect(),
            files: message
                .files
                .iter()
                .take(MAX_FILES_PER_MESSAGE)
                .map(|f| FileUpload {
                    name: f.name.clone(),
                    data: f.to_upload(),
                })
                .collect(),
            allowed_mentions: self.options.allowed_mentions.clone(),
            thread_id: thread_id.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn message(content: &str) -> MessageRecord {
        MessageRecord {
            username: "ann".into(),
            avatar_url: None,
            content: content.into(),
            embeds: Vec::new(),
            files: Vec::new(),
            pinned: false,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn selects_most_recent_qualifying_oldest_first() {
        // newest first, as captured
        let captured: Vec<MessageRecord> = (0..25)
            .rev()
            .map(|i| {
                if i % 5 == 0 {
                    message("")
                } else {
                    message(&format!("m{i}"))
                }
            })
            .collect();
        let selected = select_replay(&captured, 10);
        let contents: Vec<&str> = selected.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["m13", "m14", "m16", "m17", "m18", "m19", "m21", "m22", "m23", "m24"]
        );
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 80), "ok");
    }
}
