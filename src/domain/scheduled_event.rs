//! Scheduled event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::ImageRecord;

/// Location used for external events captured without one.
pub const DEFAULT_EXTERNAL_LOCATION: &str = "TBD";

/// Where a scheduled event takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventEntityType {
    /// Hosted in a stage channel.
    StageInstance,
    /// Hosted in a voice channel.
    Voice,
    /// Hosted outside the workspace at a free-form location.
    External,
}

impl EventEntityType {
    /// Returns `true` when the event is bound to a channel.
    #[must_use]
    pub const fn is_channel_bound(self) -> bool {
        matches!(self, Self::StageInstance | Self::Voice)
    }
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEventRecord {
    /// Source-side event id.
    #[serde(default)]
    pub id: Option<String>,
    /// Event name.
    pub name: String,
    /// Event description.
    #[serde(default)]
    pub description: Option<String>,
    /// Scheduled start.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Scheduled end.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Platform privacy level.
    #[serde(default)]
    pub privacy_level: u8,
    /// Hosting kind.
    pub entity_type: EventEntityType,
    /// Source-side channel id for channel-bound events.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Location for external events.
    #[serde(default)]
    pub location: Option<String>,
    /// Cover image.
    #[serde(default)]
    pub image: Option<ImageRecord>,
    /// Platform recurrence rule, kept opaque.
    #[serde(default)]
    pub recurrence_rule: Option<serde_json::Value>,
}
