//! Per-stage accounting of what a restore applied and what it skipped.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::Snapshot;

/// Restore pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Best-effort wipe of the target.
    Clear,
    /// Workspace-level settings.
    Config,
    /// Role hierarchy.
    Roles,
    /// Member role assignments.
    Members,
    /// Categories, channels, threads and messages.
    Channels,
    /// AFK channel and timeout.
    Afk,
    /// Custom emoji.
    Emojis,
    /// Bans.
    Bans,
    /// Widget settings.
    Widget,
    /// Onboarding flow.
    Onboarding,
    /// Scheduled events.
    ScheduledEvents,
}

impl Stage {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Config => "config",
            Self::Roles => "roles",
            Self::Members => "members",
            Self::Channels => "channels",
            Self::Afk => "afk",
            Self::Emojis => "emojis",
            Self::Bans => "bans",
            Self::Widget => "widget",
            Self::Onboarding => "onboarding",
            Self::ScheduledEvents => "scheduled_events",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The remote call failed.
    Failed(String),
    /// A stored reference did not resolve on the target.
    Unresolved(String),
    /// The entity no longer exists on the target.
    Absent,
    /// A platform cap was reached.
    LimitReached,
    /// The stored record cannot be applied as is.
    InvalidData(String),
    /// An equivalent entity already exists.
    AlreadyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Unresolved(r) => write!(f, "unresolved reference: {r}"),
            Self::Absent => f.write_str("absent on target"),
            Self::LimitReached => f.write_str("limit reached"),
            Self::InvalidData(e) => write!(f, "invalid data: {e}"),
            Self::AlreadyExists => f.write_str("already exists"),
        }
    }
}

/// One skipped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// Human-readable item label.
    pub item: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// The stage.
    pub stage: Stage,
    /// Items applied.
    pub applied: usize,
    /// Items skipped.
    pub skipped: Vec<SkippedItem>,
}

impl StageReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new(stage: Stage) -> Self {
        Self {
            stage,
            applied: 0,
            skipped: Vec::new(),
        }
    }

    /// Counts one applied item.
    pub fn applied(&mut self) {
        self.applied += 1;
    }

    /// Records a skipped item.
    pub fn skip(&mut self, item: impl Into<String>, reason: SkipReason) {
        let item = item.into();
        tracing::warn!(stage = %self.stage, item = %item, reason = %reason, "restore item skipped");
        self.skipped.push(SkippedItem { item, reason });
    }

    /// Folds another partial report for the same stage into this one.
    pub fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.skipped.extend(other.skipped);
    }
}

/// Outcome of a whole restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// The snapshot that was applied.
    pub snapshot: Arc<Snapshot>,
    /// One report per stage that ran, in order.
    pub stages: Vec<StageReport>,
}

impl RestoreReport {
    /// Returns the report of `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Total skipped items across stages.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.stages.iter().map(|s| s.skipped.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates() {
        let mut a = StageReport::new(Stage::Channels);
        a.applied();
        let mut b = StageReport::new(Stage::Channels);
        b.applied();
        b.skip("#chat", SkipReason::Failed("boom".into()));
        a.merge(b);
        assert_eq!(a.applied, 2);
        assert_eq!(a.skipped.len(), 1);
    }

    #[test]
    fn skip_reason_serializes_tagged() {
        let json = serde_json::to_value(SkipReason::Unresolved("role mods".into()))
            .unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({"kind": "unresolved", "detail": "role mods"})
        );
        let json = serde_json::to_value(SkipReason::Absent).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"kind": "absent"}));
    }
}
