//! Fixed self-throttling delays between paced remote mutations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delays inserted between successive items of the sequential restore
/// loops and between message history pages during capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Between role creations.
    pub role: Duration,
    /// Between member role updates.
    pub member: Duration,
    /// Between emoji creations.
    pub emoji: Duration,
    /// Between bans.
    pub ban: Duration,
    /// Between relayed messages.
    pub message: Duration,
    /// Between message history pages.
    pub message_page: Duration,
}

impl PacingConfig {
    /// No delays at all.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            role: Duration::ZERO,
            member: Duration::ZERO,
            emoji: Duration::ZERO,
            ban: Duration::ZERO,
            message: Duration::ZERO,
            message_page: Duration::ZERO,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            role: Duration::from_millis(250),
            member: Duration::from_millis(300),
            emoji: Duration::from_millis(500),
            ban: Duration::from_millis(1000),
            message: Duration::from_millis(1000),
            message_page: Duration::from_millis(100),
        }
    }
}

/// Sleeps for `delay` unless it is zero.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
