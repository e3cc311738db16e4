//! Per-connection subscription manager.
//!
//! Tracks which workspace ids a WebSocket client follows and filters
//! [`BackupEvent`](crate::domain::BackupEvent)s server-side.

use std::collections::HashSet;

/// Manages the set of workspace subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed workspace ids. Ignored while `subscribe_all` is set.
    workspace_ids: HashSet<String>,
    /// Whether the client follows every workspace (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds workspace ids; `wildcard` follows everything.
    pub fn subscribe(&mut self, ids: &[String], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.workspace_ids.extend(ids.iter().cloned());
    }

    /// Removes workspace ids. `wildcard` also drops the wildcard.
    pub fn unsubscribe(&mut self, ids: &[String], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.workspace_ids.remove(id);
        }
    }

    /// Returns `true` if an event about `workspace_id` should be forwarded.
    ///
    /// Events not tied to a workspace (snapshot deletion) reach every
    /// client with at least one subscription.
    #[must_use]
    pub fn matches(&self, workspace_id: Option<&str>) -> bool {
        if self.subscribe_all {
            return true;
        }
        match workspace_id {
            Some(id) => self.workspace_ids.contains(id),
            None => !self.workspace_ids.is_empty(),
        }
    }

    /// Returns the number of explicitly subscribed workspace ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.workspace_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
