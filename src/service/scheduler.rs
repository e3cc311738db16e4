//! Periodic capture.
//!
//! [`CaptureScheduler::start`] spawns a task that captures a workspace on a
//! [`Schedule`]: a fixed interval or a cron expression evaluated in a time
//! zone. Each tick either stores a fresh snapshot or reports the workspace
//! unchanged; both outcomes reach subscribers through the
//! [`EventBus`](crate::domain::EventBus) owned by the [`BackupService`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use super::backup_service::BackupService;
use super::builder::CaptureOptions;
use crate::domain::Snapshot;
use crate::error::BackupError;
use crate::remote::WorkspaceApi;

/// When scheduled captures run.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Every interval, starting immediately.
    Every(Duration),
    /// At each time matched by `expr`, read as wall-clock time in `tz`.
    Cron {
        /// Parsed expression (seconds field included).
        expr: cron::Schedule,
        /// Zone the expression is evaluated in.
        tz: Tz,
    },
}

impl Schedule {
    /// Parses a cron expression and an optional IANA zone name (UTC when
    /// absent).
    ///
    /// Five-field expressions (minute first) are accepted and fire at
    /// second zero.
    ///
    /// # Errors
    ///
    /// [`BackupError::Validation`] for a malformed expression or an unknown
    /// zone.
    pub fn cron(expr: &str, timezone: Option<&str>) -> Result<Self, BackupError> {
        let expr = expr.trim();
        let normalized = if expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        };
        let parsed = cron::Schedule::from_str(&normalized)
            .map_err(|e| BackupError::Validation(format!("cron expression {expr:?}: {e}")))?;
        let tz = match timezone.map(str::trim).filter(|t| !t.is_empty()) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| BackupError::Validation(format!("time zone {name:?}: {e}")))?,
            None => Tz::UTC,
        };
        Ok(Self::Cron { expr: parsed, tz })
    }

    /// Returns the first cron fire time strictly after `after`, or `None`
    /// for interval schedules and exhausted expressions.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Every(_) => None,
            Self::Cron { expr, tz } => expr
                .after(&after.with_timezone(tz))
                .next()
                .map(|next| next.with_timezone(&Utc)),
        }
    }

    fn trigger(&self) -> Trigger {
        match self {
            Self::Every(interval) => {
                let mut ticker = tokio::time::interval((*interval).max(Duration::from_millis(1)));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Trigger::Interval(ticker)
            }
            Self::Cron { .. } => Trigger::Cron {
                schedule: self.clone(),
                cursor: Utc::now(),
            },
        }
    }
}

impl From<Duration> for Schedule {
    fn from(interval: Duration) -> Self {
        Self::Every(interval)
    }
}

enum Trigger {
    Interval(Interval),
    Cron {
        schedule: Schedule,
        /// Last fire time; the next one is strictly later.
        cursor: DateTime<Utc>,
    },
}

impl Trigger {
    /// Waits for the next fire time. `false` once none remains.
    async fn wait(&mut self) -> bool {
        match self {
            Self::Interval(ticker) => {
                ticker.tick().await;
                true
            }
            Self::Cron { schedule, cursor } => {
                let base = (*cursor).max(Utc::now());
                let Some(next) = schedule.next_after(base) else {
                    return false;
                };
                let wait = (next - base).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                *cursor = next;
                true
            }
        }
    }
}

/// Handle to a running capture loop.
#[derive(Debug)]
pub struct ScheduleHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Cancels future ticks. A capture already in flight finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "capture scheduler task ended abnormally");
        }
    }

    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns periodic capture loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureScheduler;

impl CaptureScheduler {
    /// Starts capturing `api` on `schedule`. Interval schedules capture
    /// immediately, cron schedules wait for the first matching time.
    ///
    /// With `skip_if_unchanged` each tick compares against the previous
    /// capture and stores nothing when the workspace is unchanged;
    /// otherwise every tick stores a new snapshot. Capture failures are
    /// logged and the loop keeps going.
    #[must_use]
    pub fn start(
        service: BackupService,
        api: Arc<dyn WorkspaceApi>,
        options: CaptureOptions,
        schedule: impl Into<Schedule>,
        skip_if_unchanged: bool,
    ) -> ScheduleHandle {
        let schedule = schedule.into();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut trigger = schedule.trigger();
            let mut previous: Option<Arc<Snapshot>> = None;
            match &schedule {
                Schedule::Every(interval) => {
                    tracing::info!(interval_secs = interval.as_secs(), "capture scheduler started");
                }
                Schedule::Cron { expr, tz } => {
                    tracing::info!(cron = %expr, tz = %tz, "capture scheduler started");
                }
            }

            loop {
                tokio::select! {
                    more = trigger.wait() => {
                        if !more {
                            tracing::info!("cron expression has no further fire times");
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let result = if skip_if_unchanged {
                    service
                        .capture_if_changed(api.as_ref(), &options, previous.clone())
                        .await
                        .map(|outcome| Arc::clone(outcome.snapshot()))
                } else {
                    service.create(api.as_ref(), &options).await
                };

                match result {
                    Ok(snapshot) => previous = Some(snapshot),
                    Err(e) => tracing::warn!(error = %e, "scheduled capture failed"),
                }
            }

            tracing::info!("capture scheduler stopped");
        });

        ScheduleHandle { stop_tx, task }
    }
}
