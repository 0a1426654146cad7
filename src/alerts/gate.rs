//! Alert evaluation and cooldown gate

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::notifier::Notifier;
use crate::history::{CheckRecord, HistoryState};

/// Elapsed time above which a check counts as slow
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 5000;

/// Minimum spacing between webhook deliveries, across all alert kinds
pub const DEFAULT_COOLDOWN_SECS: i64 = 5 * 60;

/// What triggered an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Failure,
    Slow,
}

/// One alert condition found in a cycle's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub text: String,
}

/// What happened to one alert message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Inside the cooldown; only logged
    Suppressed { remaining_secs: i64 },
    /// Passed the gate, no webhook configured
    Recorded,
    /// Passed the gate and the webhook accepted it
    Delivered,
    /// Passed the gate but the POST failed; not retried
    DeliveryFailed(String),
}

impl NotifyOutcome {
    /// Whether a webhook POST was attempted
    pub fn attempted_delivery(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered | NotifyOutcome::DeliveryFailed(_))
    }
}

/// Turns a batch of check records into rate-limited notifications
#[derive(Debug, Clone)]
pub struct AlertGate {
    notifier: Notifier,
    cooldown: Duration,
    slow_threshold_ms: u64,
}

impl AlertGate {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_slow_threshold_ms(mut self, threshold: u64) -> Self {
        self.slow_threshold_ms = threshold;
        self
    }

    /// Alert conditions present in one cycle's records. Failure and slow
    /// conditions are independent, so both may appear.
    pub fn evaluate(&self, batch: &[CheckRecord]) -> Vec<AlertMessage> {
        let mut messages = Vec::new();

        let failures: Vec<String> = batch
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.endpoint,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        if !failures.is_empty() {
            messages.push(AlertMessage {
                kind: AlertKind::Failure,
                text: format!("Endpoint failures: {}", failures.join(", ")),
            });
        }

        let slow: Vec<String> = batch
            .iter()
            .filter(|r| r.elapsed_ms > self.slow_threshold_ms)
            .map(|r| format!("{}: {}ms", r.endpoint, r.elapsed_ms))
            .collect();
        if !slow.is_empty() {
            messages.push(AlertMessage {
                kind: AlertKind::Slow,
                text: format!("Slow responses: {}", slow.join(", ")),
            });
        }

        messages
    }

    /// Seconds of cooldown left at `now`, if any
    fn cooldown_remaining(&self, state: &HistoryState, now: DateTime<Utc>) -> Option<i64> {
        let last = state.last_alert?;
        let since = now - last;
        (since < self.cooldown).then(|| (self.cooldown - since).num_seconds())
    }

    /// Log a single message and deliver it unless the cooldown is active.
    pub async fn notify(
        &self,
        message: &AlertMessage,
        state: &mut HistoryState,
        now: DateTime<Utc>,
    ) -> NotifyOutcome {
        let open = self.cooldown_remaining(state, now);
        self.dispatch(message, open, state, now).await
    }

    /// Evaluate a cycle's batch and notify every condition found.
    ///
    /// The cooldown is checked once per cycle: when it has elapsed, every
    /// message of this cycle is delivered and the last-alert marker moves
    /// once, to `now`.
    pub async fn process(
        &self,
        batch: &[CheckRecord],
        state: &mut HistoryState,
        now: DateTime<Utc>,
    ) -> Vec<NotifyOutcome> {
        let messages = self.evaluate(batch);
        if messages.is_empty() {
            return Vec::new();
        }

        let remaining = self.cooldown_remaining(state, now);
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.dispatch(message, remaining, state, now).await);
        }
        outcomes
    }

    async fn dispatch(
        &self,
        message: &AlertMessage,
        cooldown_remaining: Option<i64>,
        state: &mut HistoryState,
        now: DateTime<Utc>,
    ) -> NotifyOutcome {
        tracing::warn!(kind = ?message.kind, "ALERT: {}", message.text);

        if let Some(remaining_secs) = cooldown_remaining {
            tracing::info!(remaining_secs, "Alert delivery suppressed by cooldown");
            return NotifyOutcome::Suppressed { remaining_secs };
        }

        state.record_alert(now);

        match self.notifier.send(&message.text, now).await {
            Ok(true) => NotifyOutcome::Delivered,
            Ok(false) => NotifyOutcome::Recorded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to deliver alert webhook");
                NotifyOutcome::DeliveryFailed(e.to_string())
            }
        }
    }
}
