//! Check history: raw check records, per-day rollups and retention
//!
//! `HistoryState` is the single persisted aggregate. It is pure data with the
//! append/query/upsert/prune operations; `HistoryStore` wraps it with the
//! publication lock and the persistence port.

pub mod persistence;
pub mod store;

pub use persistence::{HistoryPersistence, JsonFileStore, PersistenceError};
pub use store::HistoryStore;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Retained history span
pub const RETENTION_DAYS: i64 = 7;

/// Result of probing one endpoint once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub elapsed_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckRecord {
    /// UTC calendar day the check belongs to
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Per-endpoint statistics within one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRollup {
    pub checks: usize,
    pub successes: usize,
    pub avg_elapsed_ms: u64,
    pub max_elapsed_ms: u64,
    pub errors: usize,
}

/// Aggregated statistics for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub total_checks: usize,
    pub successful_checks: usize,
    pub avg_elapsed_ms: u64,
    pub max_elapsed_ms: u64,
    pub min_elapsed_ms: u64,
    /// Percentage of failed checks, rounded to two decimals
    pub error_rate: f64,
    pub endpoints: BTreeMap<String, EndpointRollup>,
}

/// Counts of entries removed by one retention pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub checks_removed: usize,
    pub rollups_removed: usize,
}

/// Everything the monitor remembers between restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    /// Check log in append order
    #[serde(default)]
    pub checks: Vec<CheckRecord>,
    /// One rollup per day, ascending by date
    #[serde(default)]
    pub daily_stats: Vec<DailyRollup>,
    #[serde(default)]
    pub last_alert: Option<DateTime<Utc>>,
}

impl HistoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the check log. Duplicates are kept.
    pub fn append(&mut self, record: CheckRecord) {
        self.checks.push(record);
    }

    /// Latest record per endpoint, looking only at the trailing
    /// `n * endpoint_count` records. Endpoints with no record inside that
    /// window are absent from the result.
    pub fn recent_by_endpoint(&self, n: usize, endpoint_count: usize) -> BTreeMap<String, CheckRecord> {
        let window = n.saturating_mul(endpoint_count);
        let start = self.checks.len().saturating_sub(window);

        let mut latest = BTreeMap::new();
        for record in &self.checks[start..] {
            latest.insert(record.endpoint.clone(), record.clone());
        }
        latest
    }

    /// Records strictly newer than `cutoff`
    pub fn checks_since(&self, cutoff: DateTime<Utc>) -> Vec<&CheckRecord> {
        self.checks.iter().filter(|c| c.timestamp > cutoff).collect()
    }

    /// Records from the trailing `days * 24h`
    pub fn last_n_days(&self, days: i64, now: DateTime<Utc>) -> Vec<&CheckRecord> {
        self.checks_since(now - Duration::days(days))
    }

    /// Records from the trailing 24 hours
    pub fn last_24h(&self, now: DateTime<Utc>) -> Vec<&CheckRecord> {
        self.checks_since(now - Duration::hours(24))
    }

    /// Records that fall on the given UTC calendar day
    pub fn checks_on(&self, date: NaiveDate) -> Vec<&CheckRecord> {
        self.checks.iter().filter(|c| c.date() == date).collect()
    }

    /// The last `limit` records in chronological order
    pub fn recent_checks(&self, limit: usize) -> &[CheckRecord] {
        let start = self.checks.len().saturating_sub(limit);
        &self.checks[start..]
    }

    pub fn latest_check(&self) -> Option<&CheckRecord> {
        self.checks.last()
    }

    #[cfg(test)]
    pub(crate) fn rollup_for(&self, date: NaiveDate) -> Option<&DailyRollup> {
        self.daily_stats
            .binary_search_by(|r| r.date.cmp(&date))
            .ok()
            .map(|idx| &self.daily_stats[idx])
    }

    /// Replace the rollup for the same date, or insert it keeping ascending
    /// date order.
    pub fn upsert_daily_rollup(&mut self, rollup: DailyRollup) {
        match self.daily_stats.binary_search_by(|r| r.date.cmp(&rollup.date)) {
            Ok(idx) => self.daily_stats[idx] = rollup,
            Err(idx) => self.daily_stats.insert(idx, rollup),
        }
    }

    /// Drop check records older than `now - 7d` and rollups dated before
    /// that cutoff's calendar day.
    pub fn prune(&mut self, now: DateTime<Utc>) -> PruneStats {
        let cutoff = now - Duration::days(RETENTION_DAYS);
        let cutoff_date = cutoff.date_naive();

        let checks_before = self.checks.len();
        self.checks.retain(|c| c.timestamp >= cutoff);

        let rollups_before = self.daily_stats.len();
        self.daily_stats.retain(|r| r.date >= cutoff_date);

        PruneStats {
            checks_removed: checks_before - self.checks.len(),
            rollups_removed: rollups_before - self.daily_stats.len(),
        }
    }

    /// Move the last-alert marker to `at`, never backwards.
    /// Returns whether the marker changed.
    pub fn record_alert(&mut self, at: DateTime<Utc>) -> bool {
        match self.last_alert {
            Some(prev) if prev >= at => false,
            _ => {
                self.last_alert = Some(at);
                true
            }
        }
    }
}
