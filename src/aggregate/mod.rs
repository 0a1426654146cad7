//! Daily rollups and the current-status snapshot
//!
//! Rollups are always recomputed from the day's raw records rather than
//! merged incrementally.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::history::{CheckRecord, DailyRollup, EndpointRollup, HistoryState};

/// How many records per endpoint the status view scans back
pub const RECENT_WINDOW_PER_ENDPOINT: usize = 10;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Failure percentage, `100 * (1 - successes / total)`, rounded to two decimals
pub fn error_rate(successes: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * (1.0 - successes as f64 / total as f64))
}

/// Running count/success/elapsed accumulator
#[derive(Debug, Clone, Default)]
struct CheckAccumulator {
    count: usize,
    successes: usize,
    elapsed_sum: u64,
    elapsed_min: Option<u64>,
    elapsed_max: u64,
}

impl CheckAccumulator {
    fn accumulate(&mut self, record: &CheckRecord) {
        self.count += 1;
        if record.success {
            self.successes += 1;
        }
        self.elapsed_sum = self.elapsed_sum.saturating_add(record.elapsed_ms);
        self.elapsed_max = self.elapsed_max.max(record.elapsed_ms);
        self.elapsed_min = Some(
            self.elapsed_min
                .map_or(record.elapsed_ms, |m| m.min(record.elapsed_ms)),
        );
    }

    fn avg_elapsed(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        (self.elapsed_sum as f64 / self.count as f64).round() as u64
    }

    fn to_endpoint_rollup(&self) -> EndpointRollup {
        EndpointRollup {
            checks: self.count,
            successes: self.successes,
            avg_elapsed_ms: self.avg_elapsed(),
            max_elapsed_ms: self.elapsed_max,
            errors: self.count - self.successes,
        }
    }
}

/// Build the rollup for `date` from that day's records.
/// `None` when there are no records.
pub fn compute_rollup<'a, I>(date: NaiveDate, records: I) -> Option<DailyRollup>
where
    I: IntoIterator<Item = &'a CheckRecord>,
{
    let mut overall = CheckAccumulator::default();
    let mut per_endpoint: BTreeMap<String, CheckAccumulator> = BTreeMap::new();

    for record in records {
        overall.accumulate(record);
        per_endpoint
            .entry(record.endpoint.clone())
            .or_default()
            .accumulate(record);
    }

    if overall.count == 0 {
        return None;
    }

    Some(DailyRollup {
        date,
        total_checks: overall.count,
        successful_checks: overall.successes,
        avg_elapsed_ms: overall.avg_elapsed(),
        max_elapsed_ms: overall.elapsed_max,
        min_elapsed_ms: overall.elapsed_min.unwrap_or(0),
        error_rate: error_rate(overall.successes, overall.count),
        endpoints: per_endpoint
            .iter()
            .map(|(endpoint, acc)| (endpoint.clone(), acc.to_endpoint_rollup()))
            .collect(),
    })
}

/// Recompute the rollup for one UTC day from its records and upsert it.
/// Leaves existing rollups alone when the day has no records.
pub fn recompute_day(state: &mut HistoryState, date: NaiveDate) -> Option<DailyRollup> {
    let rollup = compute_rollup(date, state.checks_on(date))?;
    state.upsert_daily_rollup(rollup.clone());
    Some(rollup)
}

/// Recompute the rollup for `now`'s UTC day
pub fn recompute_today(state: &mut HistoryState, now: DateTime<Utc>) -> Option<DailyRollup> {
    recompute_day(state, now.date_naive())
}

/// Read-only view consumed by the status API and the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Success percentage over the last 24h, two decimals
    pub uptime: String,
    pub avg_response_time: u64,
    /// Failure percentage over the last 24h, two decimals
    pub error_rate: String,
    pub total_checks_24h: usize,
    pub endpoints: BTreeMap<String, CheckRecord>,
    pub last_check: Option<DateTime<Utc>>,
}

/// Summarize the last 24 hours plus the latest result per endpoint.
///
/// With no data in the window the uptime reads "100.00" and the error rate
/// "0.00".
pub fn current_status(state: &HistoryState, endpoint_count: usize, now: DateTime<Utc>) -> StatusSnapshot {
    let mut window = CheckAccumulator::default();
    for record in state.last_24h(now) {
        window.accumulate(record);
    }

    let total = window.count.max(1);
    let failures = window.count - window.successes;
    let uptime = if window.count == 0 {
        100.0
    } else {
        window.successes as f64 / total as f64 * 100.0
    };

    StatusSnapshot {
        uptime: format!("{:.2}", uptime),
        avg_response_time: window.avg_elapsed(),
        error_rate: format!("{:.2}", failures as f64 / total as f64 * 100.0),
        total_checks_24h: window.count,
        endpoints: state.recent_by_endpoint(RECENT_WINDOW_PER_ENDPOINT, endpoint_count),
        last_check: state.latest_check().map(|c| c.timestamp),
    }
}
