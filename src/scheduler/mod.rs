//! Check-cycle scheduler
//!
//! One background task owns all mutation of the history: probe every
//! endpoint, append the batch, recompute the rollups it touched, run the alert gate,
//! then prune, publish and persist.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};

use crate::aggregate;
use crate::alerts::{AlertGate, NotifyOutcome};
use crate::history::{CheckRecord, HistoryState, HistoryStore, PruneStats};
use crate::probe::Prober;

/// Outcome of one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub records: Vec<CheckRecord>,
    pub alerts: Vec<NotifyOutcome>,
    /// Retention result, or the persistence error message
    pub persisted: Result<PruneStats, String>,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.success).count()
    }
}

/// Drives the prober over the endpoint set on a fixed interval
pub struct Scheduler {
    store: Arc<HistoryStore>,
    prober: Prober,
    gate: AlertGate,
    endpoints: Vec<String>,
    interval: Duration,
    running: AtomicBool,
    shutdown: Notify,
}

impl Scheduler {
    pub fn new(
        store: Arc<HistoryStore>,
        prober: Prober,
        gate: AlertGate,
        endpoints: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            prober,
            gate,
            endpoints,
            interval,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Run one full cycle. Never fails; persistence errors are logged and
    /// reported, and the next cycle rewrites the file.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut records = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            records.push(self.prober.check(endpoint).await);
        }

        let mut working = self.store.working_copy();
        for record in &records {
            working.append(record.clone());
        }

        let now = Utc::now();
        Self::refresh_rollups(&mut working, &records, now);

        let alerts = self.gate.process(&records, &mut working, now).await;

        let persisted = self
            .store
            .prune_and_persist(working, Utc::now())
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to persist check history");
                e.to_string()
            });

        let report = CycleReport {
            records,
            alerts,
            persisted,
        };
        tracing::info!(
            checked = report.records.len(),
            failed = report.failures(),
            alerts = report.alerts.len(),
            "Check cycle complete"
        );
        report
    }

    /// Recompute every day the batch touched, plus today. A cycle that
    /// straddles midnight UTC stamps records on both days.
    fn refresh_rollups(state: &mut HistoryState, batch: &[CheckRecord], now: DateTime<Utc>) {
        let mut days: Vec<_> = batch.iter().map(CheckRecord::date).collect();
        days.push(now.date_naive());
        days.sort();
        days.dedup();

        for day in days {
            aggregate::recompute_day(state, day);
        }
    }

    /// Start the background loop. The first cycle runs immediately; a cycle
    /// that overruns delays the next tick rather than overlapping it.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!(
                endpoints = self.endpoints.len(),
                "Scheduler started with interval {:?}",
                self.interval
            );

            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while self.running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    _ = self.shutdown.notified() => {}
                }
            }

            tracing::info!("Scheduler stopped");
        })
    }

    /// Stop the loop after the current cycle, if any, finishes
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Notifier;
    use crate::history::tests::record;
    use crate::history::{HistoryPersistence, JsonFileStore};
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scheduler_for(
        api: &MockServer,
        webhook: Option<String>,
        file: Arc<JsonFileStore>,
    ) -> (Arc<HistoryStore>, Scheduler) {
        let store = Arc::new(HistoryStore::load(file));
        let prober = Prober::new(api.uri()).with_timeout(Duration::from_millis(300));
        let gate = AlertGate::new(Notifier::new(webhook)).with_slow_threshold_ms(200);
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            prober,
            gate,
            vec!["/a".to_string(), "/b".to_string(), "/c".to_string()],
            Duration::from_millis(50),
        );
        (store, scheduler)
    }

    #[tokio::test]
    async fn test_cycle_mixed_results() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&api)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&api)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&api)
            .await;

        let hook = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&hook)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonFileStore::new(dir.path().join("history.json")));
        let (store, scheduler) = scheduler_for(&api, Some(hook.uri()), Arc::clone(&file));

        let report = scheduler.run_cycle().await;

        let success: Vec<bool> = report.records.iter().map(|r| r.success).collect();
        assert_eq!(success, vec![true, false, false]);
        assert_eq!(report.records[2].status, 0);
        // one failure message and one slow message, both delivered
        assert_eq!(
            report.alerts,
            vec![NotifyOutcome::Delivered, NotifyOutcome::Delivered]
        );
        assert!(report.persisted.is_ok());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.checks.len(), 3);
        assert_eq!(snapshot.daily_stats.len(), 1);
        assert_eq!(snapshot.daily_stats[0].error_rate, 66.67);
        assert!(snapshot.last_alert.is_some());

        let on_disk = file.load().unwrap().unwrap();
        assert_eq!(on_disk, *snapshot);
    }

    #[test]
    fn test_refresh_rollups_across_midnight() {
        let before = Utc.with_ymd_and_hms(2024, 7, 4, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 7, 5, 0, 0, 2).unwrap();

        let mut state = HistoryState::new();
        state.append(record(before - chrono::Duration::minutes(1), "/a", true, 10));
        aggregate::recompute_today(&mut state, before);

        let batch = vec![record(before, "/a", false, 10), record(after, "/b", true, 10)];
        for r in &batch {
            state.append(r.clone());
        }
        Scheduler::refresh_rollups(&mut state, &batch, after);

        assert_eq!(state.daily_stats.len(), 2);
        for rollup in &state.daily_stats {
            assert_eq!(rollup.total_checks, state.checks_on(rollup.date).len());
        }
        assert_eq!(state.daily_stats[0].total_checks, 2);
        assert_eq!(state.daily_stats[0].error_rate, 50.0);
        assert_eq!(state.daily_stats[1].total_checks, 1);
    }

    #[tokio::test]
    async fn test_second_cycle_within_cooldown_is_suppressed() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&api)
            .await;

        let hook = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&hook)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonFileStore::new(dir.path().join("history.json")));
        let (store, scheduler) = scheduler_for(&api, Some(hook.uri()), file);

        let first = scheduler.run_cycle().await;
        let second = scheduler.run_cycle().await;

        assert_eq!(first.alerts, vec![NotifyOutcome::Delivered]);
        assert!(matches!(second.alerts[0], NotifyOutcome::Suppressed { .. }));
        assert_eq!(store.snapshot().checks.len(), 6);
        assert_eq!(store.snapshot().daily_stats[0].total_checks, 6);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_stop_cycle() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&api)
            .await;

        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes every write fail
        let blocked = dir.path().join("history.json");
        std::fs::create_dir(&blocked).unwrap();
        let file = Arc::new(JsonFileStore::new(&blocked));
        let (store, scheduler) = scheduler_for(&api, None, file);

        let report = scheduler.run_cycle().await;
        assert!(report.persisted.is_err());
        assert!(report.alerts.is_empty());
        assert_eq!(store.snapshot().checks.len(), 3);

        let report = scheduler.run_cycle().await;
        assert!(report.persisted.is_err());
        assert_eq!(store.snapshot().checks.len(), 6);
    }

    #[tokio::test]
    async fn test_background_loop_runs_and_stops() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&api)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonFileStore::new(dir.path().join("history.json")));
        let (store, scheduler) = scheduler_for(&api, None, file);
        let scheduler = Arc::new(scheduler);

        let handle = Arc::clone(&scheduler).start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(400)).await;
        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        let checks = store.snapshot().checks.len();
        assert!(checks >= 3);
        assert_eq!(checks % 3, 0);
    }
}
