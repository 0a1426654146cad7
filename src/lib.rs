//! Bounty Board Health: HTTP health-check monitor
//!
//! Periodically probes a fixed set of API endpoints, keeps a bounded 7-day
//! history with per-day rollups, serves status and history over HTTP with a
//! chart dashboard, and sends rate-limited webhook alerts.
//!
//! # Components
//!
//! - **Prober**: one bounded-timeout GET per endpoint, normalized to a `CheckRecord`
//! - **History Store**: append-only check log, per-day rollups, retention pruning
//! - **Aggregator**: daily rollups and the current-status snapshot
//! - **Alert Gate**: failure/slow detection with a global delivery cooldown
//! - **Scheduler**: runs the cycle on a fixed interval, never overlapping
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bounty_health::aggregate::current_status;
//! use bounty_health::history::{HistoryStore, JsonFileStore};
//!
//! let store = HistoryStore::load(Arc::new(JsonFileStore::new("./data/health-history.json")));
//! let status = current_status(&store.snapshot(), 3, chrono::Utc::now());
//! println!("uptime {}%", status.uptime);
//! ```

pub mod aggregate;
pub mod alerts;
pub mod api;
pub mod config;
pub mod history;
pub mod probe;
pub mod scheduler;

// Re-export commonly used types
pub use aggregate::StatusSnapshot;
pub use config::{ConfigError, MonitorConfig};
pub use history::{CheckRecord, DailyRollup, EndpointRollup, HistoryState, HistoryStore};
pub use scheduler::{CycleReport, Scheduler};
