//! Alerting for failed and slow health checks
//!
//! Each cycle's batch is scanned for failure and slow-response conditions.
//! Every condition is logged; webhook delivery is rate-limited by a single
//! global cooldown.

pub mod gate;
pub mod notifier;

pub use gate::{AlertGate, AlertKind, AlertMessage, NotifyOutcome};
pub use notifier::{Notifier, NotifierError};
