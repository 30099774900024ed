//! Reconciliation module - retry cache, run reports and run statistics.

mod report;
mod retry;
mod stats;

pub use report::{ReconciliationFailure, ReconciliationReport, SyncResult};
pub use retry::{RetryDecision, RetryEntry, RetryPolicy, RetryTracker};
pub use stats::{ReconciliationStats, DEFAULT_STATS_DAYS, MAX_STATS_DAYS};
