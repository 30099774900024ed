//! Counters and per-order results produced by reconciliation.

use serde::Serialize;

use crate::domain::foundation::{OrderNo, Timestamp};
use crate::domain::order::OrderState;

/// Per-order failure kept in a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationFailure {
    pub order_no: OrderNo,
    pub error: String,
    pub attempt: u32,
}

/// Aggregate result of one scheduler pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,

    /// Pending orders queried against their provider.
    pub checked: u32,

    /// Orders moved to paid.
    pub synced: u32,

    /// Orders cancelled, provider-closed and timed-out together.
    pub cancelled: u32,

    /// Subset of `cancelled` caused by the timeout sweep.
    pub timed_out: u32,

    pub errored: u32,

    /// Candidates skipped because they are still backing off.
    pub skipped: u32,

    pub failures: Vec<ReconciliationFailure>,
}

impl ReconciliationReport {
    pub fn start(now: Timestamp) -> Self {
        Self {
            started_at: now,
            finished_at: None,
            checked: 0,
            synced: 0,
            cancelled: 0,
            timed_out: 0,
            errored: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, order_no: &OrderNo, error: impl Into<String>, attempt: u32) {
        self.errored += 1;
        self.failures.push(ReconciliationFailure {
            order_no: order_no.clone(),
            error: error.into(),
            attempt,
        });
    }

    pub fn finish(mut self, now: Timestamp) -> Self {
        self.finished_at = Some(now);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.errored > 0
    }
}

/// Result of reconciling a single order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub order_no: OrderNo,
    pub previous_state: OrderState,
    pub current_state: OrderState,

    /// True when this call changed the order.
    pub synced: bool,

    pub error: Option<String>,
}

impl SyncResult {
    pub fn unchanged(order_no: OrderNo, state: OrderState) -> Self {
        Self {
            order_no,
            previous_state: state,
            current_state: state,
            synced: false,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
