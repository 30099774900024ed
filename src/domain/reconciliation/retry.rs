//! Bounded per-order retry bookkeeping for reconciliation.
//!
//! The tracker is a cache in front of the order store. Losing it (restart,
//! another instance) only loses backoff precision: pending orders are always
//! rediscovered from the store on the next pass.

use std::collections::{HashMap, HashSet};

use crate::domain::foundation::{OrderNo, Timestamp};

/// Backoff and attempt limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_secs: i64,
    pub max_backoff_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_secs: 60,
            max_backoff_secs: 900,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure: base doubled per attempt, capped.
    pub fn backoff_secs(&self, attempt: u32) -> i64 {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff_secs
            .saturating_mul(1_i64 << exponent)
            .min(self.max_backoff_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryEntry {
    pub attempt_count: u32,
    pub last_attempt_at: Timestamp,
}

/// What happened after recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again no earlier than `not_before`.
    Scheduled { attempt: u32, not_before: Timestamp },

    /// Limit reached; entry dropped until the next full pass rediscovers it.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct RetryTracker {
    policy: RetryPolicy,
    entries: HashMap<OrderNo, RetryEntry>,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    /// True unless the order is still backing off at `now`.
    pub fn is_due(&self, order_no: &OrderNo, now: Timestamp) -> bool {
        match self.entries.get(order_no) {
            None => true,
            Some(entry) => {
                let wait = self.policy.backoff_secs(entry.attempt_count);
                !now.is_before(&entry.last_attempt_at.plus_secs(wait))
            }
        }
    }

    pub fn record_failure(&mut self, order_no: &OrderNo, now: Timestamp) -> RetryDecision {
        let attempt = self
            .entries
            .get(order_no)
            .map_or(0, |e| e.attempt_count)
            .saturating_add(1);

        if attempt >= self.policy.max_retries {
            self.entries.remove(order_no);
            return RetryDecision::Exhausted { attempts: attempt };
        }

        self.entries.insert(
            order_no.clone(),
            RetryEntry {
                attempt_count: attempt,
                last_attempt_at: now,
            },
        );
        RetryDecision::Scheduled {
            attempt,
            not_before: now.plus_secs(self.policy.backoff_secs(attempt)),
        }
    }

    pub fn record_success(&mut self, order_no: &OrderNo) {
        self.entries.remove(order_no);
    }

    /// Drops entries for orders that are no longer candidates.
    pub fn retain_only(&mut self, candidates: &HashSet<OrderNo>) {
        self.entries.retain(|order_no, _| candidates.contains(order_no));
    }

    pub fn entry(&self, order_no: &OrderNo) -> Option<RetryEntry> {
        self.entries.get(order_no).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
