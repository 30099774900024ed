//! Tunables the application layer reads, decoupled from config parsing.

use crate::domain::reconciliation::RetryPolicy;

/// Order lifecycle limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Minutes an unpaid order stays payable.
    pub order_timeout_minutes: i64,

    /// Days after payment during which a refund may be requested.
    pub refund_valid_days: i64,

    /// Days of grace shown after a VIP membership lapses.
    pub vip_grace_days: i64,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            order_timeout_minutes: 15,
            refund_valid_days: 7,
            vip_grace_days: 7,
        }
    }
}

/// Reconciliation pass limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationPolicy {
    /// Pending orders younger than this are left to callbacks.
    pub grace_minutes: i64,

    /// Page size used when listing orders for a sweep.
    pub batch_size: u32,

    pub retry: RetryPolicy,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            grace_minutes: 5,
            batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}
