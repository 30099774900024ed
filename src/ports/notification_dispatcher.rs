//! Outbound user notifications.
//!
//! Dispatch is best-effort. Callers log failures and never roll back the
//! order or entitlement change that triggered the notification.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::order::Order;

/// Event a user is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderNotification {
    /// Payment confirmed and membership granted.
    PaymentSucceeded {
        order: Order,
        vip_expires_at: Option<Timestamp>,
        lifetime: bool,
    },

    /// Refund completed and membership adjusted.
    RefundProcessed { order: Order },
}

impl OrderNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderNotification::PaymentSucceeded { .. } => "payment_succeeded",
            OrderNotification::RefundProcessed { .. } => "refund_processed",
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            OrderNotification::PaymentSucceeded { order, .. }
            | OrderNotification::RefundProcessed { order } => order,
        }
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: OrderNotification) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_dispatcher_is_object_safe() {
        fn _accepts_dyn(_dispatcher: &dyn NotificationDispatcher) {}
    }
}
