//! Notifier that emits each notification as a structured log event.
//!
//! Used when no push or mail channel is configured. A log shipper can pick
//! the `notification` target up and forward it.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{NotificationDispatcher, OrderNotification};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, notification: OrderNotification) -> Result<(), DomainError> {
        let order = notification.order();
        match &notification {
            OrderNotification::PaymentSucceeded {
                vip_expires_at,
                lifetime,
                ..
            } => {
                tracing::info!(
                    target: "notification",
                    kind = notification.kind(),
                    user_id = %order.user_id,
                    order_no = %order.order_no,
                    amount = order.amount,
                    lifetime = *lifetime,
                    vip_expires_at = ?vip_expires_at.map(|t| t.to_string()),
                    "VIP membership activated"
                );
            }
            OrderNotification::RefundProcessed { .. } => {
                tracing::info!(
                    target: "notification",
                    kind = notification.kind(),
                    user_id = %order.user_id,
                    order_no = %order.order_no,
                    amount = order.amount,
                    "Refund completed"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::order::test_support::pending_order;

    #[tokio::test]
    async fn dispatch_never_fails() {
        let notifier = TracingNotifier::new();
        let order = pending_order(Timestamp::now());

        let result = notifier
            .dispatch(OrderNotification::PaymentSucceeded {
                order: order.clone(),
                vip_expires_at: Some(Timestamp::now().add_days(30)),
                lifetime: false,
            })
            .await;
        assert!(result.is_ok());

        let result = notifier
            .dispatch(OrderNotification::RefundProcessed { order })
            .await;
        assert!(result.is_ok());
    }
}
