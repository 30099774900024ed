//! CancelOrderHandler - Command handler for user-initiated cancellation.

use std::sync::Arc;

use crate::application::PaymentSettlement;
use crate::domain::foundation::{OrderNo, Timestamp, UserId};
use crate::domain::order::{OrderError, OrderState, TransitionOutcome, TransitionSource};

const DEFAULT_REASON: &str = "cancelled by user";

#[derive(Debug, Clone)]
pub struct CancelOrderCommand {
    pub order_no: OrderNo,
    pub user_id: UserId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderResult {
    pub order_no: OrderNo,
    pub state: OrderState,

    /// True when the order was cancelled before this request.
    pub already_cancelled: bool,
}

/// Handler for cancelling an unpaid order.
///
/// Paid orders are refused with `AlreadyPaid`; the caller should request a
/// refund instead.
pub struct CancelOrderHandler {
    settlement: Arc<PaymentSettlement>,
}

impl CancelOrderHandler {
    pub fn new(settlement: Arc<PaymentSettlement>) -> Self {
        Self { settlement }
    }

    pub async fn handle(&self, cmd: CancelOrderCommand) -> Result<CancelOrderResult, OrderError> {
        let order = self
            .settlement
            .orders()
            .find_by_order_no(&cmd.order_no)
            .await?
            .ok_or_else(|| OrderError::not_found(cmd.order_no.clone()))?;
        if !order.belongs_to(&cmd.user_id) {
            return Err(OrderError::Forbidden(cmd.order_no));
        }

        let reason = cmd
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_string());
        let outcome = self
            .settlement
            .cancel(&cmd.order_no, TransitionSource::User, &reason, Timestamp::now())
            .await?;

        Ok(CancelOrderResult {
            order_no: cmd.order_no,
            state: outcome.order().state,
            already_cancelled: matches!(outcome, TransitionOutcome::NoOp(_)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{order_no, user, Harness};

    fn command(no: &str) -> CancelOrderCommand {
        CancelOrderCommand {
            order_no: order_no(no),
            user_id: user(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn pending_order_is_cancelled_with_default_reason() {
        let h = Harness::new();
        h.seed_pending("VIP-1", Timestamp::now());

        let result = CancelOrderHandler::new(h.settlement())
            .handle(command("VIP-1"))
            .await
            .unwrap();

        assert_eq!(result.state, OrderState::Cancelled);
        assert!(!result.already_cancelled);
        assert_eq!(h.stored("VIP-1").cancel_reason.as_deref(), Some(DEFAULT_REASON));
    }

    #[tokio::test]
    async fn second_cancel_is_a_no_op() {
        let h = Harness::new();
        h.seed_pending("VIP-1", Timestamp::now());
        let handler = CancelOrderHandler::new(h.settlement());

        handler.handle(command("VIP-1")).await.unwrap();
        let again = handler.handle(command("VIP-1")).await.unwrap();

        assert!(again.already_cancelled);
        assert_eq!(h.wallet_a.call_count("close_order"), 1);
    }

    #[tokio::test]
    async fn paid_order_cannot_be_cancelled() {
        let h = Harness::new();
        h.seed_paid("VIP-1", "tx-1", Timestamp::now());

        let result = CancelOrderHandler::new(h.settlement())
            .handle(command("VIP-1"))
            .await;

        assert!(matches!(result, Err(OrderError::AlreadyPaid(_))));
    }

    #[tokio::test]
    async fn other_users_cannot_cancel() {
        let h = Harness::new();
        h.seed_pending("VIP-1", Timestamp::now());

        let result = CancelOrderHandler::new(h.settlement())
            .handle(CancelOrderCommand {
                user_id: UserId::new("intruder").unwrap(),
                ..command("VIP-1")
            })
            .await;

        assert!(matches!(result, Err(OrderError::Forbidden(_))));
        assert_eq!(h.stored("VIP-1").state, OrderState::Pending);
    }
}
