//! ConfirmStepUpHandler - Command handler invoked by the authentication
//! collaborator once a user passed step-up verification for an order.

use std::sync::Arc;

use crate::application::PaymentSettlement;
use crate::domain::foundation::{OrderNo, Timestamp};
use crate::domain::order::OrderError;

#[derive(Debug, Clone)]
pub struct ConfirmStepUpCommand {
    pub order_no: OrderNo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmStepUpResult {
    pub order_no: OrderNo,

    /// False when the order had already left `Pending`.
    pub step_up_verified: bool,
}

pub struct ConfirmStepUpHandler {
    settlement: Arc<PaymentSettlement>,
}

impl ConfirmStepUpHandler {
    pub fn new(settlement: Arc<PaymentSettlement>) -> Self {
        Self { settlement }
    }

    pub async fn handle(&self, cmd: ConfirmStepUpCommand) -> Result<ConfirmStepUpResult, OrderError> {
        let order = self
            .settlement
            .orders()
            .mark_step_up_verified(&cmd.order_no, Timestamp::now())
            .await?
            .ok_or_else(|| OrderError::not_found(cmd.order_no.clone()))?;

        tracing::info!(
            order_no = %order.order_no,
            verified = order.step_up_verified,
            "Step-up verification recorded"
        );

        Ok(ConfirmStepUpResult {
            order_no: order.order_no,
            step_up_verified: order.step_up_verified,
        })
    }
}
