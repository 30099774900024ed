//! ReconcileOrderHandler - Admin command to reconcile one order now.

use std::sync::Arc;

use crate::application::ReconciliationService;
use crate::domain::foundation::OrderNo;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::SyncResult;

#[derive(Debug, Clone)]
pub struct ReconcileOrderCommand {
    pub order_no: OrderNo,
}

pub struct ReconcileOrderHandler {
    service: Arc<ReconciliationService>,
}

impl ReconcileOrderHandler {
    pub fn new(service: Arc<ReconciliationService>) -> Self {
        Self { service }
    }

    pub async fn handle(&self, cmd: ReconcileOrderCommand) -> Result<SyncResult, OrderError> {
        let result = self.service.reconcile_order(&cmd.order_no).await?;
        tracing::info!(
            order_no = %result.order_no,
            previous_state = %result.previous_state,
            current_state = %result.current_state,
            synced = result.synced,
            error = ?result.error,
            "Manual reconcile finished"
        );
        Ok(result)
    }
}
