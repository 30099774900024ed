//! LockPaymentHandler - Admin command to stop a user from paying.

use std::sync::Arc;

use serde_json::json;

use crate::application::PaymentSettlement;
use crate::domain::foundation::UserId;
use crate::domain::order::OrderError;
use crate::ports::{AuditEvent, AuditEventType, PaymentLockWriter, RiskLevel};

#[derive(Debug, Clone)]
pub struct LockPaymentCommand {
    pub user_id: UserId,
    pub admin_id: UserId,
    pub reason: String,
}

/// Lock state after a lock or unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLockResult {
    pub user_id: UserId,
    pub locked: bool,
    pub was_locked: bool,
}

pub struct LockPaymentHandler {
    settlement: Arc<PaymentSettlement>,
    locks: Arc<dyn PaymentLockWriter>,
}

impl LockPaymentHandler {
    pub fn new(settlement: Arc<PaymentSettlement>, locks: Arc<dyn PaymentLockWriter>) -> Self {
        Self { settlement, locks }
    }

    pub async fn handle(&self, cmd: LockPaymentCommand) -> Result<PaymentLockResult, OrderError> {
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(OrderError::validation("reason", "a lock reason is required"));
        }

        let previous = self
            .locks
            .set_payment_lock(&cmd.user_id, Some(reason))
            .await?
            .ok_or_else(|| OrderError::AccountNotFound(cmd.user_id.clone()))?;

        tracing::warn!(
            user_id = %cmd.user_id,
            admin = %cmd.admin_id,
            reason,
            "Payments locked"
        );
        self.settlement
            .audit(
                AuditEvent::new(
                    AuditEventType::PaymentLocked,
                    RiskLevel::High,
                    json!({ "reason": reason, "admin_id": cmd.admin_id.as_str() }),
                )
                .for_user(&cmd.user_id),
            )
            .await;

        Ok(PaymentLockResult {
            user_id: cmd.user_id,
            locked: true,
            was_locked: previous.locked,
        })
    }
}
