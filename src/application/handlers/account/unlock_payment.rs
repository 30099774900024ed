//! UnlockPaymentHandler - Admin command to lift a payment lock.

use std::sync::Arc;

use serde_json::json;

use crate::application::PaymentSettlement;
use crate::domain::foundation::UserId;
use crate::domain::order::OrderError;
use crate::ports::{AuditEvent, AuditEventType, PaymentLockWriter, RiskLevel};

use super::PaymentLockResult;

#[derive(Debug, Clone)]
pub struct UnlockPaymentCommand {
    pub user_id: UserId,
    pub admin_id: UserId,
}

pub struct UnlockPaymentHandler {
    settlement: Arc<PaymentSettlement>,
    locks: Arc<dyn PaymentLockWriter>,
}

impl UnlockPaymentHandler {
    pub fn new(settlement: Arc<PaymentSettlement>, locks: Arc<dyn PaymentLockWriter>) -> Self {
        Self { settlement, locks }
    }

    /// Unlocking an account that is not locked succeeds and changes nothing.
    pub async fn handle(&self, cmd: UnlockPaymentCommand) -> Result<PaymentLockResult, OrderError> {
        let previous = self
            .locks
            .set_payment_lock(&cmd.user_id, None)
            .await?
            .ok_or_else(|| OrderError::AccountNotFound(cmd.user_id.clone()))?;

        if previous.locked {
            tracing::info!(
                user_id = %cmd.user_id,
                admin = %cmd.admin_id,
                previous_reason = ?previous.reason,
                "Payments unlocked"
            );
            self.settlement
                .audit(
                    AuditEvent::new(
                        AuditEventType::PaymentUnlocked,
                        RiskLevel::Low,
                        json!({
                            "admin_id": cmd.admin_id.as_str(),
                            "previous_reason": previous.reason,
                        }),
                    )
                    .for_user(&cmd.user_id),
                )
                .await;
        }

        Ok(PaymentLockResult {
            user_id: cmd.user_id,
            locked: false,
            was_locked: previous.locked,
        })
    }
}
