//! HandlePaymentCallbackHandler - Command handler for provider push notifications.
//!
//! Every delivery ends in exactly one [`CallbackRecord`] and one ack token.
//! The success record for `(order_no, transaction_id)` is the idempotency
//! anchor: once it exists, later deliveries are recorded as duplicates and
//! have no business effect.

use std::sync::Arc;

use http::HeaderMap;
use serde_json::json;
use thiserror::Error;

use crate::application::{PaymentSettlement, SettlementOutcome};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::order::{OrderError, Provider, TransitionEvidence, TransitionSource};
use crate::domain::payment::{AckToken, CallbackRecord, GatewayError, NormalizedStatus};
use crate::ports::{AuditEvent, AuditEventType, CallbackRecordRepository, PaymentGateway, RiskLevel};

/// Failures while handling a callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// No gateway is configured for the provider the callback claims.
    #[error("provider not configured: {0}")]
    Unavailable(#[source] GatewayError),

    #[error("callback processing failed: {0}")]
    Processing(#[from] OrderError),

    #[error("callback record storage failed: {0}")]
    Storage(#[from] DomainError),
}

/// Command carrying the raw notification.
#[derive(Debug, Clone)]
pub struct HandlePaymentCallbackCommand {
    pub provider: Provider,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// How a delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Payment settled by this delivery.
    Processed,
    /// Payment was already settled; nothing changed.
    Duplicate,
    /// Non-paid status recorded for the scheduler.
    Recorded,
    /// Evidence conflicted; kept for manual review.
    Conflict,
    /// Signature did not verify.
    Rejected,
    /// Processing failed or a verified payload did not decode; the provider
    /// should redeliver.
    Failed,
}

impl CallbackDisposition {
    /// Whether the provider should be told the delivery was accepted.
    pub fn acknowledges(&self) -> bool {
        !matches!(self, CallbackDisposition::Rejected | CallbackDisposition::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackDisposition::Processed => "processed",
            CallbackDisposition::Duplicate => "duplicate",
            CallbackDisposition::Recorded => "recorded",
            CallbackDisposition::Conflict => "conflict",
            CallbackDisposition::Rejected => "rejected",
            CallbackDisposition::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandlePaymentCallbackResult {
    /// Response the provider expects.
    pub ack: AckToken,
    pub disposition: CallbackDisposition,
}

pub struct HandlePaymentCallbackHandler {
    settlement: Arc<PaymentSettlement>,
    records: Arc<dyn CallbackRecordRepository>,
}

impl HandlePaymentCallbackHandler {
    pub fn new(
        settlement: Arc<PaymentSettlement>,
        records: Arc<dyn CallbackRecordRepository>,
    ) -> Self {
        Self {
            settlement,
            records,
        }
    }

    /// Handles one delivery.
    ///
    /// # Errors
    ///
    /// Returns `CallbackError::Unavailable` only when the provider has no
    /// configured gateway, since no provider-specific ack can be produced.
    /// All other failures are folded into a failure ack.
    pub async fn handle(
        &self,
        cmd: HandlePaymentCallbackCommand,
    ) -> Result<HandlePaymentCallbackResult, CallbackError> {
        let gateway = self
            .settlement
            .gateways()
            .resolve(cmd.provider)
            .map_err(CallbackError::Unavailable)?;

        let disposition = match self.process(gateway.as_ref(), &cmd).await {
            Ok(disposition) => disposition,
            Err(err) => {
                tracing::error!(
                    provider = %cmd.provider,
                    error = %err,
                    "Payment callback processing failed"
                );
                CallbackDisposition::Failed
            }
        };

        tracing::info!(
            provider = %cmd.provider,
            disposition = disposition.as_str(),
            "Payment callback handled"
        );

        Ok(HandlePaymentCallbackResult {
            ack: gateway.ack(disposition.acknowledges()),
            disposition,
        })
    }

    async fn process(
        &self,
        gateway: &dyn PaymentGateway,
        cmd: &HandlePaymentCallbackCommand,
    ) -> Result<CallbackDisposition, CallbackError> {
        let received_at = Timestamp::now();

        // 1. Verify and decode
        let callback = match gateway.verify_and_decode(&cmd.headers, &cmd.body) {
            Ok(callback) => callback,
            Err(err @ GatewayError::SignatureInvalid(_)) => {
                self.reject(cmd.provider, &err).await;
                return Ok(CallbackDisposition::Rejected);
            }
            Err(err) => {
                self.record_undecodable(cmd, &err, received_at).await;
                return Ok(CallbackDisposition::Failed);
            }
        };

        // 2. Non-paid statuses are the scheduler's business
        if callback.status != NormalizedStatus::Paid {
            tracing::info!(
                provider = %callback.provider,
                order_no = %callback.order_no,
                status = callback.status.as_str(),
                "Non-paid callback recorded"
            );
            self.records
                .save(CallbackRecord::pending(
                    &callback,
                    format!("provider status {}", callback.status.as_str()),
                    received_at,
                ))
                .await?;
            return Ok(CallbackDisposition::Recorded);
        }

        let Some(transaction_id) = callback.transaction_id.clone() else {
            tracing::error!(
                provider = %callback.provider,
                order_no = %callback.order_no,
                "Paid callback carries no transaction id"
            );
            self.save_quietly(CallbackRecord::failed(
                &callback,
                "paid notification has no transaction id",
                received_at,
            ))
            .await;
            return Ok(CallbackDisposition::Failed);
        };

        // 3. Idempotency anchor
        if self
            .records
            .find_successful(&callback.order_no, &transaction_id)
            .await?
            .is_some()
        {
            tracing::debug!(
                order_no = %callback.order_no,
                transaction_id = %transaction_id,
                "Duplicate payment callback"
            );
            self.records
                .save(CallbackRecord::duplicate(&callback, received_at))
                .await?;
            return Ok(CallbackDisposition::Duplicate);
        }

        // 4. Settle
        let evidence = TransitionEvidence::payment(
            TransitionSource::Callback,
            transaction_id,
            callback.amount,
            callback.paid_at.unwrap_or(received_at),
        );
        let outcome = match self
            .settlement
            .settle_paid(&callback.order_no, &evidence)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.save_quietly(CallbackRecord::failed(&callback, err.to_string(), received_at))
                    .await;
                return Err(err.into());
            }
        };

        let (record, disposition) = match outcome {
            SettlementOutcome::Settled(_) => (
                CallbackRecord::success(&callback, received_at),
                CallbackDisposition::Processed,
            ),
            SettlementOutcome::AlreadySettled(_) => (
                CallbackRecord::duplicate(&callback, received_at),
                CallbackDisposition::Duplicate,
            ),
            SettlementOutcome::Conflict { detail, .. } => (
                CallbackRecord::failed(&callback, detail, received_at),
                CallbackDisposition::Conflict,
            ),
        };

        // Business effects already happened; a lost record must not trigger
        // redelivery.
        self.save_quietly(record).await;
        Ok(disposition)
    }

    async fn reject(&self, provider: Provider, err: &GatewayError) {
        tracing::warn!(
            provider = %provider,
            error = %err,
            "Payment callback failed verification"
        );
        self.settlement
            .audit(AuditEvent::new(
                AuditEventType::CallbackSignatureRejected,
                RiskLevel::Medium,
                json!({ "provider": provider.as_str(), "error": err.to_string() }),
            ))
            .await;
    }

    /// Logs a verified notification that did not decode and keeps it when
    /// the order is known.
    async fn record_undecodable(
        &self,
        cmd: &HandlePaymentCallbackCommand,
        err: &GatewayError,
        received_at: Timestamp,
    ) {
        let order_no = match err {
            GatewayError::UndecodableNotification { order_no, .. } => order_no.clone(),
            _ => None,
        };
        tracing::error!(
            provider = %cmd.provider,
            order_no = ?order_no,
            error = %err,
            "Payment callback could not be decoded"
        );

        if let Some(order_no) = order_no {
            let payload = serde_json::from_slice(&cmd.body)
                .unwrap_or_else(|_| json!(String::from_utf8_lossy(&cmd.body)));
            self.save_quietly(CallbackRecord::undecodable(
                cmd.provider,
                order_no,
                payload,
                err.to_string(),
                received_at,
            ))
            .await;
        }
    }

    async fn save_quietly(&self, record: CallbackRecord) {
        let order_no = record.order_no.clone();
        let outcome = record.outcome;
        if let Err(err) = self.records.save(record).await {
            tracing::error!(
                order_no = %order_no,
                outcome = outcome.as_str(),
                error = %err,
                "Failed to store callback record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::MockGateway;
    use crate::application::test_support::{order_no, tx, Harness};
    use crate::domain::entitlement::EntitlementAction;
    use crate::domain::order::OrderState;
    use crate::domain::payment::CallbackOutcome;

    fn handler(h: &Harness) -> HandlePaymentCallbackHandler {
        HandlePaymentCallbackHandler::new(h.settlement(), h.callbacks.clone())
    }

    fn delivery(no: &str, tx: &str, status: &str, amount: i64) -> HandlePaymentCallbackCommand {
        HandlePaymentCallbackCommand {
            provider: Provider::WalletA,
            headers: HeaderMap::new(),
            body: MockGateway::callback_body(no, tx, status, amount),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Happy path and idempotency
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_callback_settles_and_acks() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());

        let result = handler(&h)
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Processed);
        assert_eq!(result.ack.status, 200);
        assert_eq!(result.ack.body, "ok");
        let stored = h.stored("VIP-0001");
        assert_eq!(stored.state, OrderState::Paid);
        assert_eq!(stored.transaction_id, Some(tx("tx-1")));
        assert_eq!(h.callbacks.count_with_outcome(CallbackOutcome::Success), 1);
        assert_eq!(h.notifier.count_of("payment_succeeded"), 1);
    }

    #[tokio::test]
    async fn redelivery_is_duplicate_without_effects() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());
        let handler = handler(&h);

        handler
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await
            .unwrap();
        let expiry = h.entitlements.get(&h.stored("VIP-0001").user_id).unwrap();
        let again = handler
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await
            .unwrap();

        assert_eq!(again.disposition, CallbackDisposition::Duplicate);
        assert_eq!(again.ack.status, 200);
        assert_eq!(
            h.entitlements.get(&h.stored("VIP-0001").user_id).unwrap(),
            expiry
        );
        assert_eq!(h.notifier.count_of("payment_succeeded"), 1);
        assert_eq!(h.callbacks.count_with_outcome(CallbackOutcome::Duplicate), 1);
    }

    // ══════════════════════════════════════════════════════════════
    // Conflicts and rejections
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_transaction_is_conflict_and_acknowledged() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());
        let handler = handler(&h);
        handler
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await
            .unwrap();

        let result = handler
            .handle(delivery("VIP-0001", "tx-2", "paid", 7900))
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Conflict);
        assert!(result.disposition.acknowledges());
        assert_eq!(h.stored("VIP-0001").transaction_id, Some(tx("tx-1")));
        assert_eq!(h.callbacks.count_with_outcome(CallbackOutcome::Failed), 1);
        let entitlement = h.entitlements.get(&h.stored("VIP-0001").user_id).unwrap();
        assert_eq!(entitlement.version, 1);
        assert!(h
            .entitlements
            .has_grant(&order_no("VIP-0001"), EntitlementAction::Activate));
        assert_eq!(h.notifier.count_of("payment_succeeded"), 1);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_and_audited() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());
        h.wallet_a.reject_signatures();

        let result = handler(&h)
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Rejected);
        assert_eq!(result.ack.status, 500);
        assert_eq!(h.stored("VIP-0001").state, OrderState::Pending);
        assert!(h.callbacks.all().is_empty());
        let audited = h
            .audit
            .events_of_type(AuditEventType::CallbackSignatureRejected);
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn undecodable_verified_payload_is_a_processing_failure() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());
        let body = serde_json::json!({
            "order_no": "VIP-0001",
            "transaction_id": "",
            "status": "paid",
            "amount": 7900,
        });

        let result = handler(&h)
            .handle(HandlePaymentCallbackCommand {
                provider: Provider::WalletA,
                headers: HeaderMap::new(),
                body: body.to_string().into_bytes(),
            })
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Failed);
        assert_eq!(result.ack.status, 500);
        assert_eq!(h.stored("VIP-0001").state, OrderState::Pending);
        let records = h.callbacks.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, CallbackOutcome::Failed);
        assert!(records[0].signature_valid);
        assert!(records[0].transaction_id.is_none());
        assert!(h
            .audit
            .events_of_type(AuditEventType::CallbackSignatureRejected)
            .is_empty());
    }

    #[tokio::test]
    async fn closed_status_without_transaction_is_recorded() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());
        let body = serde_json::json!({ "order_no": "VIP-0001", "status": "closed" });

        let result = handler(&h)
            .handle(HandlePaymentCallbackCommand {
                provider: Provider::WalletA,
                headers: HeaderMap::new(),
                body: body.to_string().into_bytes(),
            })
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Recorded);
        assert!(result.disposition.acknowledges());
        let records = h.callbacks.all();
        assert_eq!(records[0].outcome, CallbackOutcome::Pending);
        assert!(records[0].transaction_id.is_none());
    }

    #[tokio::test]
    async fn non_paid_status_is_recorded_only() {
        let h = Harness::new();
        h.seed_pending("VIP-0001", Timestamp::now());

        let result = handler(&h)
            .handle(delivery("VIP-0001", "tx-1", "closed", 7900))
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Recorded);
        assert_eq!(h.stored("VIP-0001").state, OrderState::Pending);
        assert_eq!(h.callbacks.count_with_outcome(CallbackOutcome::Pending), 1);
    }

    #[tokio::test]
    async fn unknown_order_fails_so_provider_redelivers() {
        let h = Harness::new();

        let result = handler(&h)
            .handle(delivery("VIP-404", "tx-1", "paid", 7900))
            .await
            .unwrap();

        assert_eq!(result.disposition, CallbackDisposition::Failed);
        assert_eq!(result.ack.status, 500);
        assert_eq!(h.callbacks.count_with_outcome(CallbackOutcome::Failed), 1);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_an_error() {
        let h = Harness::new();
        let settlement = Arc::new(PaymentSettlement::new(
            h.orders.clone(),
            crate::application::GatewayRegistry::new(),
            h.applier(),
            h.notifier.clone(),
            h.audit.clone(),
        ));
        let handler = HandlePaymentCallbackHandler::new(settlement, h.callbacks.clone());

        let result = handler
            .handle(delivery("VIP-0001", "tx-1", "paid", 7900))
            .await;

        assert!(matches!(result, Err(CallbackError::Unavailable(_))));
    }
}
