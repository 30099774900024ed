//! Mock payment gateway for testing.
//!
//! Supports:
//! - Per-order query results (default: not paid)
//! - Error injection per method
//! - Call tracking
//! - Callback decoding from a plain JSON body, with optional forced
//!   signature failure

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::HeaderMap;
use serde::Deserialize;

use crate::domain::foundation::{OrderNo, Timestamp, TransactionId};
use crate::domain::order::{PaymentChannel, Provider};
use crate::domain::payment::{
    AckToken, CloseOutcome, CreatePaymentRequest, GatewayError, IntentHandle, NormalizedCallback,
    NormalizedStatus, PaymentIntent, QueryOutcome, RefundOutcome, RefundRequest,
};
use crate::ports::PaymentGateway;

/// Mock payment gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockGateway::new(Provider::WalletA);
/// gateway.set_query_result(&order_no, Ok(QueryOutcome::Paid(details)));
/// gateway.fail_method("refund", GatewayError::TransientNetwork("reset".into()));
/// ```
#[derive(Clone)]
pub struct MockGateway {
    provider: Provider,
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    query_results: HashMap<OrderNo, Result<QueryOutcome, GatewayError>>,
    method_errors: HashMap<String, GatewayError>,
    next_refund: Option<RefundOutcome>,
    close_result: Option<CloseOutcome>,
    reject_signatures: bool,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub order_no: Option<String>,
}

/// Callback body accepted by the mock.
#[derive(Debug, Deserialize)]
struct MockCallbackBody {
    order_no: String,
    transaction_id: Option<String>,
    status: String,
    amount: Option<i64>,
}

impl MockGateway {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            inner: Arc::new(Mutex::new(MockState::default())),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn set_query_result(&self, order_no: &OrderNo, result: Result<QueryOutcome, GatewayError>) {
        self.state().query_results.insert(order_no.clone(), result);
    }

    /// Makes every call to `method` fail with `error`.
    pub fn fail_method(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state().method_errors.clear();
    }

    pub fn set_refund_outcome(&self, outcome: RefundOutcome) {
        self.state().next_refund = Some(outcome);
    }

    pub fn set_close_outcome(&self, outcome: CloseOutcome) {
        self.state().close_result = Some(outcome);
    }

    pub fn reject_signatures(&self) {
        self.state().reject_signatures = true;
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Body a test can post to a callback endpoint wired to this mock.
    pub fn callback_body(order_no: &str, transaction_id: &str, status: &str, amount: i64) -> Vec<u8> {
        serde_json::json!({
            "order_no": order_no,
            "transaction_id": transaction_id,
            "status": status,
            "amount": amount,
        })
        .to_string()
        .into_bytes()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().expect("MockGateway: lock poisoned")
    }

    fn record(&self, method: &str, order_no: Option<&OrderNo>) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            order_no: order_no.map(|o| o.to_string()),
        });
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record("create_payment", Some(&request.order_no))?;
        let handle = match request.channel {
            PaymentChannel::WalletAQr => {
                IntentHandle::QrCode(format!("mock://pay/{}", request.order_no))
            }
            _ => IntentHandle::RedirectUrl(format!("https://mock.pay/{}", request.order_no)),
        };
        Ok(PaymentIntent {
            provider: self.provider,
            channel: request.channel,
            handle,
            expires_at: request.expires_at,
        })
    }

    async fn query_status(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<QueryOutcome, GatewayError> {
        self.record("query_status", Some(order_no))?;
        self.state()
            .query_results
            .get(order_no)
            .cloned()
            .unwrap_or(Ok(QueryOutcome::NotPaid))
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError> {
        self.record("refund", Some(&request.order_no))?;
        Ok(self
            .state()
            .next_refund
            .clone()
            .unwrap_or_else(|| RefundOutcome::Accepted {
                provider_refund_id: Some(format!("mock-refund-{}", request.refund_ref)),
            }))
    }

    async fn close_order(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<CloseOutcome, GatewayError> {
        self.record("close_order", Some(order_no))?;
        Ok(self.state().close_result.unwrap_or(CloseOutcome::Closed))
    }

    fn verify_and_decode(
        &self,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> Result<NormalizedCallback, GatewayError> {
        self.record("verify_and_decode", None)?;
        if self.state().reject_signatures {
            return Err(GatewayError::SignatureInvalid("mock rejects all signatures".into()));
        }

        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::undecodable(None, e.to_string()))?;
        let parsed: MockCallbackBody = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::undecodable(None, e.to_string()))?;
        let order_no = OrderNo::new(parsed.order_no)
            .map_err(|e| GatewayError::undecodable(None, e.to_string()))?;

        let status = match parsed.status.as_str() {
            "paid" => NormalizedStatus::Paid,
            "closed" => NormalizedStatus::Closed,
            "refunded" => NormalizedStatus::Refunded,
            "error" => NormalizedStatus::Error,
            _ => NormalizedStatus::Pending,
        };
        let transaction_id = match parsed.transaction_id.filter(|t| !t.is_empty()) {
            Some(tx) => Some(
                TransactionId::new(tx)
                    .map_err(|e| GatewayError::undecodable(Some(order_no.clone()), e.to_string()))?,
            ),
            None if status == NormalizedStatus::Paid => {
                return Err(GatewayError::undecodable(
                    Some(order_no),
                    "paid notification has no transaction id",
                ))
            }
            None => None,
        };

        Ok(NormalizedCallback {
            provider: self.provider,
            order_no,
            transaction_id,
            status,
            amount: parsed.amount,
            paid_at: Some(Timestamp::now()),
            raw,
        })
    }

    fn ack(&self, accepted: bool) -> AckToken {
        AckToken {
            status: if accepted { 200 } else { 500 },
            content_type: "text/plain",
            body: if accepted { "ok" } else { "fail" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_order_queries_as_not_paid() {
        let gateway = MockGateway::new(Provider::WalletA);
        let outcome = gateway
            .query_status(&OrderNo::new("X").unwrap(), PaymentChannel::WalletAQr)
            .await
            .unwrap();
        assert_eq!(outcome, QueryOutcome::NotPaid);
        assert_eq!(gateway.call_count("query_status"), 1);
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let gateway = MockGateway::new(Provider::WalletB);
        gateway.fail_method("close_order", GatewayError::TransientNetwork("reset".into()));
        let result = gateway
            .close_order(&OrderNo::new("X").unwrap(), PaymentChannel::WalletBWeb)
            .await;
        assert!(matches!(result, Err(GatewayError::TransientNetwork(_))));
    }

    #[test]
    fn decodes_callback_body() {
        let gateway = MockGateway::new(Provider::WalletA);
        let body = MockGateway::callback_body("VIP-1", "tx-1", "paid", 7900);
        let callback = gateway.verify_and_decode(&HeaderMap::new(), &body).unwrap();
        assert_eq!(callback.status, NormalizedStatus::Paid);
        assert_eq!(callback.amount, Some(7900));
    }

    #[test]
    fn rejecting_mock_fails_signature() {
        let gateway = MockGateway::new(Provider::WalletA);
        gateway.reject_signatures();
        let body = MockGateway::callback_body("VIP-1", "tx-1", "paid", 7900);
        assert!(matches!(
            gateway.verify_and_decode(&HeaderMap::new(), &body),
            Err(GatewayError::SignatureInvalid(_))
        ));
    }
}
