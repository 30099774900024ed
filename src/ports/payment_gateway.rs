//! Payment gateway port - one implementation per wallet provider.
//!
//! Adapters translate between provider wire formats and the provider-neutral
//! types in [`crate::domain::payment`]. Callers never see provider status
//! strings, signatures or amount encodings.
//!
//! # Contract
//!
//! - `query_status` must return [`QueryOutcome::Unknown`] (or a retryable
//!   error) when the provider cannot be reached. It must never report
//!   `NotPaid` for a failed call.
//! - `verify_and_decode` must reject anything whose signature does not
//!   verify before looking at the business fields.

use async_trait::async_trait;
use http::HeaderMap;

use crate::domain::foundation::OrderNo;
use crate::domain::order::{PaymentChannel, Provider};
use crate::domain::payment::{
    AckToken, CloseOutcome, CreatePaymentRequest, GatewayError, NormalizedCallback, PaymentIntent,
    QueryOutcome, RefundOutcome, RefundRequest,
};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider this adapter speaks for.
    fn provider(&self) -> Provider;

    /// Opens a payment with the provider and returns what the client needs
    /// to complete it (QR payload or redirect URL).
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Asks the provider for the authoritative status of an order.
    async fn query_status(
        &self,
        order_no: &OrderNo,
        channel: PaymentChannel,
    ) -> Result<QueryOutcome, GatewayError>;

    /// Submits a refund for a captured payment.
    async fn refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError>;

    /// Closes an unpaid order at the provider so it can no longer be paid.
    async fn close_order(
        &self,
        order_no: &OrderNo,
        channel: PaymentChannel,
    ) -> Result<CloseOutcome, GatewayError>;

    /// Verifies a push notification and decodes it.
    fn verify_and_decode(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<NormalizedCallback, GatewayError>;

    /// Response body the provider expects for an accepted or refused
    /// notification.
    fn ack(&self, accepted: bool) -> AckToken;
}
