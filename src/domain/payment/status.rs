//! Provider-neutral payment vocabulary.
//!
//! Every adapter maps its own status strings onto [`NormalizedStatus`] before
//! anything else in the crate sees them.

use crate::domain::foundation::{OrderNo, Timestamp, TransactionId};
use crate::domain::order::{PaymentChannel, Provider};
use serde::{Deserialize, Serialize};

/// Shared status enum all provider vocabularies map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedStatus {
    Pending,
    Paid,
    Closed,
    Refunded,
    Error,
}

impl NormalizedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedStatus::Pending => "pending",
            NormalizedStatus::Paid => "paid",
            NormalizedStatus::Closed => "closed",
            NormalizedStatus::Refunded => "refunded",
            NormalizedStatus::Error => "error",
        }
    }
}

/// Details of a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidDetails {
    pub transaction_id: TransactionId,

    /// Amount captured, in minor units, when the provider reports it.
    pub amount: Option<i64>,

    pub paid_at: Option<Timestamp>,
}

/// Result of asking a provider about an order.
///
/// `Unknown` means the question could not be answered (network failure,
/// timeout, malformed reply). It must never be read as "not paid".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Paid(PaidDetails),
    NotPaid,
    Closed,
    Refunded { transaction_id: Option<TransactionId> },
    Unknown { reason: String },
}

impl QueryOutcome {
    /// Builds an outcome from a normalized status plus optional payment details.
    ///
    /// A `Paid` status without a transaction id cannot be acted on and
    /// becomes `Unknown`.
    pub fn from_status(status: NormalizedStatus, details: Option<PaidDetails>) -> Self {
        match (status, details) {
            (NormalizedStatus::Paid, Some(details)) => QueryOutcome::Paid(details),
            (NormalizedStatus::Paid, None) => QueryOutcome::Unknown {
                reason: "provider reported paid without a transaction id".to_string(),
            },
            (NormalizedStatus::Pending, _) => QueryOutcome::NotPaid,
            (NormalizedStatus::Closed, _) => QueryOutcome::Closed,
            (NormalizedStatus::Refunded, details) => QueryOutcome::Refunded {
                transaction_id: details.map(|d| d.transaction_id),
            },
            (NormalizedStatus::Error, _) => QueryOutcome::Unknown {
                reason: "provider reported a payment error".to_string(),
            },
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        QueryOutcome::Unknown {
            reason: reason.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryOutcome::Paid(_) => "paid",
            QueryOutcome::NotPaid => "not_paid",
            QueryOutcome::Closed => "closed",
            QueryOutcome::Refunded { .. } => "refunded",
            QueryOutcome::Unknown { .. } => "unknown",
        }
    }
}

/// Request to open a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentRequest {
    pub order_no: OrderNo,
    pub amount: i64,
    pub description: String,
    pub channel: PaymentChannel,
    pub client_ip: Option<String>,
    pub return_url: Option<String>,
    pub expires_at: Timestamp,
}

/// Provider-specific handle the client uses to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IntentHandle {
    QrCode(String),
    RedirectUrl(String),
}

/// Opened payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub provider: Provider,
    pub channel: PaymentChannel,
    pub handle: IntentHandle,
    pub expires_at: Timestamp,
}

/// Request to refund a captured payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub order_no: OrderNo,
    pub channel: PaymentChannel,
    pub refund_ref: String,
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    Accepted { provider_refund_id: Option<String> },
    Rejected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AlreadyClosed,
}

/// A verified push notification in provider-neutral form.
///
/// `transaction_id` is always present for `Paid`; providers omit it on
/// notifications for unpaid or closed orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCallback {
    pub provider: Provider,
    pub order_no: OrderNo,
    pub transaction_id: Option<TransactionId>,
    pub status: NormalizedStatus,
    pub amount: Option<i64>,
    pub paid_at: Option<Timestamp>,
    pub raw: serde_json::Value,
}

/// Response a provider expects from a notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}
