//! Callback records: the idempotency anchor for provider notifications.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{OrderNo, Timestamp, TransactionId, ValidationError};
use crate::domain::order::Provider;

use super::NormalizedCallback;

/// How a notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// Business effects were applied. At most one per `(order_no, transaction_id)`.
    Success,
    /// Same payment seen before; nothing applied.
    Duplicate,
    /// Processing failed or evidence conflicted.
    Failed,
    /// Recorded but not acted on (non-paid status).
    Pending,
}

impl CallbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackOutcome::Success => "success",
            CallbackOutcome::Duplicate => "duplicate",
            CallbackOutcome::Failed => "failed",
            CallbackOutcome::Pending => "pending",
        }
    }
}

impl FromStr for CallbackOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(CallbackOutcome::Success),
            "duplicate" => Ok(CallbackOutcome::Duplicate),
            "failed" => Ok(CallbackOutcome::Failed),
            "pending" => Ok(CallbackOutcome::Pending),
            other => Err(ValidationError::invalid_format(
                "callback_outcome",
                format!("unknown outcome '{}'", other),
            )),
        }
    }
}

/// One received notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub order_no: OrderNo,
    /// Absent on notifications that carry no payment, and on ones that could
    /// not be decoded.
    pub transaction_id: Option<TransactionId>,
    pub provider: Provider,
    pub payload: serde_json::Value,
    pub signature_valid: bool,
    pub processed: bool,
    pub outcome: CallbackOutcome,
    pub error_message: Option<String>,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl CallbackRecord {
    fn from_callback(
        callback: &NormalizedCallback,
        outcome: CallbackOutcome,
        error_message: Option<String>,
        received_at: Timestamp,
    ) -> Self {
        let processed = outcome != CallbackOutcome::Pending;
        Self {
            order_no: callback.order_no.clone(),
            transaction_id: callback.transaction_id.clone(),
            provider: callback.provider,
            payload: callback.raw.clone(),
            signature_valid: true,
            processed,
            outcome,
            error_message,
            received_at,
            processed_at: processed.then(Timestamp::now),
        }
    }

    pub fn success(callback: &NormalizedCallback, received_at: Timestamp) -> Self {
        Self::from_callback(callback, CallbackOutcome::Success, None, received_at)
    }

    pub fn duplicate(callback: &NormalizedCallback, received_at: Timestamp) -> Self {
        Self::from_callback(callback, CallbackOutcome::Duplicate, None, received_at)
    }

    pub fn failed(
        callback: &NormalizedCallback,
        error: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self::from_callback(callback, CallbackOutcome::Failed, Some(error.into()), received_at)
    }

    /// Verified notification whose content could not be decoded.
    pub fn undecodable(
        provider: Provider,
        order_no: OrderNo,
        payload: serde_json::Value,
        error: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            order_no,
            transaction_id: None,
            provider,
            payload,
            signature_valid: true,
            processed: true,
            outcome: CallbackOutcome::Failed,
            error_message: Some(error.into()),
            received_at,
            processed_at: Some(Timestamp::now()),
        }
    }

    /// Notification kept for the record without acting on it.
    pub fn pending(
        callback: &NormalizedCallback,
        note: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self::from_callback(callback, CallbackOutcome::Pending, Some(note.into()), received_at)
    }
}
