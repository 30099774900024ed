//! Order and refund state machines.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Created, waiting for the provider to confirm payment.
    Pending,

    /// Provider confirmed payment; entitlement granted.
    Paid,

    /// Cancelled by the user, by timeout, or because the provider closed it.
    Cancelled,

    /// Refund requested and awaiting provider confirmation.
    RefundPending,

    /// Provider refunded the payment. Terminal.
    RefundSuccess,

    /// Provider declined the refund. A new refund may be requested.
    RefundFailed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Paid => "paid",
            OrderState::Cancelled => "cancelled",
            OrderState::RefundPending => "refund_pending",
            OrderState::RefundSuccess => "refund_success",
            OrderState::RefundFailed => "refund_failed",
        }
    }

    /// True for every state reached after a confirmed payment.
    ///
    /// These states all carry a provider transaction id.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OrderState::Paid
                | OrderState::RefundPending
                | OrderState::RefundSuccess
                | OrderState::RefundFailed
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderState::Pending),
            "paid" => Ok(OrderState::Paid),
            "cancelled" => Ok(OrderState::Cancelled),
            "refund_pending" => Ok(OrderState::RefundPending),
            "refund_success" => Ok(OrderState::RefundSuccess),
            "refund_failed" => Ok(OrderState::RefundFailed),
            other => Err(ValidationError::invalid_format(
                "order_state",
                format!("unknown state '{}'", other),
            )),
        }
    }
}

impl StateMachine for OrderState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderState::*;
        matches!(
            (self, target),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, RefundPending)
                | (RefundPending, RefundSuccess)
                | (RefundPending, RefundFailed)
                | (RefundFailed, RefundPending)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderState::*;
        match self {
            Pending => vec![Paid, Cancelled],
            Paid => vec![RefundPending],
            RefundPending => vec![RefundSuccess, RefundFailed],
            RefundFailed => vec![RefundPending],
            Cancelled | RefundSuccess => vec![],
        }
    }
}

/// Progress of the refund sub-process, tracked alongside [`OrderState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    #[default]
    None,
    Requested,
    Succeeded,
    Failed,
}

impl RefundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundState::None => "none",
            RefundState::Requested => "requested",
            RefundState::Succeeded => "succeeded",
            RefundState::Failed => "failed",
        }
    }

    /// Refund state implied by entering an order state.
    pub fn for_order_state(state: OrderState, current: RefundState) -> RefundState {
        match state {
            OrderState::RefundPending => RefundState::Requested,
            OrderState::RefundSuccess => RefundState::Succeeded,
            OrderState::RefundFailed => RefundState::Failed,
            _ => current,
        }
    }
}

impl FromStr for RefundState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RefundState::None),
            "requested" => Ok(RefundState::Requested),
            "succeeded" => Ok(RefundState::Succeeded),
            "failed" => Ok(RefundState::Failed),
            other => Err(ValidationError::invalid_format(
                "refund_state",
                format!("unknown refund state '{}'", other),
            )),
        }
    }
}
