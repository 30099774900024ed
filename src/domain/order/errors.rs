//! Order-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | PackageNotFound | 404 |
//! | AccountNotFound | 404 |
//! | PackageUnavailable | 409 |
//! | LifetimeAlreadyOwned | 409 |
//! | SecurityRejected | 403 |
//! | Forbidden | 403 |
//! | AlreadyPaid | 409 |
//! | InvalidState | 409 |
//! | Expired | 410 |
//! | NotRefundable | 422 |
//! | ConflictingEvidence | 409 |
//! | Gateway | per gateway error |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    DomainError, ErrorCode, OrderNo, PackageId, UserId, ValidationError,
};
use crate::domain::payment::GatewayError;
use crate::domain::security::RejectionReason;

use super::{OrderState, TransitionRejection};

/// Errors surfaced by order operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NotFound(OrderNo),

    PackageNotFound(PackageId),

    /// No payment account exists for the user.
    AccountNotFound(UserId),

    /// Package exists but is not on sale.
    PackageUnavailable(PackageId),

    /// User already owns a lifetime entitlement.
    LifetimeAlreadyOwned,

    /// Security gate refused the request.
    SecurityRejected(RejectionReason),

    /// Caller does not own the order.
    Forbidden(OrderNo),

    /// Cancellation requested for a paid order.
    AlreadyPaid(OrderNo),

    /// The order is not in a state that allows the operation.
    InvalidState {
        current: OrderState,
        attempted: String,
    },

    /// Payment window has closed.
    Expired(OrderNo),

    /// Refund preconditions failed.
    NotRefundable { reason: String },

    /// Provider evidence contradicts the stored order.
    ConflictingEvidence { order_no: OrderNo, detail: String },

    /// Gateway call failed.
    Gateway(GatewayError),

    ValidationFailed { field: String, message: String },

    Infrastructure(String),
}

impl OrderError {
    pub fn not_found(order_no: OrderNo) -> Self {
        OrderError::NotFound(order_no)
    }

    pub fn invalid_state(current: OrderState, attempted: impl Into<String>) -> Self {
        OrderError::InvalidState {
            current,
            attempted: attempted.into(),
        }
    }

    pub fn not_refundable(reason: impl Into<String>) -> Self {
        OrderError::NotRefundable {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        OrderError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        OrderError::Infrastructure(message.into())
    }

    /// Maps a planner rejection onto the caller-facing taxonomy.
    pub fn from_rejection(order_no: &OrderNo, rejection: TransitionRejection) -> Self {
        match rejection {
            TransitionRejection::AlreadyPaid { .. } => OrderError::AlreadyPaid(order_no.clone()),
            TransitionRejection::NotAllowed { from, to } => {
                OrderError::invalid_state(from, format!("move to {}", to))
            }
            TransitionRejection::MissingTransactionId => {
                OrderError::validation("transaction_id", "payment evidence has no transaction id")
            }
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::NotFound(_) => ErrorCode::OrderNotFound,
            OrderError::PackageNotFound(_) => ErrorCode::PackageNotFound,
            OrderError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            OrderError::PackageUnavailable(_) => ErrorCode::PackageUnavailable,
            OrderError::LifetimeAlreadyOwned => ErrorCode::LifetimeAlreadyOwned,
            OrderError::SecurityRejected(_) => ErrorCode::SecurityRejected,
            OrderError::Forbidden(_) => ErrorCode::Forbidden,
            OrderError::AlreadyPaid(_) => ErrorCode::AlreadyPaid,
            OrderError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            OrderError::Expired(_) => ErrorCode::OrderExpired,
            OrderError::NotRefundable { .. } => ErrorCode::NotRefundable,
            OrderError::ConflictingEvidence { .. } => ErrorCode::ConflictingEvidence,
            OrderError::Gateway(err) => err.code(),
            OrderError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            OrderError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            OrderError::NotFound(order_no) => format!("Order not found: {}", order_no),
            OrderError::PackageNotFound(id) => format!("Package not found: {}", id),
            OrderError::AccountNotFound(user_id) => format!("Account not found: {}", user_id),
            OrderError::PackageUnavailable(id) => format!("Package {} is not available", id),
            OrderError::LifetimeAlreadyOwned => {
                "A lifetime membership is already active on this account".to_string()
            }
            OrderError::SecurityRejected(reason) => reason.message().to_string(),
            OrderError::Forbidden(order_no) => {
                format!("Order {} does not belong to the caller", order_no)
            }
            OrderError::AlreadyPaid(order_no) => {
                format!("Order {} is already paid; request a refund instead", order_no)
            }
            OrderError::InvalidState { current, attempted } => {
                format!("Cannot {} order in {} state", attempted, current)
            }
            OrderError::Expired(order_no) => format!("Order {} has expired", order_no),
            OrderError::NotRefundable { reason } => format!("Order is not refundable: {}", reason),
            OrderError::ConflictingEvidence { order_no, detail } => {
                format!("Conflicting payment evidence for {}: {}", order_no, detail)
            }
            OrderError::Gateway(err) => err.to_string(),
            OrderError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            OrderError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Infrastructure(_) => true,
            OrderError::Gateway(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for OrderError {}

impl From<GatewayError> for OrderError {
    fn from(err: GatewayError) -> Self {
        OrderError::Gateway(err)
    }
}

impl From<ValidationError> for OrderError {
    fn from(err: ValidationError) -> Self {
        OrderError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for OrderError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => OrderError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => OrderError::Infrastructure(err.to_string()),
        }
    }
}

impl From<OrderError> for DomainError {
    fn from(err: OrderError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_no() -> OrderNo {
        OrderNo::new("VIP17000000000001234").unwrap()
    }

    // ============================================================
    // Code Tests
    // ============================================================

    #[test]
    fn not_found_maps_to_order_not_found() {
        assert_eq!(OrderError::not_found(order_no()).code(), ErrorCode::OrderNotFound);
    }

    #[test]
    fn missing_account_has_its_own_code() {
        let err = OrderError::AccountNotFound(UserId::new("user-9").unwrap());
        assert_eq!(err.code(), ErrorCode::AccountNotFound);
        assert!(err.message().contains("user-9"));
    }

    #[test]
    fn gateway_error_keeps_gateway_code() {
        let err: OrderError = GatewayError::TransientNetwork("timeout".into()).into();
        assert_eq!(err.code(), ErrorCode::TransientNetworkError);
    }

    #[test]
    fn security_rejection_maps_to_security_code() {
        let err = OrderError::SecurityRejected(RejectionReason::StepUpRequired);
        assert_eq!(err.code(), ErrorCode::SecurityRejected);
        assert!(err.message().contains("verification"));
    }

    // ============================================================
    // Rejection Mapping Tests
    // ============================================================

    #[test]
    fn already_paid_rejection_becomes_already_paid() {
        let err = OrderError::from_rejection(
            &order_no(),
            TransitionRejection::AlreadyPaid {
                current: OrderState::Paid,
            },
        );
        assert_eq!(err, OrderError::AlreadyPaid(order_no()));
    }

    #[test]
    fn not_allowed_rejection_becomes_invalid_state() {
        let err = OrderError::from_rejection(
            &order_no(),
            TransitionRejection::NotAllowed {
                from: OrderState::Cancelled,
                to: OrderState::RefundPending,
            },
        );
        assert!(matches!(
            err,
            OrderError::InvalidState { current: OrderState::Cancelled, .. }
        ));
    }

    // ============================================================
    // Retryable Tests
    // ============================================================

    #[test]
    fn infrastructure_and_transient_gateway_are_retryable() {
        assert!(OrderError::infrastructure("db down").is_retryable());
        assert!(OrderError::Gateway(GatewayError::TransientNetwork("reset".into())).is_retryable());
    }

    #[test]
    fn business_errors_are_not_retryable() {
        assert!(!OrderError::AlreadyPaid(order_no()).is_retryable());
        assert!(!OrderError::not_refundable("window closed").is_retryable());
        assert!(!OrderError::Gateway(GatewayError::rejected("X", "no")).is_retryable());
    }

    // ============================================================
    // Conversion Tests
    // ============================================================

    #[test]
    fn validation_error_converts_with_field() {
        let err: OrderError = ValidationError::empty_field("package_id").into();
        assert!(matches!(
            err,
            OrderError::ValidationFailed { ref field, .. } if field == "package_id"
        ));
    }

    #[test]
    fn converts_to_domain_error() {
        let domain: DomainError = OrderError::Expired(order_no()).into();
        assert_eq!(domain.code, ErrorCode::OrderExpired);
        assert!(domain.message.contains("expired"));
    }
}
