//! Payment gateway error taxonomy.
//!
//! | Error | Retried | Surfaced |
//! |-------|---------|----------|
//! | ProviderUnavailable | no (until config fixed) | to caller |
//! | ProviderRejected | no | to caller |
//! | SignatureInvalid | never | security log |
//! | TransientNetwork | by the scheduler | never as "not paid" |
//! | MalformedPayload | no | logged |
//! | UndecodableNotification | by provider redelivery | failed callback record |

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, OrderNo};

/// Errors raised by gateway adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Credentials or configuration for the provider are missing.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider declined the request for a business reason.
    #[error("Provider rejected request ({code}): {message}")]
    ProviderRejected { code: String, message: String },

    /// Callback signature or MAC did not verify.
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// Network failure, timeout, or provider-side 5xx.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Provider reply or callback body could not be interpreted.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Notification passed signature checks but its content did not decode.
    #[error("Undecodable notification: {reason}")]
    UndecodableNotification {
        order_no: Option<OrderNo>,
        reason: String,
    },
}

impl GatewayError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::ProviderRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn undecodable(order_no: Option<OrderNo>, reason: impl Into<String>) -> Self {
        GatewayError::UndecodableNotification {
            order_no,
            reason: reason.into(),
        }
    }

    /// Returns true if repeating the call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::TransientNetwork(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            GatewayError::ProviderRejected { .. } => ErrorCode::ProviderRejected,
            GatewayError::SignatureInvalid(_) => ErrorCode::SignatureInvalid,
            GatewayError::TransientNetwork(_) => ErrorCode::TransientNetworkError,
            GatewayError::MalformedPayload(_) | GatewayError::UndecodableNotification { .. } => {
                ErrorCode::InvalidFormat
            }
        }
    }

    /// HTTP status used when this error reaches an API caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ProviderRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
            GatewayError::TransientNetwork(_) => StatusCode::BAD_GATEWAY,
            GatewayError::MalformedPayload(_) | GatewayError::UndecodableNotification { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::MalformedPayload(err.to_string())
        } else {
            GatewayError::TransientNetwork(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(GatewayError::TransientNetwork("timeout".into()).is_retryable());
        assert!(!GatewayError::ProviderUnavailable("no key".into()).is_retryable());
        assert!(!GatewayError::rejected("ORDERPAID", "already paid").is_retryable());
        assert!(!GatewayError::SignatureInvalid("bad mac".into()).is_retryable());
    }

    #[test]
    fn rejected_displays_code_and_message() {
        let err = GatewayError::rejected("ORDER_CLOSED", "order closed");
        assert_eq!(
            err.to_string(),
            "Provider rejected request (ORDER_CLOSED): order closed"
        );
    }

    #[test]
    fn signature_invalid_maps_to_unauthorized() {
        let err = GatewayError::SignatureInvalid("mismatch".into());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), ErrorCode::SignatureInvalid);
    }

    #[test]
    fn converts_to_domain_error_with_code() {
        let err: DomainError = GatewayError::ProviderUnavailable("wallet_b".into()).into();
        assert_eq!(err.code, ErrorCode::ProviderUnavailable);
    }
}
