//! Payment module - provider-neutral payment types.
//!
//! Status normalization, the gateway error taxonomy, callback records and
//! HMAC signature helpers shared by all provider adapters.

mod callback;
mod errors;
pub mod signature;
mod status;

pub use callback::{CallbackOutcome, CallbackRecord};
pub use errors::GatewayError;
pub use signature::HmacSigner;
pub use status::{
    AckToken, CloseOutcome, CreatePaymentRequest, IntentHandle, NormalizedCallback,
    NormalizedStatus, PaidDetails, PaymentIntent, QueryOutcome, RefundOutcome, RefundRequest,
};
