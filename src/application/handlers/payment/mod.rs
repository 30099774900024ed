//! Payment handlers.
//!
//! Entry point for provider push notifications. Settlement itself lives in
//! [`crate::application::PaymentSettlement`].

mod handle_payment_callback;

pub use handle_payment_callback::{
    CallbackDisposition, CallbackError, HandlePaymentCallbackCommand,
    HandlePaymentCallbackHandler, HandlePaymentCallbackResult,
};
