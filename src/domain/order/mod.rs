//! Order module - purchase lifecycle of a VIP package.
//!
//! # Module Structure
//!
//! - `aggregate` - Order aggregate and creation input
//! - `channel` - Payment channels, providers and device types
//! - `state` - Order and refund state machines
//! - `transition` - Transition planning with no-op and conflict semantics
//! - `errors` - Order-specific error types

mod aggregate;
mod channel;
mod errors;
mod state;
mod transition;

#[cfg(test)]
pub(crate) use aggregate::test_support;

pub use aggregate::{DeviceContext, NewOrder, Order};
pub use channel::{DeviceType, PaymentChannel, Provider};
pub use errors::OrderError;
pub use state::{OrderState, RefundState};
pub use transition::{
    TransitionEvidence, TransitionOutcome, TransitionPlan, TransitionRejection, TransitionSource,
};
