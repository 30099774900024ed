//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod account;
pub mod order;
pub mod payment;

pub use account::{
    LockPaymentCommand, LockPaymentHandler, PaymentLockResult, UnlockPaymentCommand,
    UnlockPaymentHandler,
};
pub use order::{
    CancelOrderCommand, CancelOrderHandler, CancelOrderResult, ConfirmStepUpCommand,
    ConfirmStepUpHandler, ConfirmStepUpResult, CreateOrderCommand, CreateOrderHandler,
    CreateOrderResult, GetOrderHandler, GetOrderQuery, GetOrderResult,
    GetReconciliationStatsHandler, GetReconciliationStatsQuery, InitiatePaymentCommand,
    InitiatePaymentHandler, InitiatePaymentResult, ListUserOrdersHandler, ListUserOrdersQuery,
    ProcessRefundCommand, ProcessRefundHandler, ProcessRefundResult, ReconcileOrderCommand,
    ReconcileOrderHandler, RequestRefundCommand, RequestRefundHandler, RequestRefundResult,
};
pub use payment::{
    CallbackDisposition, CallbackError, HandlePaymentCallbackCommand,
    HandlePaymentCallbackHandler, HandlePaymentCallbackResult,
};
