//! Order handlers.
//!
//! Command and query handlers for the order lifecycle:
//!
//! ## Commands
//! - Creating orders behind the security gate
//! - Initiating payment at the order's provider
//! - Confirming step-up verification
//! - Cancelling unpaid orders
//! - Requesting and processing refunds
//! - Reconciling a single order on demand
//!
//! ## Queries
//! - Get order with VIP status
//! - List a user's orders
//! - Reconciliation totals over recent days

mod cancel_order;
mod confirm_step_up;
mod create_order;
mod get_order;
mod initiate_payment;
mod process_refund;
mod reconcile_order;
mod reconciliation_stats;
mod request_refund;

// Commands
pub use cancel_order::{CancelOrderCommand, CancelOrderHandler, CancelOrderResult};
pub use confirm_step_up::{ConfirmStepUpCommand, ConfirmStepUpHandler, ConfirmStepUpResult};
pub use create_order::{CreateOrderCommand, CreateOrderHandler, CreateOrderResult};
pub use initiate_payment::{
    InitiatePaymentCommand, InitiatePaymentHandler, InitiatePaymentResult,
};
pub use process_refund::{ProcessRefundCommand, ProcessRefundHandler, ProcessRefundResult};
pub use reconcile_order::{ReconcileOrderCommand, ReconcileOrderHandler};
pub use request_refund::{RequestRefundCommand, RequestRefundHandler, RequestRefundResult};

// Queries
pub use get_order::{
    GetOrderHandler, GetOrderQuery, GetOrderResult, ListUserOrdersHandler, ListUserOrdersQuery,
};
pub use reconciliation_stats::{GetReconciliationStatsHandler, GetReconciliationStatsQuery};
