//! Route configuration for order endpoints.
//!
//! Configures Axum router with order, admin and provider callback routes.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel_order, confirm_step_up, create_order, get_order, initiate_payment, list_orders,
    lock_payment, process_refund, reconcile_order, reconciliation_stats, request_refund,
    unlock_payment, wallet_a_notify, wallet_b_notify, OrdersAppState,
};

/// Creates the order router with all endpoints.
///
/// ## User Endpoints (X-User-Id)
/// - `POST /api/orders` - Open a purchase order
/// - `GET /api/orders` - List the caller's orders
/// - `GET /api/orders/:order_no` - Order details
/// - `POST /api/orders/:order_no/pay` - Open a payment intent
/// - `POST /api/orders/:order_no/cancel` - Cancel an unpaid order
/// - `POST /api/orders/:order_no/refund` - Request a refund
///
/// ## Admin Endpoints (X-User-Role: admin)
/// - `POST /api/admin/orders/:order_no/reconcile`
/// - `POST /api/admin/orders/:order_no/step-up`
/// - `POST /api/admin/orders/:order_no/refund/process`
/// - `GET /api/admin/reconciliation/stats?days=7`
/// - `POST /api/admin/users/:user_id/payment-lock`
/// - `POST /api/admin/users/:user_id/payment-unlock`
///
/// ## Provider Callbacks (signature verified)
/// - `POST /api/payments/wallet-a/notify`
/// - `POST /api/payments/wallet-b/notify`
pub fn orders_router() -> Router<OrdersAppState> {
    Router::new()
        // User endpoints
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/:order_no", get(get_order))
        .route("/api/orders/:order_no/pay", post(initiate_payment))
        .route("/api/orders/:order_no/cancel", post(cancel_order))
        .route("/api/orders/:order_no/refund", post(request_refund))
        // Admin endpoints
        .route("/api/admin/orders/:order_no/reconcile", post(reconcile_order))
        .route("/api/admin/orders/:order_no/step-up", post(confirm_step_up))
        .route(
            "/api/admin/orders/:order_no/refund/process",
            post(process_refund),
        )
        .route("/api/admin/reconciliation/stats", get(reconciliation_stats))
        .route("/api/admin/users/:user_id/payment-lock", post(lock_payment))
        .route("/api/admin/users/:user_id/payment-unlock", post(unlock_payment))
        // Provider callbacks
        .route("/api/payments/wallet-a/notify", post(wallet_a_notify))
        .route("/api/payments/wallet-b/notify", post(wallet_b_notify))
}
