//! HTTP adapter for order endpoints.
//!
//! Exposes the order lifecycle via REST API, plus the unauthenticated
//! notification endpoints the payment providers call. See [`orders_router`]
//! for the full route table.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::ErrorResponse;
pub use handlers::{AdminUser, AuthenticatedUser, OrderApiError, OrdersAppState};
pub use routes::orders_router;
