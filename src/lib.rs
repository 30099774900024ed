//! VIP Orders - order lifecycle and payment reconciliation engine.
//!
//! Orders for VIP membership packages are paid through external wallet
//! providers. Provider callbacks, scheduled reconciliation queries and user
//! actions all converge on a single atomic transition per order, and paid
//! orders grant membership exactly once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
