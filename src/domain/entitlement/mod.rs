//! Entitlement module - VIP packages and user entitlement arithmetic.

mod grant;
mod package;

pub use grant::{EntitlementAction, UserEntitlement, VipStatus};
pub use package::{Package, PackageDuration, LIFETIME_PACKAGE_CODE};
