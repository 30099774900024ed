//! VIP packages offered in the catalog.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::PackageId;

/// Catalog code reserved for the lifetime package.
pub const LIFETIME_PACKAGE_CODE: &str = "lifetime";

/// How much VIP time a package grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum PackageDuration {
    Days(u32),
    Lifetime,
}

impl PackageDuration {
    /// Interprets the catalog columns; `-1` days or the lifetime code mean lifetime.
    pub fn from_catalog(duration_days: i32, code: &str) -> Self {
        if duration_days < 0 || code == LIFETIME_PACKAGE_CODE {
            PackageDuration::Lifetime
        } else {
            PackageDuration::Days(duration_days as u32)
        }
    }

    /// Catalog column value for this duration.
    pub fn as_catalog_days(&self) -> i32 {
        match self {
            PackageDuration::Days(days) => *days as i32,
            PackageDuration::Lifetime => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub code: String,
    pub name: String,
    pub price_cents: i64,
    pub duration: PackageDuration,
    pub active: bool,
}

impl Package {
    pub fn is_lifetime(&self) -> bool {
        self.duration == PackageDuration::Lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_days_mean_lifetime() {
        assert_eq!(PackageDuration::from_catalog(-1, "forever"), PackageDuration::Lifetime);
    }

    #[test]
    fn lifetime_code_means_lifetime() {
        assert_eq!(
            PackageDuration::from_catalog(36500, LIFETIME_PACKAGE_CODE),
            PackageDuration::Lifetime
        );
    }

    #[test]
    fn positive_days_are_kept() {
        assert_eq!(PackageDuration::from_catalog(30, "monthly"), PackageDuration::Days(30));
        assert_eq!(PackageDuration::Days(30).as_catalog_days(), 30);
        assert_eq!(PackageDuration::Lifetime.as_catalog_days(), -1);
    }
}
