//! Read access to the VIP package catalog.

use async_trait::async_trait;

use crate::domain::entitlement::Package;
use crate::domain::foundation::{DomainError, PackageId};

#[async_trait]
pub trait PackageCatalog: Send + Sync {
    /// Finds a package by id, including inactive ones.
    async fn find(&self, id: &PackageId) -> Result<Option<Package>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn PackageCatalog) {}
    }
}
