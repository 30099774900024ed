//! In-memory package catalog and account directory for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::entitlement::Package;
use crate::domain::foundation::{DomainError, PackageId, UserId};
use crate::domain::security::AccountStanding;
use crate::ports::{AccountStandingReader, PackageCatalog, PaymentLockState, PaymentLockWriter};

#[derive(Default)]
pub struct InMemoryPackageCatalog {
    packages: RwLock<HashMap<PackageId, Package>>,
}

impl InMemoryPackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let catalog = Self::new();
        for package in packages {
            catalog.add(package);
        }
        catalog
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn add(&self, package: Package) {
        self.packages
            .write()
            .expect("InMemoryPackageCatalog: lock poisoned")
            .insert(package.id.clone(), package);
    }
}

#[async_trait]
impl PackageCatalog for InMemoryPackageCatalog {
    async fn find(&self, id: &PackageId) -> Result<Option<Package>, DomainError> {
        Ok(self
            .packages
            .read()
            .expect("InMemoryPackageCatalog: lock poisoned")
            .get(id)
            .cloned())
    }
}

/// Account standings keyed by user; unknown users get `default_standing`.
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<UserId, AccountStanding>>,
    lock_reasons: RwLock<HashMap<UserId, String>>,
    default_standing: AccountStanding,
}

impl InMemoryAccountDirectory {
    /// Every user is in good standing unless overridden.
    pub fn permissive() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            lock_reasons: RwLock::new(HashMap::new()),
            default_standing: AccountStanding::good(),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set(&self, user_id: UserId, standing: AccountStanding) {
        self.accounts
            .write()
            .expect("InMemoryAccountDirectory: lock poisoned")
            .insert(user_id, standing);
    }
}

#[async_trait]
impl AccountStandingReader for InMemoryAccountDirectory {
    async fn standing(&self, user_id: &UserId) -> Result<AccountStanding, DomainError> {
        Ok(self
            .accounts
            .read()
            .expect("InMemoryAccountDirectory: lock poisoned")
            .get(user_id)
            .copied()
            .unwrap_or(self.default_standing))
    }
}

#[async_trait]
impl PaymentLockWriter for InMemoryAccountDirectory {
    async fn set_payment_lock(
        &self,
        user_id: &UserId,
        reason: Option<&str>,
    ) -> Result<Option<PaymentLockState>, DomainError> {
        let mut accounts = self
            .accounts
            .write()
            .expect("InMemoryAccountDirectory: lock poisoned");
        let mut reasons = self
            .lock_reasons
            .write()
            .expect("InMemoryAccountDirectory: lock poisoned");

        let standing = accounts
            .get(user_id)
            .copied()
            .unwrap_or(self.default_standing);
        if !standing.exists {
            return Ok(None);
        }

        let previous = PaymentLockState {
            locked: standing.payment_locked,
            reason: reasons.get(user_id).cloned(),
        };
        accounts.insert(
            user_id.clone(),
            AccountStanding {
                payment_locked: reason.is_some(),
                ..standing
            },
        );
        match reason {
            Some(reason) => reasons.insert(user_id.clone(), reason.to_string()),
            None => reasons.remove(user_id),
        };

        Ok(Some(previous))
    }
}
