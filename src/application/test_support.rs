//! Wiring of in-memory adapters shared by application tests.

use std::sync::Arc;

use crate::adapters::gateway::MockGateway;
use crate::adapters::memory::{
    InMemoryAccountDirectory, InMemoryCallbackRecords, InMemoryEntitlementStore,
    InMemoryOrderRepository, InMemoryPackageCatalog, RecordingAuditLog, RecordingNotifier,
};
use crate::domain::entitlement::{Package, PackageDuration, LIFETIME_PACKAGE_CODE};
use crate::domain::foundation::{OrderNo, PackageId, Timestamp, TransactionId, UserId};
use crate::domain::order::{
    DeviceContext, NewOrder, Order, OrderState, PaymentChannel, Provider, RefundState,
};

use super::{EntitlementApplier, GatewayRegistry, PaymentSettlement};

pub fn monthly_package() -> Package {
    Package {
        id: PackageId::new("monthly").unwrap(),
        code: "monthly".to_string(),
        name: "VIP Monthly".to_string(),
        price_cents: 7900,
        duration: PackageDuration::Days(30),
        active: true,
    }
}

pub fn lifetime_package() -> Package {
    Package {
        id: PackageId::new("lifetime").unwrap(),
        code: LIFETIME_PACKAGE_CODE.to_string(),
        name: "VIP Lifetime".to_string(),
        price_cents: 29900,
        duration: PackageDuration::Lifetime,
        active: true,
    }
}

pub fn retired_package() -> Package {
    Package {
        id: PackageId::new("retired").unwrap(),
        code: "retired".to_string(),
        name: "Old Quarterly".to_string(),
        price_cents: 19900,
        duration: PackageDuration::Days(90),
        active: false,
    }
}

pub struct Harness {
    pub orders: Arc<InMemoryOrderRepository>,
    pub callbacks: Arc<InMemoryCallbackRecords>,
    pub entitlements: Arc<InMemoryEntitlementStore>,
    pub catalog: Arc<InMemoryPackageCatalog>,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<RecordingAuditLog>,
    pub wallet_a: MockGateway,
    pub wallet_b: MockGateway,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self {
            orders: Arc::new(InMemoryOrderRepository::new()),
            callbacks: Arc::new(InMemoryCallbackRecords::new()),
            entitlements: Arc::new(InMemoryEntitlementStore::new()),
            catalog: Arc::new(InMemoryPackageCatalog::with_packages([
                monthly_package(),
                lifetime_package(),
                retired_package(),
            ])),
            accounts: Arc::new(InMemoryAccountDirectory::permissive()),
            notifier: Arc::new(notifier),
            audit: Arc::new(RecordingAuditLog::new()),
            wallet_a: MockGateway::new(Provider::WalletA),
            wallet_b: MockGateway::new(Provider::WalletB),
        }
    }

    pub fn registry(&self) -> GatewayRegistry {
        GatewayRegistry::new()
            .register(Arc::new(self.wallet_a.clone()))
            .register(Arc::new(self.wallet_b.clone()))
    }

    pub fn applier(&self) -> EntitlementApplier {
        EntitlementApplier::new(self.entitlements.clone(), self.catalog.clone())
    }

    pub fn settlement(&self) -> Arc<PaymentSettlement> {
        Arc::new(PaymentSettlement::new(
            self.orders.clone(),
            self.registry(),
            self.applier(),
            self.notifier.clone(),
            self.audit.clone(),
        ))
    }

    /// Stores a pending monthly order for `user-1` on walletA, created at `created_at`.
    pub fn seed_pending(&self, order_no: &str, created_at: Timestamp) -> Order {
        let order = Order::create(NewOrder {
            order_no: OrderNo::new(order_no).unwrap(),
            user_id: user(),
            package_id: monthly_package().id,
            amount: 7900,
            channel: PaymentChannel::WalletAQr,
            step_up_required: false,
            device: DeviceContext::default(),
            created_at,
            expires_at: created_at.plus_minutes(15),
        })
        .unwrap();
        self.orders.put(order.clone());
        order
    }

    /// Stores a monthly order already paid with `transaction_id` at `paid_at`.
    pub fn seed_paid(&self, order_no: &str, transaction_id: &str, paid_at: Timestamp) -> Order {
        let mut order = self.seed_pending(order_no, paid_at.minus_minutes(1));
        order.state = OrderState::Paid;
        order.refund_state = RefundState::None;
        order.transaction_id = Some(TransactionId::new(transaction_id).unwrap());
        order.paid_at = Some(paid_at);
        order.updated_at = paid_at;
        self.orders.put(order.clone());
        order
    }

    pub fn stored(&self, order_no: &str) -> Order {
        self.orders.get(&OrderNo::new(order_no).unwrap()).unwrap()
    }
}

pub fn user() -> UserId {
    UserId::new("user-1").unwrap()
}

pub fn order_no(value: &str) -> OrderNo {
    OrderNo::new(value).unwrap()
}

pub fn tx(value: &str) -> TransactionId {
    TransactionId::new(value).unwrap()
}
