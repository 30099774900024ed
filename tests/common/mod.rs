//! In-memory wiring shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use vip_orders::adapters::gateway::MockGateway;
use vip_orders::adapters::http::{api_router, OrdersAppState};
use vip_orders::adapters::memory::{
    InMemoryAccountDirectory, InMemoryCallbackRecords, InMemoryEntitlementStore,
    InMemoryOrderRepository, InMemoryPackageCatalog, RecordingAuditLog, RecordingNotifier,
};
use vip_orders::application::{
    EntitlementApplier, GatewayRegistry, OrderPolicy, PaymentSettlement, ReconciliationPolicy,
    ReconciliationService,
};
use vip_orders::config::ServerConfig;
use vip_orders::domain::entitlement::{Package, PackageDuration};
use vip_orders::domain::foundation::{OrderNo, PackageId};
use vip_orders::domain::order::{Order, Provider};
use vip_orders::domain::security::SecurityGate;

pub const USER: &str = "user-1";

pub struct TestApp {
    pub orders: Arc<InMemoryOrderRepository>,
    pub callbacks: Arc<InMemoryCallbackRecords>,
    pub entitlements: Arc<InMemoryEntitlementStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<RecordingAuditLog>,
    pub wallet_a: MockGateway,
    pub wallet_b: MockGateway,
    pub reconciliation: Arc<ReconciliationService>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let callbacks = Arc::new(InMemoryCallbackRecords::new());
        let entitlements = Arc::new(InMemoryEntitlementStore::new());
        let catalog = Arc::new(InMemoryPackageCatalog::with_packages([Package {
            id: PackageId::new("monthly").unwrap(),
            code: "monthly".to_string(),
            name: "VIP Monthly".to_string(),
            price_cents: 7900,
            duration: PackageDuration::Days(30),
            active: true,
        }]));
        let accounts = Arc::new(InMemoryAccountDirectory::permissive());
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = Arc::new(RecordingAuditLog::new());
        let wallet_a = MockGateway::new(Provider::WalletA);
        let wallet_b = MockGateway::new(Provider::WalletB);

        let registry = GatewayRegistry::new()
            .register(Arc::new(wallet_a.clone()))
            .register(Arc::new(wallet_b.clone()));
        let settlement = Arc::new(PaymentSettlement::new(
            orders.clone(),
            registry,
            EntitlementApplier::new(entitlements.clone(), catalog.clone()),
            notifier.clone(),
            audit.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            settlement.clone(),
            ReconciliationPolicy::default(),
        ));

        let state = OrdersAppState::new(
            settlement,
            reconciliation.clone(),
            catalog,
            accounts.clone(),
            accounts,
            callbacks.clone(),
            SecurityGate::default(),
            OrderPolicy::default(),
        );

        Self {
            orders,
            callbacks,
            entitlements,
            notifier,
            audit,
            wallet_a,
            wallet_b,
            reconciliation,
            router: api_router(state, &ServerConfig::default()),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Opens a monthly walletA order for [`USER`] and returns its number.
    pub async fn open_order(&self) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/api/orders",
                Some(USER),
                serde_json::json!({ "package_id": "monthly", "channel": "wallet_a_qr" }),
            ))
            .await;
        assert_eq!(response.status(), 201);
        body_json(response).await["order_no"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Posts a walletA notification and returns the status and ack body.
    pub async fn notify_wallet_a(&self, body: Vec<u8>) -> (u16, String) {
        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/wallet-a/notify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
        let status = response.status().as_u16();
        (status, body_text(response).await)
    }

    pub fn stored(&self, order_no: &str) -> Order {
        self.orders.get(&OrderNo::new(order_no).unwrap()).unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("X-User-Id", user)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
