//! HTTP adapters - REST API implementations.
//!
//! The order module exposes the user, admin and provider callback endpoints.

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub mod orders;

// Re-export key types for convenience
pub use orders::orders_router;
pub use orders::OrdersAppState;

/// Builds the service router with request ids, tracing, CORS and a request timeout.
pub fn api_router(state: OrdersAppState, server: &ServerConfig) -> Router {
    orders_router()
        .with_state(state)
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Browser access for the listed origins only. Provider callbacks are
/// server-to-server and unaffected.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::application::test_support::Harness;
    use crate::application::{OrderPolicy, ReconciliationPolicy, ReconciliationService};
    use crate::domain::security::SecurityGate;

    fn state(h: &Harness) -> OrdersAppState {
        let settlement = h.settlement();
        OrdersAppState::new(
            settlement.clone(),
            Arc::new(ReconciliationService::new(
                settlement,
                ReconciliationPolicy::default(),
            )),
            h.catalog.clone(),
            h.accounts.clone(),
            h.accounts.clone(),
            h.callbacks.clone(),
            SecurityGate::default(),
            OrderPolicy::default(),
        )
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let app = api_router(state(&Harness::new()), &ServerConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/orders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn configured_origin_gets_cors_headers() {
        let server = ServerConfig {
            cors_origins: Some("https://app.example".to_string()),
            ..Default::default()
        };
        let app = api_router(state(&Harness::new()), &server);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/orders")
                    .header("origin", "https://app.example")
                    .header("x-user-id", "user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example"
        );
    }
}
