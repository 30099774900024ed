//! HTTP handlers for order endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::application::handlers::{
    CallbackError, CancelOrderCommand, CancelOrderHandler, ConfirmStepUpCommand,
    ConfirmStepUpHandler, CreateOrderCommand, CreateOrderHandler, GetOrderHandler, GetOrderQuery,
    GetReconciliationStatsHandler, GetReconciliationStatsQuery, HandlePaymentCallbackCommand,
    HandlePaymentCallbackHandler, InitiatePaymentCommand, InitiatePaymentHandler,
    ListUserOrdersHandler, ListUserOrdersQuery, LockPaymentCommand, LockPaymentHandler,
    ProcessRefundCommand, ProcessRefundHandler, ReconcileOrderCommand, ReconcileOrderHandler,
    RequestRefundCommand, RequestRefundHandler, UnlockPaymentCommand, UnlockPaymentHandler,
};
use crate::application::{OrderPolicy, PaymentSettlement, ReconciliationService};
use crate::domain::foundation::{DomainError, OrderNo, PackageId, UserId, ValidationError};
use crate::domain::order::{DeviceContext, OrderError, Provider};
use crate::domain::payment::AckToken;
use crate::domain::security::SecurityGate;
use crate::ports::{
    AccountStandingReader, CallbackRecordRepository, PackageCatalog, PaymentLockWriter,
};

use super::dto::{
    CancelOrderRequest, CancelOrderResponse, CreateOrderRequest, ErrorResponse,
    InitiatePaymentRequest, ListOrdersParams, OrderCreatedResponse, OrderListResponse,
    OrderResponse, PaymentIntentResponse, PaymentLockRequest, PaymentLockResponse,
    ReconciliationStatsResponse, RefundOrderRequest, RefundProcessedResponse,
    RefundRequestedResponse, StatsParams, StepUpResponse, SyncResultResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for order handlers.
#[derive(Clone)]
pub struct OrdersAppState {
    pub settlement: Arc<PaymentSettlement>,
    pub reconciliation: Arc<ReconciliationService>,
    pub catalog: Arc<dyn PackageCatalog>,
    pub accounts: Arc<dyn AccountStandingReader>,
    pub payment_locks: Arc<dyn PaymentLockWriter>,
    pub callbacks: Arc<dyn CallbackRecordRepository>,
    pub gate: SecurityGate,
    pub policy: OrderPolicy,
}

impl OrdersAppState {
    pub fn new(
        settlement: Arc<PaymentSettlement>,
        reconciliation: Arc<ReconciliationService>,
        catalog: Arc<dyn PackageCatalog>,
        accounts: Arc<dyn AccountStandingReader>,
        payment_locks: Arc<dyn PaymentLockWriter>,
        callbacks: Arc<dyn CallbackRecordRepository>,
        gate: SecurityGate,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            settlement,
            reconciliation,
            catalog,
            accounts,
            payment_locks,
            callbacks,
            gate,
            policy,
        }
    }

    pub fn create_order_handler(&self) -> CreateOrderHandler {
        CreateOrderHandler::new(
            self.settlement.clone(),
            self.catalog.clone(),
            self.accounts.clone(),
            self.gate,
            self.policy,
        )
    }

    pub fn get_order_handler(&self) -> GetOrderHandler {
        GetOrderHandler::new(self.settlement.clone(), self.policy)
    }

    pub fn list_orders_handler(&self) -> ListUserOrdersHandler {
        ListUserOrdersHandler::new(self.settlement.clone())
    }

    pub fn initiate_payment_handler(&self) -> InitiatePaymentHandler {
        InitiatePaymentHandler::new(
            self.settlement.clone(),
            self.catalog.clone(),
            self.accounts.clone(),
            self.gate,
        )
    }

    pub fn cancel_order_handler(&self) -> CancelOrderHandler {
        CancelOrderHandler::new(self.settlement.clone())
    }

    pub fn request_refund_handler(&self) -> RequestRefundHandler {
        RequestRefundHandler::new(self.settlement.clone(), self.catalog.clone(), self.policy)
    }

    pub fn process_refund_handler(&self) -> ProcessRefundHandler {
        ProcessRefundHandler::new(self.settlement.clone())
    }

    pub fn confirm_step_up_handler(&self) -> ConfirmStepUpHandler {
        ConfirmStepUpHandler::new(self.settlement.clone())
    }

    pub fn reconcile_order_handler(&self) -> ReconcileOrderHandler {
        ReconcileOrderHandler::new(self.reconciliation.clone())
    }

    pub fn reconciliation_stats_handler(&self) -> GetReconciliationStatsHandler {
        GetReconciliationStatsHandler::new(self.reconciliation.clone())
    }

    pub fn lock_payment_handler(&self) -> LockPaymentHandler {
        LockPaymentHandler::new(self.settlement.clone(), self.payment_locks.clone())
    }

    pub fn unlock_payment_handler(&self) -> UnlockPaymentHandler {
        UnlockPaymentHandler::new(self.settlement.clone(), self.payment_locks.clone())
    }

    pub fn callback_handler(&self) -> HandlePaymentCallbackHandler {
        HandlePaymentCallbackHandler::new(self.settlement.clone(), self.callbacks.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

fn user_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::new(s).ok())
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Identity is asserted by the gateway in front of this service
            let user_id = user_from_headers(&parts.headers).ok_or(AuthenticationRequired)?;
            Ok(AuthenticatedUser { user_id })
        })
    }
}

/// Operator identity for admin endpoints.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: UserId,
}

/// Rejection type for AdminUser extraction.
pub enum AdminRejection {
    Unauthenticated,
    NotAdmin,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            AdminRejection::Unauthenticated => AuthenticationRequired.into_response(),
            AdminRejection::NotAdmin => {
                let error = ErrorResponse::new("ADMIN_REQUIRED", "Admin role is required");
                (StatusCode::FORBIDDEN, Json(error)).into_response()
            }
        }
    }
}

impl<S> axum::extract::FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id =
                user_from_headers(&parts.headers).ok_or(AdminRejection::Unauthenticated)?;
            let is_admin = parts
                .headers
                .get("X-User-Role")
                .and_then(|v| v.to_str().ok())
                .map_or(false, |role| role.eq_ignore_ascii_case("admin"));
            if !is_admin {
                return Err(AdminRejection::NotAdmin);
            }
            Ok(AdminUser { user_id })
        })
    }
}

/// First hop of `X-Forwarded-For`, falling back to `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("X-Real-IP").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

fn parse_order_no(raw: String) -> Result<OrderNo, OrderApiError> {
    OrderNo::new(raw).map_err(|e| OrderApiError(OrderError::from(e)))
}

fn parse_user_id(raw: String) -> Result<UserId, OrderApiError> {
    UserId::new(raw).map_err(|e| OrderApiError(OrderError::from(e)))
}

// ════════════════════════════════════════════════════════════════════════════════
// User Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/orders - Open a purchase order
pub async fn create_order(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, OrderApiError> {
    let package_id = PackageId::new(req.package_id)?;
    let device = DeviceContext {
        ip: client_ip(&headers),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        device_type: req.device_type.unwrap_or_else(|| req.channel.device_type()),
    };

    let handler = state.create_order_handler();
    let cmd = CreateOrderCommand {
        user_id: user.user_id,
        package_id,
        channel: req.channel,
        device,
    };

    let result = handler.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(OrderCreatedResponse::from(result))))
}

/// GET /api/orders - List the caller's orders, newest first
pub async fn list_orders(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    Query(params): Query<ListOrdersParams>,
) -> Result<impl IntoResponse, OrderApiError> {
    let handler = state.list_orders_handler();
    let orders = handler
        .handle(ListUserOrdersQuery {
            user_id: user.user_id,
            limit: params.limit,
        })
        .await?;
    Ok(Json(OrderListResponse::from(orders)))
}

/// GET /api/orders/:order_no - Order details with VIP status
pub async fn get_order(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    Path(order_no): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let handler = state.get_order_handler();
    let result = handler
        .handle(GetOrderQuery {
            order_no: parse_order_no(order_no)?,
            user_id: Some(user.user_id),
        })
        .await?;
    Ok(Json(OrderResponse::from_order(result.order, result.vip_status)))
}

/// POST /api/orders/:order_no/pay - Open a payment intent
pub async fn initiate_payment(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    Path(order_no): Path<String>,
    headers: HeaderMap,
    body: Option<Json<InitiatePaymentRequest>>,
) -> Result<impl IntoResponse, OrderApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let handler = state.initiate_payment_handler();
    let cmd = InitiatePaymentCommand {
        order_no: parse_order_no(order_no)?,
        user_id: user.user_id,
        client_ip: client_ip(&headers),
        return_url: req.return_url,
    };

    let result = handler.handle(cmd).await?;
    Ok(Json(PaymentIntentResponse::from(result)))
}

/// POST /api/orders/:order_no/cancel - Cancel an unpaid order
pub async fn cancel_order(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    Path(order_no): Path<String>,
    body: Option<Json<CancelOrderRequest>>,
) -> Result<impl IntoResponse, OrderApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let handler = state.cancel_order_handler();
    let cmd = CancelOrderCommand {
        order_no: parse_order_no(order_no)?,
        user_id: user.user_id,
        reason: req.reason,
    };

    let result = handler.handle(cmd).await?;
    Ok(Json(CancelOrderResponse::from(result)))
}

/// POST /api/orders/:order_no/refund - Ask for a refund
pub async fn request_refund(
    State(state): State<OrdersAppState>,
    user: AuthenticatedUser,
    Path(order_no): Path<String>,
    Json(req): Json<RefundOrderRequest>,
) -> Result<impl IntoResponse, OrderApiError> {
    let handler = state.request_refund_handler();
    let cmd = RequestRefundCommand {
        order_no: parse_order_no(order_no)?,
        user_id: user.user_id,
        reason: req.reason,
    };

    let result = handler.handle(cmd).await?;
    Ok((StatusCode::ACCEPTED, Json(RefundRequestedResponse::from(result))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/admin/orders/:order_no/reconcile - Query the provider now
pub async fn reconcile_order(
    State(state): State<OrdersAppState>,
    admin: AdminUser,
    Path(order_no): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_no = parse_order_no(order_no)?;
    tracing::info!(admin = %admin.user_id, order_no = %order_no, "Manual reconcile requested");

    let handler = state.reconcile_order_handler();
    let result = handler.handle(ReconcileOrderCommand { order_no }).await?;
    Ok(Json(SyncResultResponse::from(result)))
}

/// POST /api/admin/orders/:order_no/step-up - Record step-up verification
pub async fn confirm_step_up(
    State(state): State<OrdersAppState>,
    admin: AdminUser,
    Path(order_no): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_no = parse_order_no(order_no)?;
    tracing::info!(admin = %admin.user_id, order_no = %order_no, "Step-up confirmed by operator");

    let handler = state.confirm_step_up_handler();
    let result = handler.handle(ConfirmStepUpCommand { order_no }).await?;
    Ok(Json(StepUpResponse::from(result)))
}

/// POST /api/admin/orders/:order_no/refund/process - Execute a requested refund
pub async fn process_refund(
    State(state): State<OrdersAppState>,
    admin: AdminUser,
    Path(order_no): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_no = parse_order_no(order_no)?;
    tracing::info!(admin = %admin.user_id, order_no = %order_no, "Refund processing requested");

    let handler = state.process_refund_handler();
    let result = handler.handle(ProcessRefundCommand { order_no }).await?;
    Ok(Json(RefundProcessedResponse::from(result)))
}

/// GET /api/admin/reconciliation/stats?days=7 - Totals over recent runs
pub async fn reconciliation_stats(
    State(state): State<OrdersAppState>,
    _admin: AdminUser,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, OrderApiError> {
    let handler = state.reconciliation_stats_handler();
    let stats = handler
        .handle(GetReconciliationStatsQuery { days: params.days })
        .await?;
    Ok(Json(ReconciliationStatsResponse::from(stats)))
}

/// POST /api/admin/users/:user_id/payment-lock - Stop a user from paying
pub async fn lock_payment(
    State(state): State<OrdersAppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
    Json(req): Json<PaymentLockRequest>,
) -> Result<impl IntoResponse, OrderApiError> {
    let user_id = parse_user_id(user_id)?;

    let handler = state.lock_payment_handler();
    let result = handler
        .handle(LockPaymentCommand {
            user_id,
            admin_id: admin.user_id,
            reason: req.reason,
        })
        .await?;
    Ok(Json(PaymentLockResponse::from(result)))
}

/// POST /api/admin/users/:user_id/payment-unlock - Lift a payment lock
pub async fn unlock_payment(
    State(state): State<OrdersAppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let user_id = parse_user_id(user_id)?;

    let handler = state.unlock_payment_handler();
    let result = handler
        .handle(UnlockPaymentCommand {
            user_id,
            admin_id: admin.user_id,
        })
        .await?;
    Ok(Json(PaymentLockResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Provider Callbacks (no auth, signature verified)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/wallet-a/notify
pub async fn wallet_a_notify(
    State(state): State<OrdersAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_notify(state, Provider::WalletA, headers, body).await
}

/// POST /api/payments/wallet-b/notify
pub async fn wallet_b_notify(
    State(state): State<OrdersAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_notify(state, Provider::WalletB, headers, body).await
}

async fn handle_notify(
    state: OrdersAppState,
    provider: Provider,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let handler = state.callback_handler();
    let cmd = HandlePaymentCallbackCommand {
        provider,
        headers,
        body: body.to_vec(),
    };

    match handler.handle(cmd).await {
        Ok(result) => ack_response(result.ack),
        Err(CallbackError::Unavailable(err)) => {
            tracing::error!(provider = %provider, error = %err, "Callback for unconfigured provider");
            let body = ErrorResponse::new(err.code().to_string(), err.to_string());
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
        Err(err) => {
            tracing::error!(provider = %provider, error = %err, "Callback handling failed");
            let body = ErrorResponse::new("INTERNAL_ERROR", "Callback could not be processed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Renders the provider's ack token verbatim.
fn ack_response(ack: AckToken) -> Response {
    let status = StatusCode::from_u16(ack.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(ack.content_type))],
        ack.body,
    )
        .into_response()
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts order errors to HTTP responses.
#[derive(Debug)]
pub struct OrderApiError(OrderError);

impl From<OrderError> for OrderApiError {
    fn from(err: OrderError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for OrderApiError {
    fn from(err: DomainError) -> Self {
        Self(OrderError::from(err))
    }
}

impl From<ValidationError> for OrderApiError {
    fn from(err: ValidationError) -> Self {
        Self(OrderError::from(err))
    }
}

impl IntoResponse for OrderApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrderError::NotFound(_)
            | OrderError::PackageNotFound(_)
            | OrderError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::PackageUnavailable(_)
            | OrderError::LifetimeAlreadyOwned
            | OrderError::AlreadyPaid(_)
            | OrderError::InvalidState { .. }
            | OrderError::ConflictingEvidence { .. } => StatusCode::CONFLICT,
            OrderError::SecurityRejected(_) | OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderError::Expired(_) => StatusCode::GONE,
            OrderError::NotRefundable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            OrderError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            OrderError::Gateway(err) => err.status_code(),
            OrderError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Order request failed");
        }

        let mut body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        match &self.0 {
            OrderError::SecurityRejected(reason) => {
                body = body.with_details(json!({
                    "reason": reason,
                    "remediation": reason.remediation(),
                }));
            }
            OrderError::ValidationFailed { field, .. } => {
                body = body.with_details(json!({ "field": field }));
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}
