//! HTTP DTOs (Data Transfer Objects) for order endpoints.
//!
//! These types define the JSON request/response structure for the order API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{
    CancelOrderResult, ConfirmStepUpResult, CreateOrderResult, InitiatePaymentResult,
    PaymentLockResult, ProcessRefundResult, RequestRefundResult,
};
use crate::domain::entitlement::VipStatus;
use crate::domain::order::{DeviceType, Order, OrderState, PaymentChannel, Provider, RefundState};
use crate::domain::payment::IntentHandle;
use crate::domain::reconciliation::{ReconciliationStats, SyncResult, DEFAULT_STATS_DAYS};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to open a VIP purchase order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub package_id: String,
    pub channel: PaymentChannel,
    /// Defaults to the channel's natural device class.
    #[serde(default)]
    pub device_type: Option<DeviceType>,
}

/// Request to open a payment intent for an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Where a redirect-style provider sends the user afterwards.
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundOrderRequest {
    pub reason: String,
}

/// Query parameters for listing orders.
#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersParams {
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLockRequest {
    pub reason: String,
}

/// Query parameters for reconciliation statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsParams {
    #[serde(default = "default_stats_days")]
    pub days: u32,
}

fn default_stats_days() -> u32 {
    DEFAULT_STATS_DAYS
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response after an order is opened.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCreatedResponse {
    pub order_no: String,
    pub amount: i64,
    pub package_name: String,
    pub channel: PaymentChannel,
    /// Payment window end (ISO 8601).
    pub expires_at: String,
    /// Whether an operator must verify the order before payment.
    pub step_up_required: bool,
}

impl From<CreateOrderResult> for OrderCreatedResponse {
    fn from(result: CreateOrderResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            amount: result.amount,
            package_name: result.package_name,
            channel: result.channel,
            expires_at: result.expires_at.to_string(),
            step_up_required: result.step_up_required,
        }
    }
}

/// Full order view.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_no: String,
    pub package_id: String,
    pub amount: i64,
    pub channel: PaymentChannel,
    pub provider: Provider,
    pub state: OrderState,
    pub refund_state: RefundState,
    pub transaction_id: Option<String>,
    pub step_up_required: bool,
    pub step_up_verified: bool,
    pub created_at: String,
    pub expires_at: String,
    pub paid_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancel_reason: Option<String>,
    pub refund_requested_at: Option<String>,
    pub refunded_at: Option<String>,
    /// Membership status after payment; absent for unpaid orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_status: Option<VipStatus>,
}

impl OrderResponse {
    pub fn from_order(order: Order, vip_status: Option<VipStatus>) -> Self {
        Self {
            provider: order.provider(),
            order_no: order.order_no.to_string(),
            package_id: order.package_id.to_string(),
            amount: order.amount,
            channel: order.channel,
            state: order.state,
            refund_state: order.refund_state,
            transaction_id: order.transaction_id.map(|t| t.to_string()),
            step_up_required: order.step_up_required,
            step_up_verified: order.step_up_verified,
            created_at: order.created_at.to_string(),
            expires_at: order.expires_at.to_string(),
            paid_at: order.paid_at.map(|t| t.to_string()),
            cancelled_at: order.cancelled_at.map(|t| t.to_string()),
            cancel_reason: order.cancel_reason,
            refund_requested_at: order.refund_requested_at.map(|t| t.to_string()),
            refunded_at: order.refunded_at.map(|t| t.to_string()),
            vip_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub count: usize,
}

impl From<Vec<Order>> for OrderListResponse {
    fn from(orders: Vec<Order>) -> Self {
        let orders: Vec<OrderResponse> = orders
            .into_iter()
            .map(|o| OrderResponse::from_order(o, None))
            .collect();
        Self {
            count: orders.len(),
            orders,
        }
    }
}

/// Provider handle the client needs to complete payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentResponse {
    pub order_no: String,
    pub provider: Provider,
    pub channel: PaymentChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub expires_at: String,
}

impl From<InitiatePaymentResult> for PaymentIntentResponse {
    fn from(result: InitiatePaymentResult) -> Self {
        let intent = result.intent;
        let (qr_code, redirect_url) = match intent.handle {
            IntentHandle::QrCode(code) => (Some(code), None),
            IntentHandle::RedirectUrl(url) => (None, Some(url)),
        };
        Self {
            order_no: result.order_no.to_string(),
            provider: intent.provider,
            channel: intent.channel,
            qr_code,
            redirect_url,
            expires_at: intent.expires_at.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResponse {
    pub order_no: String,
    pub state: OrderState,
    pub already_cancelled: bool,
}

impl From<CancelOrderResult> for CancelOrderResponse {
    fn from(result: CancelOrderResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            state: result.state,
            already_cancelled: result.already_cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequestedResponse {
    pub order_no: String,
    pub state: OrderState,
}

impl From<RequestRefundResult> for RefundRequestedResponse {
    fn from(result: RequestRefundResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            state: result.state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundProcessedResponse {
    pub order_no: String,
    pub state: OrderState,
    pub provider_refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl From<ProcessRefundResult> for RefundProcessedResponse {
    fn from(result: ProcessRefundResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            state: result.state,
            provider_refund_id: result.provider_refund_id,
            rejection: result.rejection,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepUpResponse {
    pub order_no: String,
    pub step_up_verified: bool,
}

impl From<ConfirmStepUpResult> for StepUpResponse {
    fn from(result: ConfirmStepUpResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            step_up_verified: result.step_up_verified,
        }
    }
}

/// Outcome of a manual reconcile.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResultResponse {
    pub order_no: String,
    pub previous_state: OrderState,
    pub current_state: OrderState,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SyncResult> for SyncResultResponse {
    fn from(result: SyncResult) -> Self {
        Self {
            order_no: result.order_no.to_string(),
            previous_state: result.previous_state,
            current_state: result.current_state,
            synced: result.synced,
            error: result.error,
        }
    }
}

/// Reconciliation totals over the requested window.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationStatsResponse {
    pub days: u32,
    pub runs: u32,
    pub checked: u64,
    pub synced: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub errored: u64,
    pub skipped: u64,
    pub runs_with_errors: u32,
}

impl From<ReconciliationStats> for ReconciliationStatsResponse {
    fn from(stats: ReconciliationStats) -> Self {
        Self {
            days: stats.days,
            runs: stats.runs,
            checked: stats.checked,
            synced: stats.synced,
            cancelled: stats.cancelled,
            timed_out: stats.timed_out,
            errored: stats.errored,
            skipped: stats.skipped,
            runs_with_errors: stats.runs_with_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLockResponse {
    pub user_id: String,
    pub payment_locked: bool,
    pub was_locked: bool,
}

impl From<PaymentLockResult> for PaymentLockResponse {
    fn from(result: PaymentLockResult) -> Self {
        Self {
            user_id: result.user_id.to_string(),
            payment_locked: result.locked,
            was_locked: result.was_locked,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
