//! WalletA payment gateway adapter.
//!
//! JSON API. Requests and notifications are signed with HMAC-SHA256 over
//! `"{timestamp}\n{nonce}\n{body}\n"`, carried in the `Wallet-Timestamp`,
//! `Wallet-Nonce` and `Wallet-Signature` headers.
//!
//! # Status Mapping
//!
//! | trade_state | NormalizedStatus |
//! |-------------|------------------|
//! | SUCCESS | Paid |
//! | REFUND | Refunded |
//! | NOTPAY, USERPAYING | Pending |
//! | CLOSED, REVOKED | Closed |
//! | PAYERROR | Error |

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderNo, Timestamp, TransactionId};
use crate::domain::order::{PaymentChannel, Provider};
use crate::domain::payment::signature::{check_replay_window, header_message};
use crate::domain::payment::{
    AckToken, CloseOutcome, CreatePaymentRequest, GatewayError, HmacSigner, IntentHandle,
    NormalizedCallback, NormalizedStatus, PaidDetails, PaymentIntent, QueryOutcome, RefundOutcome,
    RefundRequest,
};
use crate::ports::PaymentGateway;

pub const TIMESTAMP_HEADER: &str = "Wallet-Timestamp";
pub const NONCE_HEADER: &str = "Wallet-Nonce";
pub const SIGNATURE_HEADER: &str = "Wallet-Signature";

/// Provider error codes meaning the order is already closed or unknown.
const CLOSED_ERROR_CODES: [&str; 2] = ["ORDER_CLOSED", "ORDER_NOT_EXIST"];

/// WalletA API configuration.
#[derive(Clone)]
pub struct WalletAConfig {
    pub app_id: String,
    pub merchant_id: String,

    /// Shared signing key for requests and notifications.
    pub api_key: SecretString,

    pub notify_url: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl WalletAConfig {
    pub fn new(
        app_id: impl Into<String>,
        merchant_id: impl Into<String>,
        api_key: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            merchant_id: merchant_id.into(),
            api_key: SecretString::new(api_key.into()),
            notify_url: notify_url.into(),
            api_base_url: "https://api.wallet-a.example".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire Types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    appid: &'a str,
    mchid: &'a str,
    description: &'a str,
    out_trade_no: &'a str,
    time_expire: String,
    notify_url: &'a str,
    amount: AmountBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene_info: Option<SceneInfo<'a>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AmountBody {
    total: i64,
    #[serde(default = "default_currency")]
    currency: String,
}

fn default_currency() -> String {
    "CNY".to_string()
}

#[derive(Debug, Serialize)]
struct SceneInfo<'a> {
    payer_client_ip: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateReply {
    code_url: Option<String>,
    h5_url: Option<String>,
}

/// Order as returned by the query endpoint and inside notifications.
#[derive(Debug, Deserialize)]
struct TradeBody {
    out_trade_no: String,
    transaction_id: Option<String>,
    trade_state: String,
    amount: Option<TradeAmount>,
    success_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct TradeAmount {
    total: Option<i64>,
    payer_total: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    out_trade_no: &'a str,
    out_refund_no: &'a str,
    reason: &'a str,
    notify_url: &'a str,
    amount: RefundAmount,
}

#[derive(Debug, Serialize)]
struct RefundAmount {
    refund: i64,
    total: i64,
    currency: &'static str,
}

#[derive(Debug, Deserialize)]
struct RefundReply {
    refund_id: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    code: String,
    message: String,
}

fn map_trade_state(state: &str) -> NormalizedStatus {
    match state {
        "SUCCESS" => NormalizedStatus::Paid,
        "REFUND" => NormalizedStatus::Refunded,
        "NOTPAY" | "USERPAYING" => NormalizedStatus::Pending,
        "CLOSED" | "REVOKED" => NormalizedStatus::Closed,
        _ => NormalizedStatus::Error,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Adapter
// ════════════════════════════════════════════════════════════════════════════

pub struct WalletAGateway {
    config: WalletAConfig,
    signer: HmacSigner,
    http_client: reqwest::Client,
}

impl WalletAGateway {
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` if the HTTP client cannot be built.
    pub fn new(config: WalletAConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            signer: HmacSigner::new(config.api_key.clone()),
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn signed(&self, builder: reqwest::RequestBuilder, body: &[u8]) -> reqwest::RequestBuilder {
        let timestamp = Timestamp::now().as_unix_secs();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let signature = self.signer.sign(&header_message(timestamp, &nonce, body));
        builder
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(NONCE_HEADER, nonce)
            .header(SIGNATURE_HEADER, signature)
            .header("Wallet-Mchid", &self.config.merchant_id)
    }

    /// Sends a signed request and returns status plus body text.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(reqwest::StatusCode, String), GatewayError> {
        let payload = body.unwrap_or_default();
        let mut builder = self.http_client.request(method, self.url(path));
        if !payload.is_empty() {
            builder = builder
                .header("Content-Type", "application/json")
                .body(payload.clone());
        }
        let response = self.signed(builder, &payload).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn error_from_reply(status: reqwest::StatusCode, text: &str) -> GatewayError {
        if status.is_server_error() {
            return GatewayError::TransientNetwork(format!("walletA returned {}", status));
        }
        match serde_json::from_str::<ErrorReply>(text) {
            Ok(reply) => GatewayError::rejected(reply.code, reply.message),
            Err(_) => GatewayError::rejected(status.as_str(), text.to_string()),
        }
    }

    fn decode_trade(trade: TradeBody) -> Result<(NormalizedStatus, Option<PaidDetails>), GatewayError> {
        let status = map_trade_state(&trade.trade_state);
        let details = match trade.transaction_id {
            Some(tx) if !tx.is_empty() => Some(PaidDetails {
                transaction_id: TransactionId::new(tx)
                    .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?,
                amount: trade.amount.and_then(|a| a.total.or(a.payer_total)),
                paid_at: trade.success_time.map(Timestamp::from_datetime),
            }),
            _ => None,
        };
        Ok((status, details))
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, GatewayError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::SignatureInvalid(format!("missing {} header", name)))
    }
}

#[async_trait]
impl PaymentGateway for WalletAGateway {
    fn provider(&self) -> Provider {
        Provider::WalletA
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let path = match request.channel {
            PaymentChannel::WalletAQr => "/v3/pay/transactions/native",
            PaymentChannel::WalletAMobile => "/v3/pay/transactions/h5",
            other => {
                return Err(GatewayError::rejected(
                    "CHANNEL_NOT_SUPPORTED",
                    format!("walletA cannot serve channel {}", other),
                ))
            }
        };

        let body = CreateBody {
            appid: &self.config.app_id,
            mchid: &self.config.merchant_id,
            description: &request.description,
            out_trade_no: request.order_no.as_str(),
            time_expire: request.expires_at.as_datetime().to_rfc3339(),
            notify_url: &self.config.notify_url,
            amount: AmountBody {
                total: request.amount,
                currency: default_currency(),
            },
            scene_info: request
                .client_ip
                .as_deref()
                .map(|ip| SceneInfo { payer_client_ip: ip }),
        };
        let payload = serde_json::to_vec(&body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let (status, text) = self.send(reqwest::Method::POST, path, Some(payload)).await?;
        if !status.is_success() {
            let err = Self::error_from_reply(status, &text);
            tracing::error!(order_no = %request.order_no, error = %err, "walletA create_payment failed");
            return Err(err);
        }

        let reply: CreateReply = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let handle = match (request.channel, reply.code_url, reply.h5_url) {
            (PaymentChannel::WalletAQr, Some(code), _) => IntentHandle::QrCode(code),
            (PaymentChannel::WalletAMobile, _, Some(url)) => IntentHandle::RedirectUrl(url),
            _ => {
                return Err(GatewayError::MalformedPayload(
                    "walletA reply has no payment handle".to_string(),
                ))
            }
        };

        Ok(PaymentIntent {
            provider: Provider::WalletA,
            channel: request.channel,
            handle,
            expires_at: request.expires_at,
        })
    }

    async fn query_status(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<QueryOutcome, GatewayError> {
        let path = format!(
            "/v3/pay/transactions/out-trade-no/{}?mchid={}",
            order_no, self.config.merchant_id
        );
        let (status, text) = match self.send(reqwest::Method::GET, &path, None).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(order_no = %order_no, error = %err, "walletA query failed");
                return Ok(QueryOutcome::unknown(err.to_string()));
            }
        };

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(QueryOutcome::NotPaid);
        }
        if !status.is_success() {
            return Ok(QueryOutcome::unknown(
                Self::error_from_reply(status, &text).to_string(),
            ));
        }

        let trade: TradeBody = match serde_json::from_str(&text) {
            Ok(trade) => trade,
            Err(e) => return Ok(QueryOutcome::unknown(format!("unparsable reply: {}", e))),
        };
        match Self::decode_trade(trade) {
            Ok((normalized, details)) => Ok(QueryOutcome::from_status(normalized, details)),
            Err(err) => Ok(QueryOutcome::unknown(err.to_string())),
        }
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError> {
        let body = RefundBody {
            out_trade_no: request.order_no.as_str(),
            out_refund_no: &request.refund_ref,
            reason: &request.reason,
            notify_url: &self.config.notify_url,
            amount: RefundAmount {
                refund: request.amount,
                total: request.amount,
                currency: "CNY",
            },
        };
        let payload = serde_json::to_vec(&body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let (status, text) = self
            .send(reqwest::Method::POST, "/v3/refund/domestic/refunds", Some(payload))
            .await?;
        if status.is_server_error() {
            return Err(Self::error_from_reply(status, &text));
        }
        if !status.is_success() {
            let reason = match Self::error_from_reply(status, &text) {
                GatewayError::ProviderRejected { code, message } => format!("{}: {}", code, message),
                other => other.to_string(),
            };
            return Ok(RefundOutcome::Rejected { reason });
        }

        let reply: RefundReply = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        match reply.status.as_str() {
            "SUCCESS" | "PROCESSING" => Ok(RefundOutcome::Accepted {
                provider_refund_id: reply.refund_id,
            }),
            other => Ok(RefundOutcome::Rejected {
                reason: format!("refund status {}", other),
            }),
        }
    }

    async fn close_order(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<CloseOutcome, GatewayError> {
        let path = format!("/v3/pay/transactions/out-trade-no/{}/close", order_no);
        let payload = serde_json::to_vec(&serde_json::json!({ "mchid": self.config.merchant_id }))
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let (status, text) = self.send(reqwest::Method::POST, &path, Some(payload)).await?;

        if status.is_success() {
            return Ok(CloseOutcome::Closed);
        }
        match Self::error_from_reply(status, &text) {
            GatewayError::ProviderRejected { code, .. }
                if CLOSED_ERROR_CODES.contains(&code.as_str()) =>
            {
                Ok(CloseOutcome::AlreadyClosed)
            }
            err => Err(err),
        }
    }

    fn verify_and_decode(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<NormalizedCallback, GatewayError> {
        let timestamp: i64 = Self::header(headers, TIMESTAMP_HEADER)?
            .parse()
            .map_err(|_| GatewayError::SignatureInvalid("timestamp is not a number".into()))?;
        let nonce = Self::header(headers, NONCE_HEADER)?;
        let signature = Self::header(headers, SIGNATURE_HEADER)?;

        check_replay_window(timestamp, Timestamp::now().as_unix_secs())?;
        if !self.signer.verify(&header_message(timestamp, nonce, body), signature) {
            return Err(GatewayError::SignatureInvalid("signature mismatch".into()));
        }

        // Signature verified; from here on failures are decode errors.
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::undecodable(None, e.to_string()))?;
        let order_no = raw
            .get("out_trade_no")
            .and_then(|v| v.as_str())
            .and_then(|v| OrderNo::new(v).ok());
        let trade: TradeBody = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::undecodable(order_no.clone(), e.to_string()))?;
        let order_no = order_no
            .ok_or_else(|| GatewayError::undecodable(None, "invalid out_trade_no"))?;

        let (status, details) = Self::decode_trade(trade)
            .map_err(|e| GatewayError::undecodable(Some(order_no.clone()), e.to_string()))?;
        if status == NormalizedStatus::Paid && details.is_none() {
            return Err(GatewayError::undecodable(
                Some(order_no),
                "paid notification has no transaction id",
            ));
        }

        Ok(NormalizedCallback {
            provider: Provider::WalletA,
            order_no,
            transaction_id: details.as_ref().map(|d| d.transaction_id.clone()),
            status,
            amount: details.as_ref().and_then(|d| d.amount),
            paid_at: details.and_then(|d| d.paid_at),
            raw,
        })
    }

    fn ack(&self, accepted: bool) -> AckToken {
        let (status, body) = if accepted {
            (200, serde_json::json!({ "code": "SUCCESS", "message": "OK" }))
        } else {
            (500, serde_json::json!({ "code": "FAIL", "message": "processing failed" }))
        };
        AckToken {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const SECRET: &str = "wallet-a-test-key";

    fn gateway() -> WalletAGateway {
        WalletAGateway::new(WalletAConfig::new(
            "app-1",
            "mch-1",
            SECRET,
            "https://vip.example/api/payments/wallet-a/notify",
        ))
        .unwrap()
    }

    fn notification(trade_state: &str) -> Vec<u8> {
        serde_json::json!({
            "out_trade_no": "VIP-0001",
            "transaction_id": "tx-1",
            "trade_state": trade_state,
            "amount": { "total": 7900, "payer_total": 7900, "currency": "CNY" },
            "success_time": "2026-01-01T10:00:00Z",
        })
        .to_string()
        .into_bytes()
    }

    fn signed_headers(body: &[u8], timestamp: i64, secret: &str) -> HeaderMap {
        let signer = HmacSigner::new(SecretString::new(secret.to_string()));
        let signature = signer.sign(&header_message(timestamp, "nonce-1", body));
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&timestamp.to_string()).unwrap());
        headers.insert(NONCE_HEADER, HeaderValue::from_static("nonce-1"));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        headers
    }

    // ══════════════════════════════════════════════════════════════
    // Status Mapping
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn maps_provider_vocabulary() {
        assert_eq!(map_trade_state("SUCCESS"), NormalizedStatus::Paid);
        assert_eq!(map_trade_state("REFUND"), NormalizedStatus::Refunded);
        assert_eq!(map_trade_state("NOTPAY"), NormalizedStatus::Pending);
        assert_eq!(map_trade_state("USERPAYING"), NormalizedStatus::Pending);
        assert_eq!(map_trade_state("CLOSED"), NormalizedStatus::Closed);
        assert_eq!(map_trade_state("REVOKED"), NormalizedStatus::Closed);
        assert_eq!(map_trade_state("PAYERROR"), NormalizedStatus::Error);
    }

    // ══════════════════════════════════════════════════════════════
    // Callback Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_notification_decodes() {
        let body = notification("SUCCESS");
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs(), SECRET);

        let callback = gateway().verify_and_decode(&headers, &body).unwrap();

        assert_eq!(callback.order_no.as_str(), "VIP-0001");
        assert_eq!(callback.transaction_id, Some(TransactionId::new("tx-1").unwrap()));
        assert_eq!(callback.status, NormalizedStatus::Paid);
        assert_eq!(callback.amount, Some(7900));
        assert!(callback.paid_at.is_some());
    }

    #[test]
    fn closed_notification_without_transaction_decodes() {
        let body = serde_json::json!({ "out_trade_no": "VIP-0001", "trade_state": "CLOSED" })
            .to_string()
            .into_bytes();
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs(), SECRET);

        let callback = gateway().verify_and_decode(&headers, &body).unwrap();

        assert_eq!(callback.status, NormalizedStatus::Closed);
        assert!(callback.transaction_id.is_none());
        assert!(callback.amount.is_none());
    }

    #[test]
    fn signed_paid_notification_without_transaction_is_undecodable() {
        let body = serde_json::json!({ "out_trade_no": "VIP-0001", "trade_state": "SUCCESS" })
            .to_string()
            .into_bytes();
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs(), SECRET);

        match gateway().verify_and_decode(&headers, &body) {
            Err(GatewayError::UndecodableNotification { order_no, .. }) => {
                assert_eq!(order_no, Some(OrderNo::new("VIP-0001").unwrap()));
            }
            other => panic!("expected undecodable notification, got {:?}", other),
        }
    }

    #[test]
    fn wrong_key_is_rejected() {
        let body = notification("SUCCESS");
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs(), "other-key");
        assert!(matches!(
            gateway().verify_and_decode(&headers, &body),
            Err(GatewayError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = notification("SUCCESS");
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs(), SECRET);
        let tampered = notification("REFUND");
        assert!(gateway().verify_and_decode(&headers, &tampered).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = notification("SUCCESS");
        let headers = signed_headers(&body, Timestamp::now().as_unix_secs() - 600, SECRET);
        assert!(matches!(
            gateway().verify_and_decode(&headers, &body),
            Err(GatewayError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn missing_headers_are_rejected() {
        let body = notification("SUCCESS");
        assert!(matches!(
            gateway().verify_and_decode(&HeaderMap::new(), &body),
            Err(GatewayError::SignatureInvalid(_))
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Ack
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn ack_tokens_match_provider_contract() {
        let ok = gateway().ack(true);
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body, r#"{"code":"SUCCESS","message":"OK"}"#);

        let fail = gateway().ack(false);
        assert_eq!(fail.status, 500);
        assert!(fail.body.contains("FAIL"));
    }

    // ══════════════════════════════════════════════════════════════
    // Unreachable Provider
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unreachable_provider_queries_as_unknown() {
        let gateway = WalletAGateway::new(
            WalletAConfig::new("app-1", "mch-1", SECRET, "https://vip.example/notify")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let outcome = gateway
            .query_status(&OrderNo::new("VIP-0001").unwrap(), PaymentChannel::WalletAQr)
            .await
            .unwrap();

        assert!(matches!(outcome, QueryOutcome::Unknown { .. }));
    }
}
