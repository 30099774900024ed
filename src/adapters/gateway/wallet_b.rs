//! WalletB payment gateway adapter.
//!
//! Flat string-parameter API behind a single gateway URL; the operation is
//! selected by the `method` parameter and business fields travel as a JSON
//! string in `biz_content`. Amounts are decimal major-unit strings
//! (`"79.00"`). Every request and notification carries a `sign` parameter:
//! HMAC-SHA256 over the key-sorted, `&`-joined `k=v` pairs.
//!
//! Notifications arrive as a JSON object of string values.
//!
//! # Status Mapping
//!
//! | trade_status | NormalizedStatus |
//! |--------------|------------------|
//! | WAIT_BUYER_PAY | Pending |
//! | TRADE_CLOSED | Closed |
//! | TRADE_SUCCESS, TRADE_FINISHED | Paid |

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::foundation::{OrderNo, Timestamp, TransactionId};
use crate::domain::order::{PaymentChannel, Provider};
use crate::domain::payment::signature::canonical_params;
use crate::domain::payment::{
    AckToken, CloseOutcome, CreatePaymentRequest, GatewayError, HmacSigner, IntentHandle,
    NormalizedCallback, NormalizedStatus, PaidDetails, PaymentIntent, QueryOutcome, RefundOutcome,
    RefundRequest,
};
use crate::ports::PaymentGateway;

const SUCCESS_CODE: &str = "10000";
const TRADE_NOT_EXIST: &str = "ACQ.TRADE_NOT_EXIST";
const TRADE_STATUS_ERROR: &str = "ACQ.TRADE_STATUS_ERROR";

/// WalletB API configuration.
#[derive(Clone)]
pub struct WalletBConfig {
    pub app_id: String,

    /// Shared signing key for requests and notifications.
    pub sign_key: SecretString,

    pub notify_url: String,
    pub gateway_url: String,
    pub request_timeout: Duration,
}

impl WalletBConfig {
    pub fn new(
        app_id: impl Into<String>,
        sign_key: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            sign_key: SecretString::new(sign_key.into()),
            notify_url: notify_url.into(),
            gateway_url: "https://openapi.wallet-b.example/gateway.do".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom gateway URL (for testing).
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Amount Encoding
// ════════════════════════════════════════════════════════════════════════════

/// Formats minor units as a major-unit decimal string: `7900` -> `"79.00"`.
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parses a major-unit decimal string into minor units.
///
/// # Errors
///
/// Returns `MalformedPayload` for anything but digits with one or two
/// decimals after an optional point.
pub fn parse_amount(value: &str) -> Result<i64, GatewayError> {
    let malformed = || GatewayError::MalformedPayload(format!("invalid amount '{}'", value));
    let (whole, fraction) = match value.split_once('.') {
        Some((_, "")) => return Err(malformed()),
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty()
        || fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }
    let whole: i64 = whole.parse().map_err(|_| malformed())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| malformed())? * 10,
        _ => fraction.parse().map_err(|_| malformed())?,
    };
    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(malformed)
}

fn map_trade_status(status: &str) -> NormalizedStatus {
    match status {
        "WAIT_BUYER_PAY" => NormalizedStatus::Pending,
        "TRADE_CLOSED" => NormalizedStatus::Closed,
        "TRADE_SUCCESS" | "TRADE_FINISHED" => NormalizedStatus::Paid,
        _ => NormalizedStatus::Error,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire Types
// ════════════════════════════════════════════════════════════════════════════

/// Common reply envelope of the gateway.
#[derive(Debug, Deserialize)]
struct Reply {
    code: String,
    #[serde(default)]
    msg: String,
    sub_code: Option<String>,
    sub_msg: Option<String>,
    trade_status: Option<String>,
    trade_no: Option<String>,
    total_amount: Option<String>,
    send_pay_date: Option<String>,
    fund_change: Option<String>,
}

impl Reply {
    fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    fn sub_code(&self) -> &str {
        self.sub_code.as_deref().unwrap_or_default()
    }

    fn rejection(&self) -> GatewayError {
        GatewayError::rejected(
            self.sub_code.clone().unwrap_or_else(|| self.code.clone()),
            self.sub_msg.clone().unwrap_or_else(|| self.msg.clone()),
        )
    }
}

fn parse_pay_date(value: &str) -> Option<Timestamp> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Timestamp::from_datetime(naive.and_utc()))
}

// ════════════════════════════════════════════════════════════════════════════
// Adapter
// ════════════════════════════════════════════════════════════════════════════

pub struct WalletBGateway {
    config: WalletBConfig,
    signer: HmacSigner,
    http_client: reqwest::Client,
}

impl WalletBGateway {
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` if the HTTP client cannot be built.
    pub fn new(config: WalletBConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            signer: HmacSigner::new(config.sign_key.clone()),
            config,
            http_client,
        })
    }

    /// Builds the signed parameter set for `method`.
    fn signed_params(
        &self,
        method: &str,
        biz_content: serde_json::Value,
        with_notify: bool,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), self.config.app_id.clone());
        params.insert("method".to_string(), method.to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("sign_type".to_string(), "HMAC-SHA256".to_string());
        params.insert("version".to_string(), "1.0".to_string());
        params.insert(
            "timestamp".to_string(),
            Timestamp::now()
                .as_datetime()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        );
        params.insert("biz_content".to_string(), biz_content.to_string());
        if with_notify {
            params.insert("notify_url".to_string(), self.config.notify_url.clone());
        }
        let sign = self.signer.sign(canonical_params(&params).as_bytes());
        params.insert("sign".to_string(), sign);
        params
    }

    async fn call(
        &self,
        method: &str,
        biz_content: serde_json::Value,
    ) -> Result<Reply, GatewayError> {
        let params = self.signed_params(method, biz_content, false);
        let response = self
            .http_client
            .post(&self.config.gateway_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::TransientNetwork(format!(
                "walletB returned {}",
                status
            )));
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
    }

    fn field<'a>(
        params: &'a BTreeMap<String, String>,
        name: &str,
    ) -> Result<&'a str, GatewayError> {
        params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::MalformedPayload(format!("missing field {}", name)))
    }
}

#[async_trait]
impl PaymentGateway for WalletBGateway {
    fn provider(&self) -> Provider {
        Provider::WalletB
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let (method, product_code) = match request.channel {
            PaymentChannel::WalletBWeb => ("wallet.trade.page.pay", "FAST_INSTANT_TRADE_PAY"),
            PaymentChannel::WalletBMobile => ("wallet.trade.wap.pay", "QUICK_WAP_WAY"),
            other => {
                return Err(GatewayError::rejected(
                    "CHANNEL_NOT_SUPPORTED",
                    format!("walletB cannot serve channel {}", other),
                ))
            }
        };

        let biz_content = serde_json::json!({
            "out_trade_no": request.order_no.as_str(),
            "total_amount": format_amount(request.amount),
            "subject": request.description,
            "product_code": product_code,
            "time_expire": request
                .expires_at
                .as_datetime()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        });
        let mut params = self.signed_params(method, biz_content, true);
        if let Some(return_url) = &request.return_url {
            params.remove("sign");
            params.insert("return_url".to_string(), return_url.clone());
            let sign = self.signer.sign(canonical_params(&params).as_bytes());
            params.insert("sign".to_string(), sign);
        }

        let url = reqwest::Url::parse_with_params(&self.config.gateway_url, params.iter())
            .map_err(|e| GatewayError::ProviderUnavailable(format!("bad gateway url: {}", e)))?;

        Ok(PaymentIntent {
            provider: Provider::WalletB,
            channel: request.channel,
            handle: IntentHandle::RedirectUrl(url.to_string()),
            expires_at: request.expires_at,
        })
    }

    async fn query_status(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<QueryOutcome, GatewayError> {
        let reply = match self
            .call(
                "wallet.trade.query",
                serde_json::json!({ "out_trade_no": order_no.as_str() }),
            )
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(order_no = %order_no, error = %err, "walletB query failed");
                return Ok(QueryOutcome::unknown(err.to_string()));
            }
        };

        if !reply.is_success() {
            if reply.sub_code() == TRADE_NOT_EXIST {
                return Ok(QueryOutcome::NotPaid);
            }
            return Ok(QueryOutcome::unknown(reply.rejection().to_string()));
        }

        let Some(trade_status) = reply.trade_status.as_deref() else {
            return Ok(QueryOutcome::unknown("reply has no trade_status"));
        };
        let status = map_trade_status(trade_status);

        let details = match reply.trade_no.as_deref().filter(|t| !t.is_empty()) {
            Some(trade_no) => {
                let amount = match reply.total_amount.as_deref().map(parse_amount).transpose() {
                    Ok(amount) => amount,
                    Err(err) => return Ok(QueryOutcome::unknown(err.to_string())),
                };
                match TransactionId::new(trade_no) {
                    Ok(transaction_id) => Some(PaidDetails {
                        transaction_id,
                        amount,
                        paid_at: reply.send_pay_date.as_deref().and_then(parse_pay_date),
                    }),
                    Err(err) => return Ok(QueryOutcome::unknown(err.to_string())),
                }
            }
            None => None,
        };

        Ok(QueryOutcome::from_status(status, details))
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundOutcome, GatewayError> {
        let reply = self
            .call(
                "wallet.trade.refund",
                serde_json::json!({
                    "out_trade_no": request.order_no.as_str(),
                    "refund_amount": format_amount(request.amount),
                    "refund_reason": request.reason,
                    "out_request_no": request.refund_ref,
                }),
            )
            .await?;

        if !reply.is_success() {
            let reason = match reply.rejection() {
                GatewayError::ProviderRejected { code, message } => format!("{}: {}", code, message),
                other => other.to_string(),
            };
            return Ok(RefundOutcome::Rejected { reason });
        }

        Ok(RefundOutcome::Accepted {
            provider_refund_id: reply
                .fund_change
                .filter(|f| f == "Y")
                .map(|_| request.refund_ref.clone()),
        })
    }

    async fn close_order(
        &self,
        order_no: &OrderNo,
        _channel: PaymentChannel,
    ) -> Result<CloseOutcome, GatewayError> {
        let reply = self
            .call(
                "wallet.trade.close",
                serde_json::json!({ "out_trade_no": order_no.as_str() }),
            )
            .await?;

        if reply.is_success() {
            return Ok(CloseOutcome::Closed);
        }
        match reply.sub_code() {
            TRADE_NOT_EXIST | TRADE_STATUS_ERROR => Ok(CloseOutcome::AlreadyClosed),
            _ => Err(reply.rejection()),
        }
    }

    fn verify_and_decode(
        &self,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> Result<NormalizedCallback, GatewayError> {
        let params: BTreeMap<String, String> = serde_json::from_slice(body)
            .map_err(|e| GatewayError::SignatureInvalid(format!("unreadable notification: {}", e)))?;

        let sign = params
            .get("sign")
            .ok_or_else(|| GatewayError::SignatureInvalid("missing sign".into()))?;
        if !self.signer.verify(canonical_params(&params).as_bytes(), sign) {
            return Err(GatewayError::SignatureInvalid("signature mismatch".into()));
        }
        if params.get("app_id") != Some(&self.config.app_id) {
            return Err(GatewayError::SignatureInvalid("app_id mismatch".into()));
        }

        // Signature verified; from here on failures are decode errors.
        let order_no = Self::field(&params, "out_trade_no")
            .and_then(|v| {
                OrderNo::new(v).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
            })
            .map_err(|e| GatewayError::undecodable(None, e.to_string()))?;
        let undecodable =
            |e: GatewayError| GatewayError::undecodable(Some(order_no.clone()), e.to_string());

        let status = map_trade_status(Self::field(&params, "trade_status").map_err(undecodable)?);
        let transaction_id = params
            .get("trade_no")
            .filter(|v| !v.is_empty())
            .map(|v| {
                TransactionId::new(v.as_str())
                    .map_err(|e| GatewayError::MalformedPayload(e.to_string()))
            })
            .transpose()
            .map_err(undecodable)?;
        if status == NormalizedStatus::Paid && transaction_id.is_none() {
            return Err(undecodable(GatewayError::MalformedPayload(
                "paid notification has no trade_no".into(),
            )));
        }
        let amount = params
            .get("total_amount")
            .map(|a| parse_amount(a))
            .transpose()
            .map_err(undecodable)?;
        let paid_at = params.get("gmt_payment").and_then(|d| parse_pay_date(d));

        let raw = serde_json::to_value(&params)
            .map_err(|e| undecodable(GatewayError::MalformedPayload(e.to_string())))?;

        Ok(NormalizedCallback {
            provider: Provider::WalletB,
            order_no,
            transaction_id,
            status,
            amount,
            paid_at,
            raw,
        })
    }

    fn ack(&self, accepted: bool) -> AckToken {
        AckToken {
            status: 200,
            content_type: "text/plain",
            body: if accepted { "success" } else { "fail" }.to_string(),
        }
    }
}
