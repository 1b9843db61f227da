//! Gateway order models and field extraction

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Value};

use crate::domain::submission::{GatewayStatus, Submission};
use crate::shared::error::{AppError, AppResult};

/// Order-create payload sent to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Idempotency key, reused across retries of one create call
    pub request_id: String,
    pub reference: String,
    pub description: String,
    pub currency_code: String,
    /// Amount with exactly two decimals
    pub amount_value: String,
    pub brand_name: Option<String>,
}

impl OrderRequest {
    pub fn for_submission(submission: &Submission, currency_code: &str, brand_name: Option<&str>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            reference: submission.id.to_string(),
            description: submission.category.order_description().to_string(),
            currency_code: currency_code.to_string(),
            amount_value: format_amount(submission.calculated_amount),
            brand_name: brand_name.map(str::to_string),
        }
    }

    /// JSON body in the gateway's order-create shape
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": self.reference,
                "invoice_id": self.reference,
                "custom_id": self.reference,
                "description": self.description,
                "amount": {
                    "currency_code": self.currency_code,
                    "value": self.amount_value,
                }
            }],
        });
        if let Some(brand) = &self.brand_name {
            payload["application_context"] = json!({
                "brand_name": brand,
                "shipping_preference": "NO_SHIPPING",
                "user_action": "PAY_NOW",
            });
        }
        payload
    }
}

/// Format money with exactly two decimals, rounding half away from zero
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Order as reported by the gateway, with the verbatim body kept for audit
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub status: GatewayStatus,
    pub raw: Value,
}

impl GatewayOrder {
    pub fn from_value(raw: Value) -> AppResult<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Json("gateway order response missing id".into()))?
            .to_string();
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .map(GatewayStatus::parse)
            .ok_or_else(|| AppError::Json("gateway order response missing status".into()))?;
        Ok(Self { id, status, raw })
    }

    pub fn capture_id(&self) -> Option<String> {
        capture_id_from_detail(&self.raw)
    }
}

/// OAuth client-credentials response
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Signature headers the gateway attaches to webhook deliveries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
    pub cert_url: String,
    pub auth_algo: String,
}

impl WebhookHeaders {
    pub const TRANSMISSION_ID: &'static str = "paypal-transmission-id";
    pub const TRANSMISSION_SIG: &'static str = "paypal-transmission-sig";
    pub const TRANSMISSION_TIME: &'static str = "paypal-transmission-time";
    pub const CERT_URL: &'static str = "paypal-cert-url";
    pub const AUTH_ALGO: &'static str = "paypal-auth-algo";

    /// Collect the signature headers; `None` if any is missing or not UTF-8
    pub fn from_header_map(headers: &warp::http::HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            transmission_id: get(Self::TRANSMISSION_ID)?,
            transmission_sig: get(Self::TRANSMISSION_SIG)?,
            transmission_time: get(Self::TRANSMISSION_TIME)?,
            cert_url: get(Self::CERT_URL)?,
            auth_algo: get(Self::AUTH_ALGO)?,
        })
    }

    pub fn verification_payload<'a>(&'a self, webhook_id: &'a str, event: &'a RawValue) -> VerificationRequest<'a> {
        VerificationRequest {
            auth_algo: &self.auth_algo,
            cert_url: &self.cert_url,
            transmission_id: &self.transmission_id,
            transmission_sig: &self.transmission_sig,
            transmission_time: &self.transmission_time,
            webhook_id,
            webhook_event: event,
        }
    }
}

/// Body of the signature verification call
#[derive(Debug, Serialize)]
pub struct VerificationRequest<'a> {
    pub auth_algo: &'a str,
    pub cert_url: &'a str,
    pub transmission_id: &'a str,
    pub transmission_sig: &'a str,
    pub transmission_time: &'a str,
    pub webhook_id: &'a str,
    /// The delivered event bytes, embedded verbatim since the signature covers them
    pub webhook_event: &'a RawValue,
}

fn captures(detail: &Value) -> impl Iterator<Item = &Value> {
    detail
        .get("purchase_units")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|unit| unit.pointer("/payments/captures").and_then(Value::as_array))
        .flatten()
}

/// Capture id from an order body, or the resource id of a bare capture resource
pub fn capture_id_from_detail(detail: &Value) -> Option<String> {
    if let Some(id) = captures(detail).find_map(|c| c.get("id").and_then(Value::as_str)) {
        return Some(id.to_string());
    }
    // webhook capture resources carry the capture fields at the top level
    let is_capture = detail.get("final_capture").is_some() || detail.get("seller_receivable_breakdown").is_some();
    if is_capture {
        return detail.get("id").and_then(Value::as_str).map(str::to_string);
    }
    None
}

/// Status of the first capture nested in an order body
pub fn capture_status_from_detail(detail: &Value) -> Option<String> {
    captures(detail)
        .find_map(|c| c.get("status").and_then(Value::as_str))
        .map(str::to_string)
}

/// Gateway fee from a capture's seller receivable breakdown
pub fn gateway_fee_from_detail(detail: &Value) -> Option<Decimal> {
    let breakdown = captures(detail)
        .find_map(|c| c.get("seller_receivable_breakdown"))
        .or_else(|| detail.get("seller_receivable_breakdown"))?;
    breakdown
        .pointer("/paypal_fee/value")
        .and_then(Value::as_str)
        .and_then(|v| v.parse::<Decimal>().ok())
}
