//! Gateway client adapter
//!
//! This adapter handles all HTTP communication with the payment gateway:
//! OAuth bearer credentials, order create/get/capture and webhook signature
//! verification. Every call runs under the caller's [`CallContext`] and a
//! bounded per-request timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::domain::gateway::{GatewayOrder, OAuthToken, OrderRequest, VerificationRequest, WebhookHeaders};
use crate::domain::ports::PaymentGateway;
use crate::infrastructure::adapters::monitoring::MonitoringAdapter;
use crate::shared::context::CallContext;
use crate::shared::error::{AppError, AppResult};

#[derive(Debug, Clone)]
struct CachedCredential {
    /// `token_type + " " + access_token`
    header_value: String,
    /// Already shifted earlier by the refresh margin
    refresh_at: DateTime<Utc>,
}

impl CachedCredential {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_at
    }
}

/// Adapter for the external payment gateway
pub struct GatewayClient {
    config: GatewayConfig,
    http: Client,
    credential: RwLock<Option<CachedCredential>>,
    refresh_lock: Mutex<()>,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            credential: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            monitoring: None,
        })
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn record(&self, operation: &str, result: &AppResult<impl Sized>) {
        if let Some(monitoring) = &self.monitoring {
            let outcome = match result {
                Ok(_) => "ok",
                Err(e) => e.code(),
            };
            monitoring.record_gateway_call(operation, outcome);
        }
    }

    /// Bearer credential, fetched from the OAuth endpoint only when absent or
    /// within the refresh margin of expiring
    pub async fn get_access_token(&self, ctx: &CallContext) -> AppResult<String> {
        if let Some(cached) = self.credential.read().await.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.header_value.clone());
            }
        }

        let _guard = ctx.run(async { Ok(self.refresh_lock.lock().await) }).await?;

        // Another caller may have refreshed while we waited for the lock
        if let Some(cached) = self.credential.read().await.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.header_value.clone());
            }
        }

        let fetched = ctx.run(self.fetch_access_token()).await;
        self.record("oauth", &fetched);
        let token = fetched?;

        let margin = chrono::Duration::seconds(self.config.token_refresh_margin_seconds as i64);
        let refresh_at = Utc::now() + chrono::Duration::seconds(token.expires_in) - margin;
        let header_value = format!("{} {}", token.token_type, token.access_token);
        *self.credential.write().await = Some(CachedCredential {
            header_value: header_value.clone(),
            refresh_at,
        });
        info!(expires_in = token.expires_in, "Gateway bearer credential refreshed");
        Ok(header_value)
    }

    async fn fetch_access_token(&self) -> AppResult<OAuthToken> {
        let response = self
            .http
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let body = Self::success_body(response).await?;
        serde_json::from_value::<OAuthToken>(body)
            .map_err(|e| AppError::Json(format!("invalid OAuth response: {}", e)))
    }

    async fn invalidate_credential(&self) {
        *self.credential.write().await = None;
    }

    /// Read a 2xx body as JSON; anything else becomes `AppError::Gateway` with the raw body
    async fn success_body(response: Response) -> AppResult<Value> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AppError::Gateway {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| AppError::Json(format!("invalid gateway response: {}", e)))
    }

    async fn check_unauthorized<T>(&self, result: AppResult<T>) -> AppResult<T> {
        if let Err(AppError::Gateway { status: 401, .. }) = &result {
            warn!("Gateway rejected bearer credential; dropping cached value");
            self.invalidate_credential().await;
        }
        result
    }

    async fn send_create_order(&self, bearer: &str, request: &OrderRequest) -> AppResult<GatewayOrder> {
        let response = self
            .http
            .post(self.url("/v2/checkout/orders"))
            .header("Authorization", bearer)
            .header("PayPal-Request-Id", &request.request_id)
            .header("Prefer", "return=representation")
            .json(&request.to_payload())
            .send()
            .await?;
        let body = Self::success_body(response).await?;
        GatewayOrder::from_value(body)
    }

    async fn send_capture(&self, bearer: &str, order_id: &str, request_id: &str) -> AppResult<GatewayOrder> {
        let response = self
            .http
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", order_id)))
            .header("Authorization", bearer)
            .header("PayPal-Request-Id", request_id)
            .header("Prefer", "return=representation")
            .json(&json!({}))
            .send()
            .await?;
        let http_status = response.status();
        let body = Self::success_body(response).await?;
        let order = GatewayOrder::from_value(body)?;
        if http_status != StatusCode::CREATED {
            return Err(AppError::CaptureIncomplete {
                status: format!("HTTP {} {}", http_status.as_u16(), order.status),
            });
        }
        if !order.status.is_completed() {
            return Err(AppError::CaptureIncomplete {
                status: order.status.to_string(),
            });
        }
        Ok(order)
    }

    async fn send_get_order(&self, bearer: &str, order_id: &str) -> AppResult<GatewayOrder> {
        let response = self
            .http
            .get(self.url(&format!("/v2/checkout/orders/{}", order_id)))
            .header("Authorization", bearer)
            .send()
            .await?;
        let body = Self::success_body(response).await?;
        GatewayOrder::from_value(body)
    }

    async fn send_verify(&self, bearer: &str, payload: &VerificationRequest<'_>) -> AppResult<bool> {
        let response = self
            .http
            .post(self.url("/v1/notifications/verify-webhook-signature"))
            .header("Authorization", bearer)
            .json(payload)
            .send()
            .await?;
        let body = Self::success_body(response).await?;
        Ok(body.get("verification_status").and_then(Value::as_str) == Some("SUCCESS"))
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_order(&self, ctx: &CallContext, request: &OrderRequest) -> AppResult<GatewayOrder> {
        let bearer = self.get_access_token(ctx).await?;
        debug!(reference = %request.reference, amount = %request.amount_value, "Creating gateway order");
        let result = ctx.run(self.send_create_order(&bearer, request)).await;
        self.record("create_order", &result);
        self.check_unauthorized(result).await
    }

    async fn capture_order(&self, ctx: &CallContext, order_id: &str, request_id: &str) -> AppResult<GatewayOrder> {
        let bearer = self.get_access_token(ctx).await?;
        debug!(order_id = %order_id, "Capturing gateway order");
        let result = ctx.run(self.send_capture(&bearer, order_id, request_id)).await;
        self.record("capture_order", &result);
        self.check_unauthorized(result).await
    }

    async fn get_order(&self, ctx: &CallContext, order_id: &str) -> AppResult<GatewayOrder> {
        let bearer = self.get_access_token(ctx).await?;
        let result = ctx.run(self.send_get_order(&bearer, order_id)).await;
        self.record("get_order", &result);
        self.check_unauthorized(result).await
    }

    async fn verify_webhook_signature(
        &self,
        ctx: &CallContext,
        headers: &WebhookHeaders,
        raw_event: &RawValue,
    ) -> AppResult<bool> {
        if self.config.webhook_id.is_empty() {
            return Err(AppError::Config("gateway.webhook_id is not configured".into()));
        }
        let bearer = self.get_access_token(ctx).await?;
        let payload = headers.verification_payload(&self.config.webhook_id, raw_event);
        let result = ctx.run(self.send_verify(&bearer, &payload)).await;
        self.record("verify_webhook", &result);
        self.check_unauthorized(result).await
    }
}
