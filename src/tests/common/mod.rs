//! Common test utilities and mock implementations
//!
//! `MockGateway` replays scripted responses per operation and counts calls;
//! `CountingStore` wraps the in-memory store and counts writes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use crate::domain::gateway::{GatewayOrder, OrderRequest, WebhookHeaders};
use crate::domain::ports::{PaymentGateway, SubmissionStore};
use crate::domain::submission::{GatewayStatus, StatusChange, Submission, SubmissionId};
use crate::infrastructure::adapters::{InMemorySubmissionStore, MonitoringAdapter};
use crate::infrastructure::http::state::AppState;
use crate::shared::context::CallContext;
use crate::shared::error::{AppError, AppResult};
use crate::tests::config;

type Script<T> = Mutex<VecDeque<AppResult<T>>>;

fn next<T>(script: &Script<T>, operation: &str) -> AppResult<T> {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(AppError::Internal(format!("no scripted response for {}", operation))))
}

/// Payment gateway double with per-operation response queues
#[derive(Default)]
pub struct MockGateway {
    create: Script<GatewayOrder>,
    capture: Script<GatewayOrder>,
    get: Script<GatewayOrder>,
    verify: Script<bool>,
    pub create_calls: AtomicU32,
    pub capture_calls: AtomicU32,
    pub get_calls: AtomicU32,
    pub verify_calls: AtomicU32,
    pub create_requests: Mutex<Vec<OrderRequest>>,
    pub capture_request_ids: Mutex<Vec<String>>,
    pub verified_events: Mutex<Vec<String>>,
    /// Holds create calls until this many are in flight
    pub create_barrier: Mutex<Option<Arc<tokio::sync::Barrier>>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_create(&self, response: AppResult<GatewayOrder>) -> &Self {
        self.create.lock().unwrap().push_back(response);
        self
    }

    pub fn script_capture(&self, response: AppResult<GatewayOrder>) -> &Self {
        self.capture.lock().unwrap().push_back(response);
        self
    }

    pub fn script_get(&self, response: AppResult<GatewayOrder>) -> &Self {
        self.get.lock().unwrap().push_back(response);
        self
    }

    pub fn script_verify(&self, response: AppResult<bool>) -> &Self {
        self.verify.lock().unwrap().push_back(response);
        self
    }

    /// Calls that reach the gateway's order endpoints
    pub fn order_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
            + self.capture_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, _ctx: &CallContext, request: &OrderRequest) -> AppResult<GatewayOrder> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.create_requests.lock().unwrap().push(request.clone());
        let barrier = self.create_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        next(&self.create, "create_order")
    }

    async fn capture_order(&self, _ctx: &CallContext, _order_id: &str, request_id: &str) -> AppResult<GatewayOrder> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        self.capture_request_ids.lock().unwrap().push(request_id.to_string());
        next(&self.capture, "capture_order")
    }

    async fn get_order(&self, _ctx: &CallContext, _order_id: &str) -> AppResult<GatewayOrder> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.get, "get_order")
    }

    async fn verify_webhook_signature(
        &self,
        _ctx: &CallContext,
        _headers: &WebhookHeaders,
        raw_event: &RawValue,
    ) -> AppResult<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verified_events.lock().unwrap().push(raw_event.get().to_string());
        next(&self.verify, "verify_webhook_signature")
    }
}

/// Store wrapper counting every mutating call
pub struct CountingStore {
    inner: InMemorySubmissionStore,
    pub writes: AtomicU32,
    /// When set, capture updates fail as if the backing store were down
    pub fail_updates: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemorySubmissionStore::new(None),
            writes: AtomicU32::new(0),
            fail_updates: AtomicBool::new(false),
        })
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubmissionStore for CountingStore {
    async fn insert(&self, submission: Submission) -> AppResult<()> {
        self.count();
        self.inner.insert(submission).await
    }

    async fn get_by_id(&self, id: &SubmissionId) -> AppResult<Submission> {
        self.inner.get_by_id(id).await
    }

    async fn update_order(&self, id: &SubmissionId, order_id: &str, created_at: DateTime<Utc>) -> AppResult<StatusChange> {
        self.count();
        self.inner.update_order(id, order_id, created_at).await
    }

    async fn update_capture(
        &self,
        id: &SubmissionId,
        detail: Value,
        status: GatewayStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<StatusChange> {
        self.count();
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection refused".into()));
        }
        self.inner.update_capture(id, detail, status, completed_at).await
    }

    async fn update_failure_status(&self, id: &SubmissionId, status: GatewayStatus) -> AppResult<StatusChange> {
        self.count();
        self.inner.update_failure_status(id, status).await
    }

    async fn update_amount(&self, id: &SubmissionId, amount: Decimal) -> AppResult<()> {
        self.count();
        self.inner.update_amount(id, amount).await
    }

    async fn set_access_token(&self, id: &SubmissionId, token: &str) -> AppResult<()> {
        self.count();
        self.inner.set_access_token(id, token).await
    }

    async fn delete_stale_drafts(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        self.count();
        self.inner.delete_stale_drafts(cutoff).await
    }
}

/// Fully wired application over the mock gateway and counting store
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub store: Arc<CountingStore>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        config::init();
        let gateway = MockGateway::new();
        let store = CountingStore::new();
        let monitoring = Arc::new(MonitoringAdapter::new().unwrap());
        let state = AppState::build(config::test_config(), gateway.clone(), store.clone(), monitoring);
        Self { gateway, store, state }
    }
}

/// Gateway payload fixtures
pub mod fixtures {
    use super::*;

    pub fn order(id: &str, status: &str) -> GatewayOrder {
        GatewayOrder::from_value(json!({ "id": id, "status": status })).unwrap()
    }

    pub fn completed_order(id: &str, submission_id: &SubmissionId, capture_id: &str) -> GatewayOrder {
        GatewayOrder::from_value(json!({
            "id": id,
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": submission_id.as_str(),
                "payments": {
                    "captures": [{
                        "id": capture_id,
                        "status": "COMPLETED",
                        "amount": { "currency_code": "USD", "value": "105.00" },
                        "seller_receivable_breakdown": {
                            "paypal_fee": { "currency_code": "USD", "value": "3.35" }
                        }
                    }]
                }
            }]
        }))
        .unwrap()
    }

    pub fn already_captured() -> AppError {
        AppError::Gateway {
            status: 422,
            body: json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{ "issue": "ORDER_ALREADY_CAPTURED" }]
            })
            .to_string(),
        }
    }

    pub fn capture_event(submission_id: &SubmissionId, capture_id: &str, status: &str) -> Value {
        json!({
            "id": "WH-1",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": capture_id,
                "status": status,
                "custom_id": submission_id.as_str(),
                "final_capture": true,
                "amount": { "currency_code": "USD", "value": "105.00" }
            }
        })
    }

    /// Signature headers the ingestor requires before verification
    pub fn signature_headers() -> warp::http::HeaderMap {
        let mut headers = warp::http::HeaderMap::new();
        for (name, value) in [
            (WebhookHeaders::TRANSMISSION_ID, "tx-1"),
            (WebhookHeaders::TRANSMISSION_SIG, "sig"),
            (WebhookHeaders::TRANSMISSION_TIME, "2025-01-01T00:00:00Z"),
            (WebhookHeaders::CERT_URL, "https://api.sandbox.paypal.com/cert"),
            (WebhookHeaders::AUTH_ALGO, "SHA256withRSA"),
        ] {
            headers.insert(name, value.parse().unwrap());
        }
        headers
    }
}
