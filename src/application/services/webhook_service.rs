//! Webhook ingestion
//!
//! Best-effort catch-up path for gateway push notifications. Nothing is
//! written unless the delivery's signature verified; irrelevant but
//! well-formed events are acknowledged with 200 so the gateway stops
//! redelivering them.

use std::sync::Arc;

use chrono::Utc;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, info, warn};
use warp::http::{HeaderMap, StatusCode};

use crate::domain::gateway::{capture_status_from_detail, WebhookHeaders};
use crate::domain::ports::{PaymentGateway, SubmissionStore};
use crate::domain::submission::{GatewayStatus, StatusChange, SubmissionId};
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::context::CallContext;
use crate::shared::error::AppError;
use crate::shared::logging::LoggingUtils;

const CORRELATION_FIELDS: [&str; 2] = ["invoice_id", "custom_id"];
const PURCHASE_UNIT_FIELDS: [&str; 3] = ["invoice_id", "custom_id", "reference_id"];

/// Submission id carried by a webhook resource, if any
pub fn correlation_id(resource: &Value) -> Option<SubmissionId> {
    let parse = |v: &Value| v.as_str().and_then(|s| SubmissionId::parse(s).ok());

    if let Some(id) = CORRELATION_FIELDS.iter().find_map(|f| resource.get(*f).and_then(parse)) {
        return Some(id);
    }
    resource
        .get("purchase_units")
        .and_then(Value::as_array)?
        .iter()
        .find_map(|unit| PURCHASE_UNIT_FIELDS.iter().find_map(|f| unit.get(*f).and_then(parse)))
}

/// Resource status, else the nested capture status, else the event type
pub fn derive_status(resource: &Value, event_type: &str) -> GatewayStatus {
    resource
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| capture_status_from_detail(resource))
        .map(|s| GatewayStatus::parse(&s))
        .unwrap_or_else(|| GatewayStatus::parse(event_type))
}

/// Gateway order the event belongs to: the resource itself for order
/// events, the related order for capture events
pub fn event_order_id<'a>(resource: &'a Value, event_type: &str) -> Option<&'a str> {
    if event_type.starts_with("CHECKOUT.ORDER.") {
        return resource.get("id").and_then(Value::as_str);
    }
    resource
        .pointer("/supplementary_data/related_ids/order_id")
        .and_then(Value::as_str)
}

pub struct WebhookIngestor {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn SubmissionStore>,
    verify_signatures: bool,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl WebhookIngestor {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn SubmissionStore>, verify_signatures: bool) -> Self {
        if !verify_signatures {
            warn!("Webhook signature verification is disabled");
        }
        Self {
            gateway,
            store,
            verify_signatures,
            monitoring: None,
        }
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    fn outcome(&self, outcome: &str, status: StatusCode) -> StatusCode {
        if let Some(monitoring) = &self.monitoring {
            monitoring.record_webhook(outcome);
        }
        status
    }

    /// Process one delivery and return the status to answer the gateway with
    pub async fn handle(&self, ctx: &CallContext, raw_body: &[u8], headers: &HeaderMap) -> StatusCode {
        let signature = WebhookHeaders::from_header_map(headers);
        if self.verify_signatures && signature.is_none() {
            LoggingUtils::log_security_event("webhook_missing_signature", "signature headers absent", "gateway");
            return self.outcome("unauthenticated", StatusCode::UNAUTHORIZED);
        }

        let (raw_event, event) = match serde_json::from_slice::<&RawValue>(raw_body)
            .and_then(|raw| serde_json::from_str::<Value>(raw.get()).map(|event| (raw, event)))
        {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Malformed webhook body");
                return self.outcome("malformed", StatusCode::BAD_REQUEST);
            }
        };

        match (self.verify_signatures, &signature) {
            (true, Some(signature)) => match self.gateway.verify_webhook_signature(ctx, signature, raw_event).await {
                Ok(true) => {}
                Ok(false) => {
                    LoggingUtils::log_security_event(
                        "webhook_signature_rejected",
                        &signature.transmission_id,
                        "gateway",
                    );
                    return self.outcome("unauthenticated", StatusCode::UNAUTHORIZED);
                }
                Err(e) => {
                    warn!(transmission_id = %signature.transmission_id, error = %e, "Webhook signature could not be verified");
                    return self.outcome("unauthenticated", StatusCode::UNAUTHORIZED);
                }
            },
            _ => warn!("Accepting webhook without signature verification"),
        }

        let event_type = event.get("event_type").and_then(Value::as_str).unwrap_or_default();
        let Some(resource) = event.get("resource").filter(|r| r.is_object()) else {
            warn!(event_type = %event_type, "Webhook event has no resource");
            return self.outcome("malformed", StatusCode::BAD_REQUEST);
        };

        let Some(submission_id) = correlation_id(resource) else {
            debug!(event_type = %event_type, "Webhook event does not reference a submission");
            return self.outcome("ignored", StatusCode::OK);
        };

        if let Some(event_order) = event_order_id(resource, event_type) {
            match self.store.get_by_id(&submission_id).await {
                Ok(row) => {
                    if let Some(stored) = row.gateway_order_id.as_deref().filter(|stored| *stored != event_order) {
                        info!(
                            submission_id = %submission_id,
                            event_order = %event_order,
                            stored_order = %stored,
                            "Webhook refers to a superseded order; ignored"
                        );
                        return self.outcome("ignored", StatusCode::OK);
                    }
                }
                Err(AppError::NotFound(_)) => {
                    debug!(submission_id = %submission_id, "Webhook for unknown submission");
                    return self.outcome("ignored", StatusCode::OK);
                }
                Err(e) => {
                    warn!(submission_id = %submission_id, error = %e, "Webhook lookup failed");
                    return self.outcome("error", StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        }

        let status = derive_status(resource, event_type);
        let completed_at = status.is_completed().then(Utc::now);
        match self
            .store
            .update_capture(&submission_id, resource.clone(), status.clone(), completed_at)
            .await
        {
            Ok(StatusChange::Applied) => {
                LoggingUtils::log_transition(submission_id.as_str(), "webhook", &status.as_string(), event_type);
                self.outcome("applied", StatusCode::OK)
            }
            Ok(StatusChange::Unchanged) => self.outcome("unchanged", StatusCode::OK),
            Ok(StatusChange::Refused) => {
                info!(
                    submission_id = %submission_id,
                    event_type = %event_type,
                    status = %status,
                    "Webhook would regress a settled record; ignored"
                );
                self.outcome("refused", StatusCode::OK)
            }
            Err(AppError::NotFound(_)) => {
                debug!(submission_id = %submission_id, "Webhook for unknown submission");
                self.outcome("ignored", StatusCode::OK)
            }
            Err(e) => {
                // non-2xx makes the gateway redeliver
                warn!(submission_id = %submission_id, error = %e, "Webhook update failed");
                self.outcome("error", StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
