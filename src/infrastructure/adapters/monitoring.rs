//! Monitoring adapter for metrics and observability
//!
//! This adapter owns the Prometheus registry. Counters cover outbound gateway
//! calls, retries, webhook outcomes, recovery branches and rate-limited requests.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::shared::error::{AppError, AppResult};

/// Adapter for monitoring and metrics services
pub struct MonitoringAdapter {
    prometheus_registry: Registry,
    gateway_calls: IntCounterVec,
    gateway_retries: IntCounterVec,
    webhook_events: IntCounterVec,
    recovery_outcomes: IntCounterVec,
    captures: IntCounterVec,
    rate_limited_requests: IntCounter,
}

fn metric_error(e: prometheus::Error) -> AppError {
    AppError::Internal(format!("metrics registration failed: {}", e))
}

impl MonitoringAdapter {
    /// Create a new monitoring adapter
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let gateway_calls = IntCounterVec::new(
            Opts::new("gateway_calls_total", "Outbound payment gateway calls"),
            &["operation", "outcome"],
        )
        .map_err(metric_error)?;
        let gateway_retries = IntCounterVec::new(
            Opts::new("gateway_retries_total", "Retried gateway attempts after a transient failure"),
            &["operation"],
        )
        .map_err(metric_error)?;
        let webhook_events = IntCounterVec::new(
            Opts::new("webhook_events_total", "Webhook deliveries by outcome"),
            &["outcome"],
        )
        .map_err(metric_error)?;
        let recovery_outcomes = IntCounterVec::new(
            Opts::new("recovery_outcomes_total", "Order recovery runs by branch taken"),
            &["branch"],
        )
        .map_err(metric_error)?;
        let captures = IntCounterVec::new(
            Opts::new("captures_total", "Capture requests by result source"),
            &["source"],
        )
        .map_err(metric_error)?;
        let rate_limited_requests = IntCounter::new("rate_limited_requests_total", "Requests rejected by the rate limiter")
            .map_err(metric_error)?;

        registry.register(Box::new(gateway_calls.clone())).map_err(metric_error)?;
        registry.register(Box::new(gateway_retries.clone())).map_err(metric_error)?;
        registry.register(Box::new(webhook_events.clone())).map_err(metric_error)?;
        registry.register(Box::new(recovery_outcomes.clone())).map_err(metric_error)?;
        registry.register(Box::new(captures.clone())).map_err(metric_error)?;
        registry.register(Box::new(rate_limited_requests.clone())).map_err(metric_error)?;

        Ok(Self {
            prometheus_registry: registry,
            gateway_calls,
            gateway_retries,
            webhook_events,
            recovery_outcomes,
            captures,
            rate_limited_requests,
        })
    }

    pub fn record_gateway_call(&self, operation: &str, outcome: &str) {
        self.gateway_calls.with_label_values(&[operation, outcome]).inc();
    }

    pub fn record_gateway_retry(&self, operation: &str) {
        self.gateway_retries.with_label_values(&[operation]).inc();
    }

    pub fn record_webhook(&self, outcome: &str) {
        self.webhook_events.with_label_values(&[outcome]).inc();
    }

    pub fn record_recovery(&self, branch: &str) {
        self.recovery_outcomes.with_label_values(&[branch]).inc();
    }

    pub fn record_capture(&self, source: &str) {
        self.captures.with_label_values(&[source]).inc();
    }

    /// Record rate limited request
    pub fn record_rate_limited_request(&self) {
        self.rate_limited_requests.inc();
    }

    /// Get Prometheus metrics in text format
    pub fn get_prometheus_metrics(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.prometheus_registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}
