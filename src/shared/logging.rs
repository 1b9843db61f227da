//! Logging utilities module
//!
//! This module provides centralized logging functionality and utilities.

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified configuration
    pub fn initialize(level: &str, format: &str) -> crate::shared::error::AppResult<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let result = if format.eq_ignore_ascii_case("json") {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|e| {
            crate::shared::error::AppError::Internal(format!("Failed to initialize logging: {}", e))
        })
    }

    /// Short, non-reversible fingerprint of a token for log lines
    pub fn token_fingerprint(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Log a state transition on a submission
    pub fn log_transition(submission_id: &str, from: &str, to: &str, source: &str) {
        info!(
            submission_id = %submission_id,
            from = %from,
            to = %to,
            source = %source,
            "Submission payment state changed"
        );
    }

    /// Log a persistence failure that happened after the gateway already moved money
    pub fn log_post_side_effect_failure(submission_id: &str, order_id: &str, err: &crate::shared::error::AppError) {
        error!(
            alert = true,
            submission_id = %submission_id,
            order_id = %order_id,
            error = %err,
            "Local write failed after gateway side effect; reporting success to caller"
        );
    }

    /// Log security events
    pub fn log_security_event(event_type: &str, details: &str, identity: &str) {
        warn!(
            event_type = %event_type,
            details = %details,
            identity = %identity,
            "Security event detected"
        );
    }
}
