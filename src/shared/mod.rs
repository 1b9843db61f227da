//! Shared utilities and common functionality
//!
//! This module contains error handling, logging, caller context propagation
//! and the retry policy used across the application.

pub mod context;
pub mod error;
pub mod logging;
pub mod retry;

pub use context::CallContext;
pub use error::{AppError, AppResult};
pub use logging::LoggingUtils;
pub use retry::{retry_with_backoff, RetryPolicy};
