//! Application services - Orchestration of domain logic

pub mod access_service;
pub mod capture_executor;
pub mod cleanup_worker;
pub mod order_lifecycle;
pub mod recovery_service;
pub mod submission_service;
pub mod webhook_service;

pub use access_service::{AccessService, Credentials};
pub use capture_executor::CaptureExecutor;
pub use cleanup_worker::{CleanupReport, CleanupWorker};
pub use order_lifecycle::{CaptureResult, CaptureSource, OrderLifecycleController};
pub use recovery_service::{RecoveryOutcome, RecoveryService};
pub use submission_service::{NewSubmission, SubmissionReceipt, SubmissionService};
pub use webhook_service::WebhookIngestor;
