//! Background sweep of abandoned drafts and expired token associations

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::CleanupConfig;
use crate::domain::ports::SubmissionStore;
use crate::infrastructure::adapters::AccessTokenManager;
use crate::middleware::RateLimitMiddleware;
use crate::shared::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub drafts_deleted: usize,
    pub tokens_purged: usize,
}

pub struct CleanupWorker {
    store: Arc<dyn SubmissionStore>,
    tokens: Arc<AccessTokenManager>,
    interval: Duration,
    draft_max_age: chrono::Duration,
    rate_limiter: Option<Arc<RateLimitMiddleware>>,
}

impl CleanupWorker {
    pub fn new(store: Arc<dyn SubmissionStore>, tokens: Arc<AccessTokenManager>, config: &CleanupConfig) -> Self {
        Self {
            store,
            tokens,
            interval: Duration::from_secs(config.interval_seconds),
            draft_max_age: chrono::Duration::hours(config.draft_max_age_hours as i64),
            rate_limiter: None,
        }
    }

    /// Also prune idle rate-limit keys on every sweep
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimitMiddleware>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// One sweep as of `now`
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> AppResult<CleanupReport> {
        let drafts_deleted = self.store.delete_stale_drafts(now - self.draft_max_age).await?;
        let tokens_purged = self.tokens.purge_expired(now).await;
        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.retain_recent();
        }
        Ok(CleanupReport {
            drafts_deleted,
            tokens_purged,
        })
    }

    /// Sweep on every interval tick until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Starting cleanup worker");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(report) if report != CleanupReport::default() => {
                            info!(
                                drafts_deleted = report.drafts_deleted,
                                tokens_purged = report.tokens_purged,
                                "Cleanup sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Cleanup sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Cleanup worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }
}
