//! Submission store with optional Redis mirror
//!
//! Rows live in memory; when a Redis connection is configured every write is
//! mirrored there and misses fall through to it, so records survive restarts.
//! Updates are serialized per row. The new row is mirrored before it replaces
//! the in-memory copy, so a failed mirror leaves the row as it was, and no
//! mirror I/O runs under the map lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::domain::ports::SubmissionStore;
use crate::domain::submission::{GatewayStatus, StatusChange, Submission, SubmissionId};
use crate::shared::error::{AppError, AppResult};

/// Durable copy of the rows kept behind the in-memory map
#[async_trait]
pub trait RowMirror: Send + Sync {
    async fn save(&self, submission: &Submission) -> AppResult<()>;
    async fn load(&self, id: &SubmissionId) -> AppResult<Option<Submission>>;
    async fn remove(&self, id: &SubmissionId) -> AppResult<()>;
}

/// Rows stored as JSON under `submissions:{id}`
pub struct RedisMirror {
    conn: ConnectionManager,
}

impl RedisMirror {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(id: &SubmissionId) -> String {
        format!("submissions:{}", id)
    }
}

#[async_trait]
impl RowMirror for RedisMirror {
    async fn save(&self, submission: &Submission) -> AppResult<()> {
        let serialized = serde_json::to_vec(submission)
            .map_err(|e| AppError::Internal(format!("serialize submission: {}", e)))?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(Self::key(&submission.id), serialized).await?;
        Ok(())
    }

    async fn load(&self, id: &SubmissionId) -> AppResult<Option<Submission>> {
        let mut conn = self.conn.clone();
        let data: Option<Vec<u8>> = conn.get(Self::key(id)).await?;
        data.map(|bytes| {
            serde_json::from_slice::<Submission>(&bytes)
                .map_err(|e| AppError::Persistence(format!("deserialize submission: {}", e)))
        })
        .transpose()
    }

    async fn remove(&self, id: &SubmissionId) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::key(id)).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemorySubmissionStore {
    mirror: Option<Arc<dyn RowMirror>>,
    memory: Arc<RwLock<HashMap<SubmissionId, Submission>>>,
    row_locks: Arc<Mutex<HashMap<SubmissionId, Arc<Mutex<()>>>>>,
}

impl InMemorySubmissionStore {
    pub fn new(redis: Option<ConnectionManager>) -> Self {
        match redis {
            Some(conn) => Self::with_mirror(Arc::new(RedisMirror::new(conn))),
            None => Self::build(None),
        }
    }

    pub fn with_mirror(mirror: Arc<dyn RowMirror>) -> Self {
        Self::build(Some(mirror))
    }

    fn build(mirror: Option<Arc<dyn RowMirror>>) -> Self {
        Self {
            mirror,
            memory: Arc::new(RwLock::new(HashMap::new())),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a store, connecting the Redis mirror when a URL is given
    pub async fn connect(redis_url: Option<&str>) -> AppResult<Self> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                info!("Submission store mirrored to Redis");
                Some(manager)
            }
            None => None,
        };
        Ok(Self::new(redis))
    }

    async fn lock_row(&self, id: &SubmissionId) -> OwnedMutexGuard<()> {
        let lock = self.row_locks.lock().await.entry(id.clone()).or_default().clone();
        lock.lock_owned().await
    }

    async fn mirror(&self, submission: &Submission) -> AppResult<()> {
        match &self.mirror {
            Some(mirror) => mirror.save(submission).await,
            None => Ok(()),
        }
    }

    async fn load_mirrored(&self, id: &SubmissionId) -> AppResult<Option<Submission>> {
        match &self.mirror {
            Some(mirror) => mirror.load(id).await,
            None => Ok(None),
        }
    }

    /// Apply `f` to a copy of one row; when `f` reports a change the copy is
    /// mirrored and only then committed to memory
    async fn mutate<R, F>(&self, id: &SubmissionId, f: F) -> AppResult<R>
    where
        F: FnOnce(&mut Submission) -> (R, bool),
    {
        let _row = self.lock_row(id).await;
        let resident = self.memory.read().await.get(id).cloned();
        let mut row = match resident {
            Some(row) => row,
            None => self
                .load_mirrored(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("submission {}", id)))?,
        };
        let (result, changed) = f(&mut row);
        if changed {
            self.mirror(&row).await?;
        }
        self.memory.write().await.insert(id.clone(), row);
        Ok(result)
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn insert(&self, submission: Submission) -> AppResult<()> {
        let _row = self.lock_row(&submission.id).await;
        if self.memory.read().await.contains_key(&submission.id) {
            return Err(AppError::Validation(format!("submission {} already exists", submission.id)));
        }
        self.mirror(&submission).await?;
        self.memory.write().await.insert(submission.id.clone(), submission);
        Ok(())
    }

    async fn get_by_id(&self, id: &SubmissionId) -> AppResult<Submission> {
        if let Some(found) = self.memory.read().await.get(id) {
            return Ok(found.clone());
        }
        match self.load_mirrored(id).await? {
            Some(submission) => {
                // a write that landed meanwhile is newer than the mirror read
                let mut memory = self.memory.write().await;
                Ok(memory.entry(id.clone()).or_insert(submission).clone())
            }
            None => Err(AppError::NotFound(format!("submission {}", id))),
        }
    }

    async fn update_order(&self, id: &SubmissionId, order_id: &str, created_at: DateTime<Utc>) -> AppResult<StatusChange> {
        self.mutate(id, |row| {
            let change = row.apply_order(order_id, created_at);
            let changed = change == StatusChange::Applied;
            (change, changed)
        })
        .await
    }

    async fn update_capture(
        &self,
        id: &SubmissionId,
        detail: Value,
        status: GatewayStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<StatusChange> {
        self.mutate(id, |row| {
            let change = row.apply_capture(detail, status, completed_at);
            let changed = change == StatusChange::Applied;
            (change, changed)
        })
        .await
    }

    async fn update_failure_status(&self, id: &SubmissionId, status: GatewayStatus) -> AppResult<StatusChange> {
        self.mutate(id, |row| {
            let change = row.apply_failure(status);
            let changed = change == StatusChange::Applied;
            (change, changed)
        })
        .await
    }

    async fn update_amount(&self, id: &SubmissionId, amount: Decimal) -> AppResult<()> {
        self.mutate(id, |row| {
            let changed = row.calculated_amount != amount;
            row.calculated_amount = amount;
            ((), changed)
        })
        .await
    }

    async fn set_access_token(&self, id: &SubmissionId, token: &str) -> AppResult<()> {
        self.mutate(id, |row| {
            row.access_token = Some(token.to_string());
            ((), true)
        })
        .await
    }

    /// Only rows resident in memory are swept; mirrored rows are removed alongside
    async fn delete_stale_drafts(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let is_stale = |s: &Submission| s.is_draft() && s.created_at < cutoff;
        let candidates: Vec<SubmissionId> = self
            .memory
            .read()
            .await
            .values()
            .filter(|s| is_stale(s))
            .map(|s| s.id.clone())
            .collect();

        let mut removed = 0;
        for id in &candidates {
            let _row = self.lock_row(id).await;
            // the row may have moved on since the scan
            if !self.memory.read().await.get(id).is_some_and(is_stale) {
                continue;
            }
            if let Some(mirror) = &self.mirror {
                mirror.remove(id).await?;
            }
            self.memory.write().await.remove(id);
            removed += 1;
            debug!(submission_id = %id, "Deleted abandoned draft");
        }
        if removed > 0 {
            let mut locks = self.row_locks.lock().await;
            let memory = self.memory.read().await;
            locks.retain(|id, lock| memory.contains_key(id) || Arc::strong_count(lock) > 1);
        }
        Ok(removed)
    }
}
