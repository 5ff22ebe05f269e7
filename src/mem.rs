use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Comment, RateLimitRecord};
use crate::store::{CommentStore, RateLimitPatch, RateLimitRecordStore};

/// In-memory comment store. Fallback backend when no database is
/// configured, and the harness the integration tests run against.
#[derive(Clone, Default)]
pub struct MemCommentStore {
    inner: Arc<Mutex<Vec<Comment>>>,
}

impl MemCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for MemCommentStore {
    async fn insert(&self, comment: Comment) -> AppResult<Comment> {
        let mut guard = self.inner.lock().await;
        guard.push(comment.clone());
        Ok(comment)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let guard = self.inner.lock().await;
        Ok(guard.iter().find(|c| c.id == id).cloned())
    }

    async fn list_by_post(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        let guard = self.inner.lock().await;
        let mut items: Vec<Comment> = guard.iter().filter(|c| c.post_id == post_id).cloned().collect();
        // Stable sort keeps insertion order for equal timestamps.
        items.sort_by_key(|c| c.created_at);
        Ok(items)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|c| c.id != id);
        Ok(guard.len() < before)
    }
}

/// In-memory rate-limit record store keyed by post_id. Conditional updates
/// honor the same version token the Postgres store uses, so the tracker's
/// retry loop behaves identically against both backends.
#[derive(Clone, Default)]
pub struct MemRateLimitStore {
    inner: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl MemRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitRecordStore for MemRateLimitStore {
    async fn get(&self, post_id: &str) -> AppResult<Option<RateLimitRecord>> {
        let guard = self.inner.lock().await;
        Ok(guard.get(post_id).cloned())
    }

    async fn create_if_absent(&self, record: RateLimitRecord) -> AppResult<RateLimitRecord> {
        let mut guard = self.inner.lock().await;
        let existing = guard.entry(record.post_id.clone()).or_insert(record);
        Ok(existing.clone())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: RateLimitPatch,
    ) -> AppResult<RateLimitRecord> {
        let mut guard = self.inner.lock().await;
        let record = guard
            .values_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::Conflict("rate limit record missing".to_string()))?;
        if record.version != expected_version {
            return Err(AppError::Conflict("rate limit record version changed".to_string()));
        }
        record.daily_count = patch.daily_count;
        record.last_reset_date = patch.last_reset_date;
        record.is_blocked = patch.is_blocked;
        record.blocked_until = patch.blocked_until;
        record.version += 1;
        Ok(record.clone())
    }
}
