use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::{Comment, RateLimitRecord};

/// Durable storage for comments. Implementations must keep comments
/// immutable between insert and delete.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: Comment) -> AppResult<Comment>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Comment>>;
    /// Ascending by created_at.
    async fn list_by_post(&self, post_id: &str) -> AppResult<Vec<Comment>>;
    /// Returns false if no comment with this id existed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

/// Fields a conditional update may change. `version` is advanced by the
/// store itself.
#[derive(Debug, Clone)]
pub struct RateLimitPatch {
    pub daily_count: i64,
    pub last_reset_date: Date,
    pub is_blocked: bool,
    pub blocked_until: Option<OffsetDateTime>,
}

/// Durable storage for at most one rate-limit record per post_id.
#[async_trait]
pub trait RateLimitRecordStore: Send + Sync {
    async fn get(&self, post_id: &str) -> AppResult<Option<RateLimitRecord>>;

    /// Idempotent creation. When two first-accesses race, both callers get
    /// the single surviving record back.
    async fn create_if_absent(&self, record: RateLimitRecord) -> AppResult<RateLimitRecord>;

    /// Applies `patch` only if the stored version still equals
    /// `expected_version`, advancing the version by one. Any interleaving
    /// writer surfaces as `AppError::Conflict` for the caller to re-fetch
    /// and retry.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: RateLimitPatch,
    ) -> AppResult<RateLimitRecord>;
}
