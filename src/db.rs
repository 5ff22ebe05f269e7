use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Comment, RateLimitRecord};
use crate::store::{CommentStore, RateLimitPatch, RateLimitRecordStore};

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(600))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .connect(database_url)
        .await
}

pub async fn init(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS comments (
			id UUID PRIMARY KEY,
			post_id TEXT NOT NULL,
			author_name TEXT NOT NULL,
			author_email TEXT NOT NULL,
			content TEXT NOT NULL,
			created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
		)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_comments_post_created_at ON comments(post_id, created_at)",
    )
    .execute(pool)
    .await?;

    // One record per post; the unique post_id is what makes lazy creation
    // idempotent under concurrent first access.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rate_limits (
			id UUID NOT NULL,
			post_id TEXT PRIMARY KEY,
			daily_count BIGINT NOT NULL DEFAULT 0,
			last_reset_date DATE NOT NULL,
			is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
			blocked_until TIMESTAMPTZ,
			version BIGINT NOT NULL DEFAULT 1
		)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

type CommentRow = (Uuid, String, String, String, String, OffsetDateTime);

fn comment_from_row(row: CommentRow) -> Comment {
    let (id, post_id, author_name, author_email, content, created_at) = row;
    Comment {
        id,
        post_id,
        author_name,
        author_email,
        content,
        created_at,
    }
}

type RateLimitRow = (Uuid, String, i64, Date, bool, Option<OffsetDateTime>, i64);

fn record_from_row(row: RateLimitRow) -> RateLimitRecord {
    let (id, post_id, daily_count, last_reset_date, is_blocked, blocked_until, version) = row;
    RateLimitRecord {
        id,
        post_id,
        daily_count,
        last_reset_date,
        is_blocked,
        blocked_until,
        version,
    }
}

#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: Comment) -> AppResult<Comment> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_name, author_email, content, created_at)
			 VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(comment.id)
        .bind(&comment.post_id)
        .bind(&comment.author_name)
        .bind(&comment.author_email)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, author_name, author_email, content, created_at
			 FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(comment_from_row))
    }

    async fn list_by_post(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, author_name, author_email, content, created_at
			 FROM comments WHERE post_id = $1 ORDER BY created_at ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(comment_from_row).collect())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}

#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRecordStore for PgRateLimitStore {
    async fn get(&self, post_id: &str) -> AppResult<Option<RateLimitRecord>> {
        let row = sqlx::query_as::<_, RateLimitRow>(
            "SELECT id, post_id, daily_count, last_reset_date, is_blocked, blocked_until, version
			 FROM rate_limits WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(record_from_row))
    }

    async fn create_if_absent(&self, record: RateLimitRecord) -> AppResult<RateLimitRecord> {
        // Create-then-refetch: a losing racer falls through to the SELECT
        // and converges on the single surviving row.
        sqlx::query(
            "INSERT INTO rate_limits (id, post_id, daily_count, last_reset_date, is_blocked, blocked_until, version)
			 VALUES ($1, $2, $3, $4, $5, $6, $7)
			 ON CONFLICT (post_id) DO NOTHING",
        )
        .bind(record.id)
        .bind(&record.post_id)
        .bind(record.daily_count)
        .bind(record.last_reset_date)
        .bind(record.is_blocked)
        .bind(record.blocked_until)
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        self.get(&record.post_id)
            .await?
            .ok_or_else(|| AppError::Conflict("rate limit record vanished after create".to_string()))
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: RateLimitPatch,
    ) -> AppResult<RateLimitRecord> {
        let row = sqlx::query_as::<_, RateLimitRow>(
            "UPDATE rate_limits
			 SET daily_count = $3, last_reset_date = $4, is_blocked = $5, blocked_until = $6,
				 version = version + 1
			 WHERE id = $1 AND version = $2
			 RETURNING id, post_id, daily_count, last_reset_date, is_blocked, blocked_until, version",
        )
        .bind(id)
        .bind(expected_version)
        .bind(patch.daily_count)
        .bind(patch.last_reset_date)
        .bind(patch.is_blocked)
        .bind(patch.blocked_until)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row)
            .ok_or_else(|| AppError::Conflict("rate limit record version changed".to_string()))
    }
}
