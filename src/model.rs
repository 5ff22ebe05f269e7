use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

/// Maximum accepted submissions per post per calendar day before the gate
/// transitions to BLOCKED.
pub const DAILY_COMMENT_LIMIT: i64 = 100;

/// Advisory block duration stored on the record when the threshold is
/// crossed. The gate reopens on the day boundary, not when this elapses.
pub const BLOCK_DURATION: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: String,
    pub author_name: String,
    pub author_email: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Submission payload as received from the UI. Fields are validated
/// (trimmed, non-blank) before any store access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub name: String,
    pub email: String,
    pub content: String,
}

/// One row per post_id tracking the daily submission counter. `version` is
/// the concurrency token for conditional updates; it never crosses the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitRecord {
    pub id: Uuid,
    pub post_id: String,
    pub daily_count: i64,
    pub last_reset_date: Date,
    pub is_blocked: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub blocked_until: Option<OffsetDateTime>,
    #[serde(skip)]
    pub version: i64,
}

impl RateLimitRecord {
    pub fn fresh(post_id: &str, today: Date) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id: post_id.to_string(),
            daily_count: 0,
            last_reset_date: today,
            is_blocked: false,
            blocked_until: None,
            version: 1,
        }
    }
}

/// The (name, email) pair used as non-cryptographic proof of comment
/// ownership for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Admin,
    Identity(Identity),
}

/// Result of evaluating a record against the current time.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Open,
    Blocked { until: Option<OffsetDateTime> },
}
