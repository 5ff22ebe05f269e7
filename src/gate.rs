use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Comment, NewComment};
use crate::ratelimit::RateLimitTracker;
use crate::store::CommentStore;

/// Rejects blank required fields before any store access.
pub fn validate(new: &NewComment) -> AppResult<()> {
    for (field, value) in [
        ("name", new.name.as_str()),
        ("email", new.email.as_str()),
        ("content", new.content.as_str()),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation { field });
        }
    }
    Ok(())
}

/// Decision function in front of the comment store: validation, then one
/// rate-limit slot, then the insert. Every rejection path leaves both the
/// counter and the comment list unchanged.
#[derive(Clone)]
pub struct SubmissionGate {
    comments: Arc<dyn CommentStore>,
    tracker: RateLimitTracker,
}

impl SubmissionGate {
    pub fn new(comments: Arc<dyn CommentStore>, tracker: RateLimitTracker) -> Self {
        Self { comments, tracker }
    }

    pub async fn submit(&self, post_id: &str, new: NewComment, now: OffsetDateTime) -> AppResult<Comment> {
        validate(&new)?;
        self.tracker.acquire(post_id, now).await?;

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: post_id.to_string(),
            author_name: new.name.trim().to_string(),
            author_email: new.email.trim().to_string(),
            content: new.content.trim().to_string(),
            created_at: now,
        };
        match self.comments.insert(comment).await {
            Ok(comment) => {
                info!(post_id, comment_id = %comment.id, "comment accepted");
                Ok(comment)
            }
            Err(e) => {
                // Give the slot back so the failed insert is not observable
                // in the counter.
                self.tracker.release(post_id, now).await;
                Err(e)
            }
        }
    }

    pub async fn list(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        self.comments.list_by_post(post_id).await
    }
}
