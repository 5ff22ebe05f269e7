use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::model::{GateState, RateLimitRecord, BLOCK_DURATION};
use crate::store::{RateLimitPatch, RateLimitRecordStore};

/// Upper bound on internal re-fetch/retry rounds when a conditional update
/// collides with another writer. Exhaustion surfaces as Conflict.
const MAX_CONFLICT_RETRIES: usize = 8;

/// Computes the blocked/open state of a post's comment gate, performs the
/// day-rollover reset, and takes submission slots via a version-guarded
/// conditional update so concurrent submitters never lose increments.
#[derive(Clone)]
pub struct RateLimitTracker {
    store: Arc<dyn RateLimitRecordStore>,
    limit: i64,
}

impl RateLimitTracker {
    pub fn new(store: Arc<dyn RateLimitRecordStore>, limit: i64) -> Self {
        Self { store, limit }
    }

    /// Fetches the record for a post, lazily creating a fresh one on first
    /// access. Creation races converge on the single stored record.
    pub async fn get_or_create(&self, post_id: &str, now: OffsetDateTime) -> AppResult<RateLimitRecord> {
        if let Some(record) = self.store.get(post_id).await? {
            return Ok(record);
        }
        self.store
            .create_if_absent(RateLimitRecord::fresh(post_id, now.date()))
            .await
    }

    /// A record from a previous calendar day is stale and counts as OPEN
    /// regardless of is_blocked or blocked_until; only the date change
    /// lifts a block.
    pub fn evaluate(&self, record: &RateLimitRecord, now: OffsetDateTime) -> GateState {
        if record.last_reset_date != now.date() {
            return GateState::Open;
        }
        if record.daily_count >= self.limit {
            return GateState::Blocked {
                until: record.blocked_until,
            };
        }
        GateState::Open
    }

    /// Rolls the record over to today's window. Idempotent within a day: a
    /// record that is already fresh for today is returned unchanged.
    pub async fn reset(&self, record: &RateLimitRecord, now: OffsetDateTime) -> AppResult<RateLimitRecord> {
        let today = now.date();
        if record.last_reset_date == today && record.daily_count == 0 && !record.is_blocked {
            return Ok(record.clone());
        }
        self.store
            .conditional_update(
                record.id,
                record.version,
                RateLimitPatch {
                    daily_count: 0,
                    last_reset_date: today,
                    is_blocked: false,
                    blocked_until: None,
                },
            )
            .await
    }

    /// Takes one submission slot: get-or-create, reset if stale, evaluate,
    /// then a single conditional increment. The slot is owned once the
    /// update lands, so two racing submitters can never both pass at one
    /// below the threshold. Conflicts re-fetch and retry internally.
    pub async fn acquire(&self, post_id: &str, now: OffsetDateTime) -> AppResult<RateLimitRecord> {
        let mut attempts = 0;
        loop {
            let mut record = self.get_or_create(post_id, now).await?;

            if record.last_reset_date != now.date() {
                match self.reset(&record, now).await {
                    Ok(fresh) => record = fresh,
                    Err(AppError::Conflict(_)) => {
                        attempts += 1;
                        if attempts >= MAX_CONFLICT_RETRIES {
                            return Err(AppError::Conflict("rate limit reset contention".to_string()));
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if record.daily_count >= self.limit {
                return Err(AppError::RateLimited {
                    blocked_until: record.blocked_until,
                });
            }

            let next = record.daily_count + 1;
            let crossing = next >= self.limit;
            let patch = RateLimitPatch {
                daily_count: next,
                last_reset_date: record.last_reset_date,
                is_blocked: crossing,
                blocked_until: if crossing {
                    Some(now + BLOCK_DURATION)
                } else {
                    record.blocked_until
                },
            };
            match self.store.conditional_update(record.id, record.version, patch).await {
                Ok(updated) => {
                    if updated.is_blocked {
                        debug!(post_id, daily_count = updated.daily_count, "comment gate blocked");
                    }
                    return Ok(updated);
                }
                Err(AppError::Conflict(_)) => {
                    attempts += 1;
                    if attempts >= MAX_CONFLICT_RETRIES {
                        return Err(AppError::Conflict("rate limit counter contention".to_string()));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Compensating decrement for a slot whose comment insert failed, so a
    /// surfaced store error leaves the counter where it started. Guarded to
    /// the same day; if the window rolled over meanwhile the count was
    /// reset anyway. Best effort: contention beyond the retry budget is
    /// logged, not surfaced.
    pub async fn release(&self, post_id: &str, now: OffsetDateTime) {
        for _ in 0..MAX_CONFLICT_RETRIES {
            let record = match self.store.get(post_id).await {
                Ok(Some(r)) => r,
                Ok(None) => return,
                Err(e) => {
                    warn!(post_id, error = %e, "failed to release rate limit slot");
                    return;
                }
            };
            if record.last_reset_date != now.date() || record.daily_count == 0 {
                return;
            }
            let next = record.daily_count - 1;
            let patch = RateLimitPatch {
                daily_count: next,
                last_reset_date: record.last_reset_date,
                is_blocked: next >= self.limit,
                blocked_until: if next >= self.limit { record.blocked_until } else { None },
            };
            match self.store.conditional_update(record.id, record.version, patch).await {
                Ok(_) => return,
                Err(AppError::Conflict(_)) => continue,
                Err(e) => {
                    warn!(post_id, error = %e, "failed to release rate limit slot");
                    return;
                }
            }
        }
        warn!(post_id, "gave up releasing rate limit slot under contention");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemRateLimitStore;
    use crate::model::DAILY_COMMENT_LIMIT;
    use time::macros::datetime;

    fn tracker(store: MemRateLimitStore) -> RateLimitTracker {
        RateLimitTracker::new(Arc::new(store), DAILY_COMMENT_LIMIT)
    }

    /// Seeds a record at a given count and window date.
    async fn seed(t: &RateLimitTracker, post_id: &str, count: i64, when: OffsetDateTime) -> RateLimitRecord {
        let record = t.get_or_create(post_id, when).await.unwrap();
        t.store
            .conditional_update(
                record.id,
                record.version,
                RateLimitPatch {
                    daily_count: count,
                    last_reset_date: when.date(),
                    is_blocked: count >= DAILY_COMMENT_LIMIT,
                    blocked_until: if count >= DAILY_COMMENT_LIMIT {
                        Some(when + BLOCK_DURATION)
                    } else {
                        None
                    },
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_access_creates_fresh_record() {
        let t = tracker(MemRateLimitStore::new());
        let now = datetime!(2026-08-29 12:00 UTC);
        let record = t.get_or_create("post-1", now).await.unwrap();
        assert_eq!(record.daily_count, 0);
        assert_eq!(record.last_reset_date, now.date());
        assert!(!record.is_blocked);
        assert_eq!(record.blocked_until, None);

        // Second access returns the same record, not a duplicate.
        let again = t.get_or_create("post-1", now).await.unwrap();
        assert_eq!(again.id, record.id);
    }

    #[tokio::test]
    async fn evaluate_open_below_threshold_blocked_at_threshold() {
        let t = tracker(MemRateLimitStore::new());
        let now = datetime!(2026-08-29 12:00 UTC);
        let r99 = seed(&t, "p", 99, now).await;
        assert_eq!(t.evaluate(&r99, now), GateState::Open);

        let t2 = tracker(MemRateLimitStore::new());
        let r100 = seed(&t2, "p", 100, now).await;
        assert_eq!(
            t2.evaluate(&r100, now),
            GateState::Blocked {
                until: r100.blocked_until
            }
        );
    }

    #[tokio::test]
    async fn stale_record_evaluates_open_despite_blocked_until() {
        let t = tracker(MemRateLimitStore::new());
        let yesterday = datetime!(2026-08-28 23:50 UTC);
        let record = seed(&t, "p", 100, yesterday).await;
        assert!(record.is_blocked);
        assert!(record.blocked_until.is_some());

        // Date advanced; blocked_until (still in the future) is irrelevant.
        let now = datetime!(2026-08-29 00:10 UTC);
        assert!(record.blocked_until.unwrap() > now);
        assert_eq!(t.evaluate(&record, now), GateState::Open);
    }

    #[tokio::test]
    async fn reset_is_idempotent_within_a_day() {
        let t = tracker(MemRateLimitStore::new());
        let yesterday = datetime!(2026-08-28 12:00 UTC);
        let record = seed(&t, "p", 42, yesterday).await;

        let now = datetime!(2026-08-29 09:00 UTC);
        let once = t.reset(&record, now).await.unwrap();
        assert_eq!(once.daily_count, 0);
        assert_eq!(once.last_reset_date, now.date());
        assert!(!once.is_blocked);
        assert_eq!(once.blocked_until, None);

        let twice = t.reset(&once, now).await.unwrap();
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn hundredth_acquire_blocks_ninety_ninth_does_not() {
        let t = tracker(MemRateLimitStore::new());
        let now = datetime!(2026-08-29 12:00 UTC);
        seed(&t, "p", 98, now).await;

        let r99 = t.acquire("p", now).await.unwrap();
        assert_eq!(r99.daily_count, 99);
        assert!(!r99.is_blocked);

        let r100 = t.acquire("p", now).await.unwrap();
        assert_eq!(r100.daily_count, 100);
        assert!(r100.is_blocked);
        assert_eq!(r100.blocked_until, Some(now + BLOCK_DURATION));

        // Immediate next acquire is rejected without mutating the counter.
        match t.acquire("p", now).await {
            Err(AppError::RateLimited { blocked_until }) => {
                assert_eq!(blocked_until, Some(now + BLOCK_DURATION));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        let after = t.store.get("p").await.unwrap().unwrap();
        assert_eq!(after.daily_count, 100);
    }

    #[tokio::test]
    async fn rollover_resets_count_before_first_acquire_of_the_day() {
        let t = tracker(MemRateLimitStore::new());
        let yesterday = datetime!(2026-08-28 22:00 UTC);
        seed(&t, "p", 100, yesterday).await;

        let now = datetime!(2026-08-29 08:00 UTC);
        let record = t.acquire("p", now).await.unwrap();
        assert_eq!(record.daily_count, 1);
        assert!(!record.is_blocked);
        assert_eq!(record.blocked_until, None);
        assert_eq!(record.last_reset_date, now.date());
    }

    #[tokio::test]
    async fn release_undoes_a_taken_slot_same_day_only() {
        let t = tracker(MemRateLimitStore::new());
        let now = datetime!(2026-08-29 12:00 UTC);
        t.acquire("p", now).await.unwrap();
        t.acquire("p", now).await.unwrap();
        t.release("p", now).await;
        let record = t.store.get("p").await.unwrap().unwrap();
        assert_eq!(record.daily_count, 1);

        // After a rollover the release is a no-op.
        let tomorrow = datetime!(2026-08-30 12:00 UTC);
        t.release("p", tomorrow).await;
        let record = t.store.get("p").await.unwrap().unwrap();
        assert_eq!(record.daily_count, 1);
    }

    #[tokio::test]
    async fn release_at_threshold_reopens_the_gate() {
        let t = tracker(MemRateLimitStore::new());
        let now = datetime!(2026-08-29 12:00 UTC);
        seed(&t, "p", 99, now).await;
        let blocked = t.acquire("p", now).await.unwrap();
        assert!(blocked.is_blocked);

        t.release("p", now).await;
        let record = t.store.get("p").await.unwrap().unwrap();
        assert_eq!(record.daily_count, 99);
        assert!(!record.is_blocked);
        assert_eq!(record.blocked_until, None);
    }
}
