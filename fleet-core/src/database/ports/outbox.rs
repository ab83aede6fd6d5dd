use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use fleet_contracts::{NewOutboxRecord, OutboxId, OutboxRecord};

use crate::error::Result;

/// Port for the durable outbox queue (spec §3, §4.2).
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Inserts every record in one transaction. Used by the Gateway and
    /// Sweeper so a batch of related events either all land or none do.
    async fn insert_batch(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>>;

    /// Atomically claims up to `limit` unlocked pending records for
    /// `machine_id` and returns them in `created_at` order (spec §4.2a.1-2).
    async fn acquire(&self, machine_id: &str, limit: i64) -> Result<Vec<OutboxRecord>>;

    /// Marks a record delivered: `state=DELIVERED`, `processed_at=now()`,
    /// lock cleared.
    async fn mark_delivered(&self, id: OutboxId) -> Result<()>;

    /// Increments `attempts`, records `last_error`, clears the lock, and
    /// flips to `DEAD` if bounded retries are enabled and the threshold is
    /// reached (spec §3 invariant d, §4.2a.3).
    async fn mark_failed(
        &self,
        id: OutboxId,
        error: &str,
        max_attempts_enabled: bool,
        max_attempts: i32,
    ) -> Result<()>;

    /// Clears `lock_id`/`locked_at` for the given records regardless of
    /// outcome (spec §4.2a.4, deferred cleanup on any exit path).
    async fn release_lock(&self, ids: &[OutboxId]) -> Result<()>;

    /// Unlocker loop (spec §4.2b): clears locks held past `max_lock_age`,
    /// regardless of owning machine. Returns the number of rows unlocked.
    async fn unlock_expired(&self, max_lock_age: ChronoDuration) -> Result<u64>;

    /// Cleaner loop (spec §4.2c): deletes rows older than `retention`
    /// regardless of state. Returns the number of rows deleted.
    async fn delete_older_than(&self, retention: ChronoDuration) -> Result<u64>;

    /// `(pending_count, oldest_pending_age_seconds)`, 0 age if none pending.
    async fn pending_stats(&self) -> Result<(i64, i64)>;
}
