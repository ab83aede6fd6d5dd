use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use fleet_config::DispatcherConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::BrokerProducer;
use crate::database::ports::OutboxRepository;
use crate::error::Result;

/// The guarantee engine of the monitoring core (spec §4.2): three
/// cooperative loops sharing one `OutboxRepository`.
pub struct OutboxDispatcher<R, P>
where
    R: OutboxRepository + 'static,
    P: BrokerProducer + 'static,
{
    repository: Arc<R>,
    producer: Arc<P>,
    config: DispatcherConfig,
}

impl<R, P> OutboxDispatcher<R, P>
where
    R: OutboxRepository + 'static,
    P: BrokerProducer + 'static,
{
    pub fn new(repository: Arc<R>, producer: Arc<P>, config: DispatcherConfig) -> Self {
        Self {
            repository,
            producer,
            config,
        }
    }

    /// Spawns the processor, unlocker, and cleaner loops. Each stops at its
    /// next tick after `shutdown` is cancelled (spec §5 step 2).
    pub fn spawn_all(self: Arc<Self>, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        let processor = {
            let this = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.config.process_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(err) = this.process_once().await {
                                error!(error = %err, "outbox processor loop iteration failed");
                            }
                        }
                        _ = shutdown.cancelled() => {
                            info!("outbox processor loop stopping");
                            break;
                        }
                    }
                }
            })
        };

        let unlocker = {
            let this = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.config.lock_check_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(err) = this.unlock_once().await {
                                error!(error = %err, "outbox unlocker loop iteration failed");
                            }
                        }
                        _ = shutdown.cancelled() => {
                            info!("outbox unlocker loop stopping");
                            break;
                        }
                    }
                }
            })
        };

        let cleaner = {
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.config.cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(err) = this.clean_once().await {
                                error!(error = %err, "outbox cleaner loop iteration failed");
                            }
                        }
                        _ = shutdown.cancelled() => {
                            info!("outbox cleaner loop stopping");
                            break;
                        }
                    }
                }
            })
        };

        vec![processor, unlocker, cleaner]
    }

    /// One processor tick (spec §4.2a). Acquires a batch, publishes each in
    /// `created_at` order, and breaks on the first failure so a stuck
    /// record cannot be overtaken within this instance.
    async fn process_once(&self) -> Result<()> {
        let claimed = self
            .repository
            .acquire(&self.config.machine_id, self.config.batch_size)
            .await?;

        if claimed.is_empty() {
            return Ok(());
        }
        debug!(count = claimed.len(), "acquired outbox batch");

        let claimed_ids: Vec<_> = claimed.iter().map(|r| r.id).collect();
        let result = self.publish_in_order(&claimed).await;

        // Deferred cleanup on any exit path: whatever wasn't individually
        // resolved by publish_in_order still gets its lock released here.
        if let Err(err) = &result {
            warn!(error = %err, "processor iteration aborted, releasing remaining locks");
        }
        self.repository.release_lock(&claimed_ids).await?;

        result
    }

    async fn publish_in_order(&self, claimed: &[fleet_contracts::OutboxRecord]) -> Result<()> {
        for (attempt, record) in claimed.iter().enumerate() {
            let backoff = exponential_backoff(record.attempts);
            if record.attempts > 0 {
                tokio::time::sleep(backoff).await;
            }

            match self
                .producer
                .publish(&record.topic, &record.partition_key, &record.payload, &record.headers)
                .await
            {
                Ok(()) => {
                    self.repository.mark_delivered(record.id).await?;
                }
                Err(err) => {
                    warn!(
                        outbox_id = %record.id,
                        error = %err,
                        attempt,
                        "publish failed, marking failed and aborting batch"
                    );
                    self.repository
                        .mark_failed(
                            record.id,
                            &err.to_string(),
                            self.config.max_attempts_enabled,
                            self.config.max_attempts as i32,
                        )
                        .await?;
                    // Break on first failure (spec §4.2a.3): do not contend
                    // with other records while the broker is unhealthy.
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn unlock_once(&self) -> Result<()> {
        let max_lock_age = ChronoDuration::from_std(self.config.max_lock_age)
            .unwrap_or_else(|_| ChronoDuration::seconds(300));
        let unlocked = self.repository.unlock_expired(max_lock_age).await?;
        if unlocked > 0 {
            info!(unlocked, "reclaimed expired outbox locks");
        }
        Ok(())
    }

    async fn clean_once(&self) -> Result<()> {
        let retention = ChronoDuration::from_std(self.config.retention)
            .unwrap_or_else(|_| ChronoDuration::days(7));
        let deleted = self.repository.delete_older_than(retention).await?;
        if deleted > 0 {
            info!(deleted, "purged retained outbox records");
        }

        let (pending_count, oldest_pending_age_seconds) = self.repository.pending_stats().await?;
        debug!(pending_count, oldest_pending_age_seconds, "outbox queue depth gauge");

        Ok(())
    }
}

/// `2^attempts` seconds capped at 5 minutes, applied before retrying a
/// record that has already failed at least once.
fn exponential_backoff(attempts: i32) -> StdDuration {
    let capped_exp = attempts.clamp(0, 8) as u32;
    let seconds = 2u64.saturating_pow(capped_exp).min(300);
    StdDuration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use fleet_config::DispatcherConfig;
    use fleet_contracts::{NewOutboxRecord, OutboxId, OutboxRecord, OutboxState};
    use uuid::Uuid;

    use super::*;
    use crate::error::FleetError;

    #[test]
    fn backoff_grows_exponentially_and_caps_at_five_minutes() {
        assert_eq!(exponential_backoff(0), StdDuration::from_secs(1));
        assert_eq!(exponential_backoff(1), StdDuration::from_secs(2));
        assert_eq!(exponential_backoff(4), StdDuration::from_secs(16));
        assert_eq!(exponential_backoff(20), StdDuration::from_secs(300));
    }

    fn record(id: Uuid, attempts: i32) -> OutboxRecord {
        OutboxRecord {
            id: OutboxId(id),
            topic: "monitoring".to_string(),
            partition_key: "agent-1".to_string(),
            payload: b"{}".to_vec(),
            headers: Vec::new(),
            state: OutboxState::Pending,
            created_at: chrono::Utc::now(),
            lock_id: Some("machine-a".to_string()),
            locked_at: Some(chrono::Utc::now()),
            processed_at: None,
            attempts,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Hand-written test double, not a `mockall` mock: the teacher declares
    /// `mockall` as a dependency but never calls it anywhere in its own
    /// source, so there is no idiom here to imitate.
    #[derive(Default)]
    struct StubOutbox {
        acquire_batch: StdMutex<Vec<OutboxRecord>>,
        delivered: StdMutex<Vec<OutboxId>>,
        failed: StdMutex<Vec<OutboxId>>,
        released: StdMutex<Vec<OutboxId>>,
    }

    #[async_trait]
    impl OutboxRepository for StubOutbox {
        async fn insert_batch(&self, _records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>> {
            Ok(Vec::new())
        }

        async fn acquire(&self, _machine_id: &str, _limit: i64) -> Result<Vec<OutboxRecord>> {
            Ok(std::mem::take(&mut self.acquire_batch.lock().unwrap()))
        }

        async fn mark_delivered(&self, id: OutboxId) -> Result<()> {
            self.delivered.lock().unwrap().push(id);
            Ok(())
        }

        async fn mark_failed(&self, id: OutboxId, _error: &str, _enabled: bool, _max: i32) -> Result<()> {
            self.failed.lock().unwrap().push(id);
            Ok(())
        }

        async fn release_lock(&self, ids: &[OutboxId]) -> Result<()> {
            self.released.lock().unwrap().extend_from_slice(ids);
            Ok(())
        }

        async fn unlock_expired(&self, _max_lock_age: ChronoDuration) -> Result<u64> {
            Ok(0)
        }

        async fn delete_older_than(&self, _retention: ChronoDuration) -> Result<u64> {
            Ok(0)
        }

        async fn pending_stats(&self) -> Result<(i64, i64)> {
            Ok((0, 0))
        }
    }

    #[derive(Default)]
    struct StubProducer {
        fail_topics: StdMutex<Vec<String>>,
        published: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BrokerProducer for StubProducer {
        async fn publish(&self, topic: &str, partition_key: &str, _payload: &[u8], _headers: &[(String, String)]) -> Result<()> {
            if self.fail_topics.lock().unwrap().iter().any(|t| t == topic) {
                return Err(FleetError::TransientIo("broker unavailable".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), partition_key.to_string()));
            Ok(())
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            process_interval: StdDuration::from_secs(1),
            lock_check_interval: StdDuration::from_secs(1),
            cleanup_interval: StdDuration::from_secs(1),
            max_lock_age: StdDuration::from_secs(300),
            retention: StdDuration::from_secs(604_800),
            max_attempts_enabled: true,
            max_attempts: 5,
            machine_id: "test-machine".to_string(),
            batch_size: 10,
        }
    }

    #[tokio::test]
    async fn publish_in_order_marks_every_record_delivered_on_success() {
        let outbox = Arc::new(StubOutbox::default());
        let producer = Arc::new(StubProducer::default());
        let dispatcher = OutboxDispatcher::new(Arc::clone(&outbox), Arc::clone(&producer), test_config());

        let records = vec![record(Uuid::new_v4(), 0), record(Uuid::new_v4(), 0)];
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();

        dispatcher.publish_in_order(&records).await.unwrap();

        let delivered = outbox.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(ids.iter().all(|id| delivered.contains(id)));
        assert!(outbox.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_in_order_breaks_on_first_failure_and_leaves_later_records_untouched() {
        let outbox = Arc::new(StubOutbox::default());
        let producer = Arc::new(StubProducer::default());
        producer.fail_topics.lock().unwrap().push("monitoring".to_string());
        let dispatcher = OutboxDispatcher::new(Arc::clone(&outbox), Arc::clone(&producer), test_config());

        let first = record(Uuid::new_v4(), 0);
        let second = record(Uuid::new_v4(), 0);
        let result = dispatcher.publish_in_order(&[first.clone(), second]).await;

        assert!(result.is_err());
        assert_eq!(outbox.failed.lock().unwrap().as_slice(), &[first.id]);
        assert!(outbox.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn process_once_releases_locks_even_when_a_publish_fails() {
        let outbox = Arc::new(StubOutbox::default());
        let producer = Arc::new(StubProducer::default());
        producer.fail_topics.lock().unwrap().push("monitoring".to_string());

        let pending = record(Uuid::new_v4(), 0);
        outbox.acquire_batch.lock().unwrap().push(pending.clone());

        let dispatcher = OutboxDispatcher::new(Arc::clone(&outbox), Arc::clone(&producer), test_config());
        let result = dispatcher.process_once().await;

        assert!(result.is_err());
        assert_eq!(outbox.released.lock().unwrap().as_slice(), &[pending.id]);
    }

    #[tokio::test]
    async fn process_once_is_a_noop_when_nothing_is_claimed() {
        let outbox = Arc::new(StubOutbox::default());
        let producer = Arc::new(StubProducer::default());
        let dispatcher = OutboxDispatcher::new(Arc::clone(&outbox), Arc::clone(&producer), test_config());

        dispatcher.process_once().await.unwrap();

        assert!(outbox.released.lock().unwrap().is_empty());
    }
}
