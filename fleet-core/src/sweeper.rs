use std::sync::Arc;

use fleet_contracts::AgentStatus;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::LivenessCache;
use crate::database::ports::{AgentRepository, OutboxRepository};
use crate::error::Result;
use crate::outbox::store::{new_status_change_message, status_change_record};

/// Stale-Agent Sweeper (spec §4.5): cron-triggered, idempotent pass over
/// every known agent id emitting a synthetic OFF transition through the
/// outbox for agents whose liveness key has expired. Never writes `Agent`
/// status directly; the Status Updater and Uptime Log writer do that.
pub struct StaleAgentSweeper<A, O>
where
    A: AgentRepository + 'static,
    O: OutboxRepository + 'static,
{
    agents: Arc<A>,
    outbox: Arc<O>,
    cache: Arc<tokio::sync::Mutex<LivenessCache>>,
}

impl<A, O> StaleAgentSweeper<A, O>
where
    A: AgentRepository + 'static,
    O: OutboxRepository + 'static,
{
    pub fn new(agents: Arc<A>, outbox: Arc<O>, cache: Arc<tokio::sync::Mutex<LivenessCache>>) -> Self {
        Self { agents, outbox, cache }
    }

    /// Runs one sweep: for every known agent id, emit an OFF transition if
    /// the liveness key is absent and the row is still ON (spec §4.5 1-2).
    pub async fn sweep_once(&self) -> Result<()> {
        let agent_ids = self.agents.list_ids().await?;
        for agent_id in agent_ids {
            let present = {
                let mut cache = self.cache.lock().await;
                match cache.exists(&agent_id).await {
                    Ok(present) => present,
                    Err(err) => {
                        warn!(error = %err, agent_id = %agent_id, "liveness lookup failed during sweep, skipping agent");
                        continue;
                    }
                }
            };
            if present {
                continue;
            }

            let agent = match self.agents.find(&agent_id).await {
                Ok(Some(agent)) => agent,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, agent_id = %agent_id, "failed to load agent during sweep");
                    continue;
                }
            };

            if agent.status != AgentStatus::On {
                debug!(agent_id = %agent_id, "agent already off, sweep is a no-op");
                continue;
            }

            let message = new_status_change_message(
                agent_id.clone(),
                AgentStatus::On,
                AgentStatus::Off,
                chrono::Utc::now(),
                agent.interval_seconds,
            );
            let record = status_change_record(&message)?;
            if let Err(err) = self.outbox.insert_batch(vec![record]).await {
                warn!(error = %err, agent_id = %agent_id, "failed to emit stale-agent status change");
                continue;
            }
            info!(agent_id = %agent_id, "stale agent swept, OFF transition emitted");
        }
        Ok(())
    }

    /// Schedules [`sweep_once`] on `cron_expression` and runs until
    /// `shutdown` is cancelled (spec §5 step 2: background loops stop at
    /// their next tick boundary).
    pub async fn spawn(self: Arc<Self>, cron_expression: &str, shutdown: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new()
            .await
            .map_err(|e| crate::error::FleetError::Fatal(format!("failed to start cron scheduler: {e}")))?;

        let sweeper = Arc::clone(&self);
        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let sweeper = Arc::clone(&sweeper);
            Box::pin(async move {
                if let Err(err) = sweeper.sweep_once().await {
                    error!(error = %err, "sweep iteration failed");
                }
            })
        })
        .map_err(|e| crate::error::FleetError::Fatal(format!("invalid sweeper cron expression: {e}")))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| crate::error::FleetError::Fatal(format!("failed to register sweeper job: {e}")))?;
        scheduler
            .start()
            .await
            .map_err(|e| crate::error::FleetError::Fatal(format!("failed to start sweeper scheduler: {e}")))?;

        shutdown.cancelled().await;
        info!("sweeper scheduler stopping");
        if let Err(err) = scheduler.shutdown().await {
            warn!(error = %err, "sweeper scheduler shutdown reported an error");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use fleet_contracts::{Agent, AgentId, NewOutboxRecord, OutboxId, OutboxRecord, RegisterAgentRequest};

    use super::*;
    use crate::database::ports::{AgentRepository, OutboxRepository};

    fn agent(id: &str, status: AgentStatus) -> Agent {
        Agent {
            agent_id: AgentId::from(id),
            server_name: "host".to_string(),
            description: None,
            ipv4: None,
            os: None,
            location: None,
            status,
            interval_seconds: 30,
            created_at: chrono::Utc::now(),
        }
    }

    #[derive(Default)]
    struct StubAgents {
        agents: StdMutex<Vec<Agent>>,
    }

    #[async_trait]
    impl AgentRepository for StubAgents {
        async fn register(&self, _request: RegisterAgentRequest) -> Result<Agent> {
            unimplemented!("not exercised by sweeper tests")
        }

        async fn find(&self, agent_id: &AgentId) -> Result<Option<Agent>> {
            Ok(self.agents.lock().unwrap().iter().find(|a| &a.agent_id == agent_id).cloned())
        }

        async fn set_status(&self, _agent_id: &AgentId, _status: AgentStatus) -> Result<()> {
            unimplemented!("the sweeper emits events, it never writes status directly")
        }

        async fn set_interval_seconds(&self, _agent_id: &AgentId, _interval_seconds: i64) -> Result<()> {
            unimplemented!("not exercised by sweeper tests")
        }

        async fn delete(&self, _agent_id: &AgentId) -> Result<()> {
            unimplemented!("not exercised by sweeper tests")
        }

        async fn list_ids(&self) -> Result<Vec<AgentId>> {
            Ok(self.agents.lock().unwrap().iter().map(|a| a.agent_id.clone()).collect())
        }
    }

    #[derive(Default)]
    struct StubOutbox {
        inserted: StdMutex<Vec<NewOutboxRecord>>,
    }

    #[async_trait]
    impl OutboxRepository for StubOutbox {
        async fn insert_batch(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>> {
            self.inserted.lock().unwrap().extend(records);
            Ok(Vec::new())
        }

        async fn acquire(&self, _machine_id: &str, _limit: i64) -> Result<Vec<OutboxRecord>> {
            Ok(Vec::new())
        }

        async fn mark_delivered(&self, _id: OutboxId) -> Result<()> {
            Ok(())
        }

        async fn mark_failed(&self, _id: OutboxId, _error: &str, _enabled: bool, _max: i32) -> Result<()> {
            Ok(())
        }

        async fn release_lock(&self, _ids: &[OutboxId]) -> Result<()> {
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

    /// `sweep_once`'s liveness-cache step needs a real Redis connection (the
    /// cache has no port/trait seam, unlike the repositories); gated behind
    /// `REDIS_URL` the way the teacher gates its docker-backed tests behind
    /// `#[ignore]`.
    #[tokio::test]
    #[ignore]
    async fn sweep_emits_off_transition_for_agent_with_expired_liveness_key() {
        let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");

        let agents = Arc::new(StubAgents::default());
        agents.agents.lock().unwrap().push(agent("stale-1", AgentStatus::On));

        let outbox = Arc::new(StubOutbox::default());
        let cache = Arc::new(tokio::sync::Mutex::new(
            LivenessCache::connect(&redis_url).await.expect("connect to redis"),
        ));

        let sweeper = StaleAgentSweeper::new(Arc::clone(&agents), Arc::clone(&outbox), cache);
        sweeper.sweep_once().await.expect("sweep succeeds");

        let inserted = outbox.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].topic, fleet_contracts::messages::topics::STATUS_CHANGE);
        assert_eq!(inserted[0].partition_key, "stale-1");
    }
}
