use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_contracts::{AgentId, AgentStatus};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::LivenessCache;
use crate::database::ports::{AgentRepository, OutboxRepository};
use crate::error::{FleetError, Result};
use crate::outbox::store::{monitoring_record, new_monitoring_message, new_status_change_message, status_change_record};

/// Validated input to [`HeartbeatGateway::ingest_metrics`] (spec §4.1).
#[derive(Clone, Debug)]
pub struct IngestMetricsInput {
    pub agent_id: AgentId,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub timestamp: DateTime<Utc>,
}

impl IngestMetricsInput {
    fn validate(&self) -> Result<()> {
        if self.agent_id.as_str().trim().is_empty() {
            return Err(FleetError::Validation("agent_id must not be empty".to_string()));
        }
        if self.cpu < 0.0 || self.ram < 0.0 || self.disk < 0.0 {
            return Err(FleetError::Validation(
                "cpu, ram, and disk must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Liveness-key TTL plus status-change emission (spec §4.1).
///
/// The cache connection is wrapped in a mutex because
/// [`redis::aio::ConnectionManager`] requires `&mut self` for commands but
/// the gateway is shared across request handlers behind an `Arc`.
pub struct HeartbeatGateway<A, O>
where
    A: AgentRepository + 'static,
    O: OutboxRepository + 'static,
{
    agents: Arc<A>,
    outbox: Arc<O>,
    cache: Mutex<LivenessCache>,
    liveness_multiplier: f64,
}

impl<A, O> HeartbeatGateway<A, O>
where
    A: AgentRepository + 'static,
    O: OutboxRepository + 'static,
{
    pub fn new(agents: Arc<A>, outbox: Arc<O>, cache: LivenessCache, liveness_multiplier: f64) -> Self {
        Self {
            agents,
            outbox,
            cache: Mutex::new(cache),
            liveness_multiplier,
        }
    }

    pub async fn ingest_metrics(&self, input: IngestMetricsInput) -> Result<()> {
        input.validate()?;

        let cached_interval = {
            let mut cache = self.cache.lock().await;
            match cache.get_interval(&input.agent_id).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, agent_id = %input.agent_id, "liveness cache unavailable, treating as miss");
                    None
                }
            }
        };

        match cached_interval {
            Some(interval_seconds) => self.handle_hit(&input, interval_seconds).await,
            None => self.handle_miss(&input).await,
        }
    }

    /// Hit path (spec §4.1 step 2): refresh TTL, emit `monitoring` only.
    async fn handle_hit(&self, input: &IngestMetricsInput, interval_seconds: i64) -> Result<()> {
        {
            let mut cache = self.cache.lock().await;
            if let Err(err) = cache
                .refresh(&input.agent_id, interval_seconds, self.liveness_multiplier)
                .await
            {
                warn!(error = %err, agent_id = %input.agent_id, "failed to refresh liveness ttl");
            }
        }

        let message = new_monitoring_message(
            input.agent_id.clone(),
            AgentStatus::On,
            AgentStatus::On,
            input.timestamp,
            input.cpu,
            input.ram,
            input.disk,
        );
        let record = monitoring_record(&message)?;
        self.outbox.insert_batch(vec![record]).await?;
        debug!(agent_id = %input.agent_id, "heartbeat hit, monitoring event emitted");
        Ok(())
    }

    /// Miss path (spec §4.1 step 3): load the authoritative row, write the
    /// liveness key, and emit both events in one outbox transaction.
    async fn handle_miss(&self, input: &IngestMetricsInput) -> Result<()> {
        let agent = self
            .agents
            .find(&input.agent_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("agent {} not found", input.agent_id)))?;

        {
            let mut cache = self.cache.lock().await;
            if let Err(err) = cache
                .refresh(&input.agent_id, agent.interval_seconds, self.liveness_multiplier)
                .await
            {
                warn!(error = %err, agent_id = %input.agent_id, "failed to write liveness key after miss");
            }
        }

        let old_status = agent.status;
        let status_change = new_status_change_message(
            input.agent_id.clone(),
            old_status,
            AgentStatus::On,
            input.timestamp,
            agent.interval_seconds,
        );
        let monitoring = new_monitoring_message(
            input.agent_id.clone(),
            old_status,
            AgentStatus::On,
            input.timestamp,
            input.cpu,
            input.ram,
            input.disk,
        );

        let records = vec![status_change_record(&status_change)?, monitoring_record(&monitoring)?];
        self.outbox.insert_batch(records).await?;
        debug!(agent_id = %input.agent_id, "heartbeat miss, status change and monitoring events emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_metrics() {
        let input = IngestMetricsInput {
            agent_id: AgentId::from("agent-1"),
            cpu: -1.0,
            ram: 10.0,
            disk: 10.0,
            timestamp: Utc::now(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn rejects_empty_agent_id() {
        let input = IngestMetricsInput {
            agent_id: AgentId::from(""),
            cpu: 1.0,
            ram: 1.0,
            disk: 1.0,
            timestamp: Utc::now(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn accepts_valid_input() {
        let input = IngestMetricsInput {
            agent_id: AgentId::from("agent-1"),
            cpu: 1.0,
            ram: 1.0,
            disk: 1.0,
            timestamp: Utc::now(),
        };
        assert!(input.validate().is_ok());
    }
}
