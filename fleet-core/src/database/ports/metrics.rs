use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_contracts::AgentId;

use crate::error::Result;

/// Port for the time-series metrics sink (spec §4.3): one `(cpu, ram, disk)`
/// point per `(agent_id, timestamp)`, idempotent on that tuple.
#[async_trait]
pub trait MetricsSinkRepository: Send + Sync {
    async fn write_point(
        &self,
        agent_id: &AgentId,
        timestamp: DateTime<Utc>,
        cpu: f64,
        ram: f64,
        disk: f64,
    ) -> Result<()>;
}
