use std::fmt;
use std::time::Duration;

use fleet_contracts::AgentId;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::debug;

use crate::error::Result;

/// Wraps a Redis connection manager for the liveness-key protocol (spec §3,
/// §4.1): key `heartbeat:{agent_id}`, value `{interval_seconds}`, TTL
/// `1.5 * interval_seconds`.
#[derive(Clone)]
pub struct LivenessCache {
    conn: ConnectionManager,
}

impl fmt::Debug for LivenessCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl LivenessCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| crate::error::FleetError::TransientIo(format!("redis client: {e}")))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(agent_id: &AgentId) -> String {
        format!("heartbeat:{agent_id}")
    }

    /// Look up the liveness key. Returns `Some(interval_seconds)` on a hit.
    ///
    /// Any Redis error is treated by the caller as equivalent to a miss per
    /// spec §4.1 failure semantics ("Cache unavailable ⇒ treat as miss");
    /// this method itself still surfaces the error so the gateway can log it.
    pub async fn get_interval(&mut self, agent_id: &AgentId) -> Result<Option<i64>> {
        let value: Option<i64> = self.conn.get(Self::key(agent_id)).await?;
        debug!(agent_id = %agent_id, hit = value.is_some(), "liveness cache lookup");
        Ok(value)
    }

    /// Write (or refresh) the liveness key with TTL `1.5 * interval_seconds`.
    pub async fn refresh(
        &mut self,
        agent_id: &AgentId,
        interval_seconds: i64,
        liveness_multiplier: f64,
    ) -> Result<()> {
        let ttl = liveness_ttl(interval_seconds, liveness_multiplier);
        self.conn
            .set_ex::<_, _, ()>(Self::key(agent_id), interval_seconds, ttl.as_secs())
            .await?;
        debug!(agent_id = %agent_id, ttl_secs = ttl.as_secs(), "liveness cache refreshed");
        Ok(())
    }

    /// Used by the Sweeper to check liveness without refreshing it.
    pub async fn exists(&mut self, agent_id: &AgentId) -> Result<bool> {
        let exists: bool = self.conn.exists(Self::key(agent_id)).await?;
        Ok(exists)
    }
}

/// `1.5x` (configurable) grace window over the declared heartbeat interval.
pub fn liveness_ttl(interval_seconds: i64, liveness_multiplier: f64) -> Duration {
    let secs = (interval_seconds.max(0) as f64) * liveness_multiplier;
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_applies_the_grace_multiplier() {
        assert_eq!(liveness_ttl(10, 1.5), Duration::from_secs_f64(15.0));
        assert_eq!(liveness_ttl(0, 1.5), Duration::from_secs(0));
    }
}
