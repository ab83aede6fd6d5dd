use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_contracts::{AgentId, UptimeLogEntry};

use crate::error::Result;

/// Port for the `server_uptime` search index (spec §6): document id
/// `{agent_id}-{RFC3339 timestamp}`, queried by `term` on agent id and
/// `range` on timestamp, sorted by timestamp.
///
/// We back this with a Postgres table rather than a dedicated search engine
/// (see DESIGN.md): the corpus has no Elasticsearch/OpenSearch client, and
/// the only access patterns this port needs — exact-id upsert, term+range
/// query sorted by timestamp — are native SQL operations. The deterministic
/// document id is still the primary key, so the idempotency contract is
/// identical to a real search-index upsert.
#[async_trait]
pub trait UptimeLogRepository: Send + Sync {
    /// Upserts by document id. Redelivery of an identical entry overwrites
    /// in place — idempotent (spec §4.3).
    async fn upsert(&self, entry: &UptimeLogEntry) -> Result<()>;

    /// Entries for `agent_id` with `start <= timestamp <= end`, ascending.
    async fn range(
        &self,
        agent_id: &AgentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UptimeLogEntry>>;

    /// The last entry strictly before `start`, if any (spec §4.4 step 2).
    async fn last_before(
        &self,
        agent_id: &AgentId,
        start: DateTime<Utc>,
    ) -> Result<Option<UptimeLogEntry>>;
}
