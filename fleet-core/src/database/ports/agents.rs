use async_trait::async_trait;
use fleet_contracts::{Agent, AgentId, AgentStatus, RegisterAgentRequest};

use crate::error::Result;

/// Port for the authoritative `Agent` row (spec §3).
///
/// Written only by registration (create) and the Status Updater consumer
/// (status mutation); read by the Gateway and Sweeper.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn register(&self, request: RegisterAgentRequest) -> Result<Agent>;

    async fn find(&self, agent_id: &AgentId) -> Result<Option<Agent>>;

    /// Applies a status transition. Idempotent: setting the same status
    /// twice is a no-op success (spec §4.3, testable property 7).
    async fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<()>;

    async fn set_interval_seconds(&self, agent_id: &AgentId, interval_seconds: i64) -> Result<()>;

    async fn delete(&self, agent_id: &AgentId) -> Result<()>;

    /// All known agent ids, used by the Sweeper. Acceptable to query fresh
    /// on every tick when the fleet size is modest (see DESIGN.md).
    async fn list_ids(&self) -> Result<Vec<AgentId>>;
}
