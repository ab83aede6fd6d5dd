use std::sync::Arc;

use async_trait::async_trait;
use fleet_contracts::MonitoringMessage;
use tracing::{debug, warn};

use super::handler::MessageHandler;
use crate::database::ports::AgentRepository;
use crate::error::Result;

/// `monitoring` topic handler: applies the carried status to the
/// authoritative Agent row. Idempotent — repeated application of the same
/// status is a no-op (spec §4.3).
pub struct StatusUpdater<A: AgentRepository + 'static> {
    agents: Arc<A>,
}

impl<A: AgentRepository + 'static> StatusUpdater<A> {
    pub fn new(agents: Arc<A>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl<A: AgentRepository + 'static> MessageHandler for StatusUpdater<A> {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        let message: MonitoringMessage = serde_json::from_slice(payload).map_err(|e| {
            crate::error::FleetError::Validation(format!("invalid monitoring message: {e}"))
        })?;

        match self.agents.set_status(&message.agent_id, message.new_status).await {
            Ok(()) => {
                debug!(agent_id = %message.agent_id, status = %message.new_status, "agent status updated");
                Ok(())
            }
            Err(crate::error::FleetError::NotFound(_)) => {
                warn!(agent_id = %message.agent_id, "status update for unknown agent, dropping");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
