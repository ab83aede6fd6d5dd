use std::sync::Arc;

use async_trait::async_trait;
use fleet_contracts::{StatusChangeMessage, UptimeLogEntry};
use tracing::debug;

use super::handler::MessageHandler;
use crate::database::ports::UptimeLogRepository;
use crate::error::Result;

/// `status_change` topic handler: appends transitions to the search index,
/// dropping same-status messages to preserve the alternation invariant
/// (spec §4.3, §3).
pub struct UptimeLogWriter<U: UptimeLogRepository + 'static> {
    log: Arc<U>,
}

impl<U: UptimeLogRepository + 'static> UptimeLogWriter<U> {
    pub fn new(log: Arc<U>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl<U: UptimeLogRepository + 'static> MessageHandler for UptimeLogWriter<U> {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        let message: StatusChangeMessage = serde_json::from_slice(payload).map_err(|e| {
            crate::error::FleetError::Validation(format!("invalid status change message: {e}"))
        })?;

        if message.old_status == message.new_status {
            debug!(agent_id = %message.agent_id, "dropping no-op status change");
            return Ok(());
        }

        let entry = UptimeLogEntry {
            agent_id: message.agent_id.clone(),
            status: message.new_status,
            timestamp: message.timestamp,
        };
        self.log.upsert(&entry).await?;
        debug!(agent_id = %message.agent_id, document_id = %entry.document_id(), "uptime log entry written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::Utc;
    use fleet_contracts::AgentId;

    use super::*;
    use crate::database::ports::UptimeLogRepository;

    #[derive(Default)]
    struct StubLog {
        upserted: StdMutex<Vec<UptimeLogEntry>>,
    }

    #[async_trait]
    impl UptimeLogRepository for StubLog {
        async fn upsert(&self, entry: &UptimeLogEntry) -> Result<()> {
            self.upserted.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn range(
            &self,
            _agent_id: &AgentId,
            _start: chrono::DateTime<Utc>,
            _end: chrono::DateTime<Utc>,
        ) -> Result<Vec<UptimeLogEntry>> {
            unimplemented!()
        }

        async fn last_before(&self, _agent_id: &AgentId, _start: chrono::DateTime<Utc>) -> Result<Option<UptimeLogEntry>> {
            unimplemented!()
        }
    }

    fn message(old: fleet_contracts::AgentStatus, new: fleet_contracts::AgentStatus) -> StatusChangeMessage {
        StatusChangeMessage {
            agent_id: AgentId::from("agent-1"),
            old_status: old,
            new_status: new,
            timestamp: Utc::now(),
            interval: 30,
        }
    }

    #[tokio::test]
    async fn handle_writes_a_real_transition() {
        let log = Arc::new(StubLog::default());
        let handler = UptimeLogWriter::new(Arc::clone(&log));

        let payload =
            serde_json::to_vec(&message(fleet_contracts::AgentStatus::Off, fleet_contracts::AgentStatus::On)).unwrap();
        handler.handle(&payload).await.unwrap();

        assert_eq!(log.upserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handle_drops_a_same_status_message() {
        let log = Arc::new(StubLog::default());
        let handler = UptimeLogWriter::new(Arc::clone(&log));

        let payload =
            serde_json::to_vec(&message(fleet_contracts::AgentStatus::On, fleet_contracts::AgentStatus::On)).unwrap();
        handler.handle(&payload).await.unwrap();

        assert!(log.upserted.lock().unwrap().is_empty());
    }
}
