use std::sync::Arc;

use async_trait::async_trait;
use fleet_contracts::MonitoringMessage;
use tracing::debug;

use super::handler::MessageHandler;
use crate::database::ports::MetricsSinkRepository;
use crate::error::Result;

/// `monitoring` topic handler, separate consumer group from the Status
/// Updater: writes a `(cpu, ram, disk)` point to the time-series sink,
/// idempotent by `(agent_id, timestamp)` (spec §4.3).
pub struct MetricsSink<M: MetricsSinkRepository + 'static> {
    sink: Arc<M>,
}

impl<M: MetricsSinkRepository + 'static> MetricsSink<M> {
    pub fn new(sink: Arc<M>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<M: MetricsSinkRepository + 'static> MessageHandler for MetricsSink<M> {
    async fn handle(&self, payload: &[u8]) -> Result<()> {
        let message: MonitoringMessage = serde_json::from_slice(payload).map_err(|e| {
            crate::error::FleetError::Validation(format!("invalid monitoring message: {e}"))
        })?;

        self.sink
            .write_point(
                &message.agent_id,
                message.timestamp,
                message.cpu,
                message.ram,
                message.disk,
            )
            .await?;
        debug!(agent_id = %message.agent_id, "metrics point written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::Utc;
    use fleet_contracts::AgentId;

    use super::*;
    use crate::database::ports::MetricsSinkRepository;

    #[derive(Default)]
    struct StubSink {
        points: StdMutex<Vec<(AgentId, f64, f64, f64)>>,
    }

    #[async_trait]
    impl MetricsSinkRepository for StubSink {
        async fn write_point(
            &self,
            agent_id: &AgentId,
            _timestamp: chrono::DateTime<Utc>,
            cpu: f64,
            ram: f64,
            disk: f64,
        ) -> Result<()> {
            self.points.lock().unwrap().push((agent_id.clone(), cpu, ram, disk));
            Ok(())
        }
    }

    #[tokio::test]
    async fn handle_writes_the_carried_point() {
        let sink = Arc::new(StubSink::default());
        let handler = MetricsSink::new(Arc::clone(&sink));

        let message = MonitoringMessage {
            agent_id: AgentId::from("agent-1"),
            old_status: fleet_contracts::AgentStatus::On,
            new_status: fleet_contracts::AgentStatus::On,
            timestamp: Utc::now(),
            cpu: 12.5,
            ram: 40.0,
            disk: 80.0,
        };
        let payload = serde_json::to_vec(&message).unwrap();

        handler.handle(&payload).await.unwrap();

        let points = sink.points.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0], (AgentId::from("agent-1"), 12.5, 40.0, 80.0));
    }

    #[tokio::test]
    async fn handle_rejects_malformed_payload() {
        let sink = Arc::new(StubSink::default());
        let handler = MetricsSink::new(sink);

        let err = handler.handle(b"not json").await.unwrap_err();
        assert!(matches!(err, crate::error::FleetError::Validation(_)));
    }
}
