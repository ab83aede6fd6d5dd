use fleet_contracts::{
    messages::topics, AgentId, AgentStatus, MonitoringMessage, NewOutboxRecord, StatusChangeMessage,
};

use crate::error::{FleetError, Result};

/// Builds the `NewOutboxRecord` for a `monitoring` event, partitioned by
/// `agent_id` (spec §4.3 partitioning contract).
pub fn monitoring_record(message: &MonitoringMessage) -> Result<NewOutboxRecord> {
    let payload = serde_json::to_vec(message)
        .map_err(|e| FleetError::Validation(format!("failed to encode monitoring message: {e}")))?;
    Ok(NewOutboxRecord::new(
        topics::MONITORING,
        message.agent_id.as_str(),
        payload,
    ))
}

/// Builds the `NewOutboxRecord` for a `status_change` event.
pub fn status_change_record(message: &StatusChangeMessage) -> Result<NewOutboxRecord> {
    let payload = serde_json::to_vec(message).map_err(|e| {
        FleetError::Validation(format!("failed to encode status change message: {e}"))
    })?;
    Ok(NewOutboxRecord::new(
        topics::STATUS_CHANGE,
        message.agent_id.as_str(),
        payload,
    ))
}

pub fn new_monitoring_message(
    agent_id: AgentId,
    old_status: AgentStatus,
    new_status: AgentStatus,
    timestamp: chrono::DateTime<chrono::Utc>,
    cpu: f64,
    ram: f64,
    disk: f64,
) -> MonitoringMessage {
    MonitoringMessage {
        agent_id,
        old_status,
        new_status,
        timestamp,
        cpu,
        ram,
        disk,
    }
}

pub fn new_status_change_message(
    agent_id: AgentId,
    old_status: AgentStatus,
    new_status: AgentStatus,
    timestamp: chrono::DateTime<chrono::Utc>,
    interval: i64,
) -> StatusChangeMessage {
    StatusChangeMessage {
        agent_id,
        old_status,
        new_status,
        timestamp,
        interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_record_partitions_by_agent_id() {
        let message = new_monitoring_message(
            AgentId::from("agent-1"),
            AgentStatus::On,
            AgentStatus::On,
            chrono::Utc::now(),
            1.0,
            2.0,
            3.0,
        );
        let record = monitoring_record(&message).expect("encode ok");
        assert_eq!(record.partition_key, "agent-1");
        assert_eq!(record.topic, topics::MONITORING);
    }
}
