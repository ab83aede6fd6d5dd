use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;
use crate::id::AgentId;

/// Broker topic names. Keys on all topics are `agent_id` (spec §6).
pub mod topics {
    pub const MONITORING: &str = "monitoring_event";
    pub const STATUS_CHANGE: &str = "status_change_event";
}

/// Payload carried by the `monitoring` topic.
///
/// Carries cpu/ram/disk (the richer of the two conflicting definitions in
/// the source material — see SPEC_FULL.md Open Questions) since the Metrics
/// Sink consumer requires those fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitoringMessage {
    pub agent_id: AgentId,
    pub old_status: AgentStatus,
    pub new_status: AgentStatus,
    pub timestamp: DateTime<Utc>,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
}

/// Payload carried by the `status_change` topic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusChangeMessage {
    pub agent_id: AgentId,
    pub old_status: AgentStatus,
    pub new_status: AgentStatus,
    pub timestamp: DateTime<Utc>,
    pub interval: i64,
}
