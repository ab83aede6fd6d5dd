use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;
use crate::id::AgentId;

/// An append-only entry in the search index documenting a status transition
/// (spec §3). For a given agent, consecutive entries by timestamp must
/// alternate status — enforced at write time by the Uptime Log consumer,
/// never at read time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UptimeLogEntry {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub timestamp: DateTime<Utc>,
}

impl UptimeLogEntry {
    /// Deterministic document id: `{agent_id}-{RFC3339 timestamp}`.
    pub fn document_id(&self) -> String {
        format!("{}-{}", self.agent_id, self.timestamp.to_rfc3339())
    }
}

/// Result of `ComputeWindow` (spec §4.4).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UptimeWindow {
    pub agent_id: AgentId,
    pub on_seconds: f64,
    pub window_seconds: f64,
    pub uptime_ratio: f64,
    pub label: AgentStatus,
}

/// Aggregate result of `AverageUptime` across a fleet (spec §4.4).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetUptimeSummary {
    pub total: usize,
    pub online_count: usize,
    pub offline_count: usize,
    pub avg_uptime_ratio: f64,
}
