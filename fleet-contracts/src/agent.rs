use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::AgentId;

/// Liveness state an agent is believed to be in.
///
/// Mutated only by the Status Updater consumer (spec §4.3); the Gateway and
/// Sweeper only ever read it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    On,
    Off,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::On => "ON",
            AgentStatus::Off => "OFF",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(AgentStatus::On),
            "OFF" => Ok(AgentStatus::Off),
            other => Err(format!("unrecognized agent status: {other}")),
        }
    }
}

/// Authoritative record of a monitored agent.
///
/// Created on first registration; `status` is mutated only by the Status
/// Updater consumer; `interval_seconds` is admin-mutable; deleted explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub server_name: String,
    pub description: Option<String>,
    pub ipv4: Option<String>,
    pub os: Option<String>,
    pub location: Option<String>,
    pub status: AgentStatus,
    /// Declared heartbeat period. Must be positive.
    pub interval_seconds: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted on `POST /servers/register`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent_id: AgentId,
    pub server_name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub os: Option<String>,
    pub interval_time: i64,
}

/// Fields accepted on `POST /servers/monitoring`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestMetricsRequest {
    pub agent_id: AgentId,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for status in [AgentStatus::On, AgentStatus::Off] {
            let parsed: AgentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unrecognized_status_is_rejected() {
        assert!("UNKNOWN".parse::<AgentStatus>().is_err());
    }
}
