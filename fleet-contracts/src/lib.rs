//! Wire and persistence contracts shared by `fleet-core` and `fleet-server`.
//!
//! Nothing here performs I/O: this crate is pure data plus the small amount
//! of logic (document-id derivation, status parsing) that every consumer of
//! these types needs identically.

pub mod agent;
pub mod id;
pub mod messages;
pub mod outbox;
pub mod uptime;

pub use agent::{Agent, AgentStatus, IngestMetricsRequest, RegisterAgentRequest};
pub use id::{AgentId, OutboxId};
pub use messages::{topics, MonitoringMessage, StatusChangeMessage};
pub use outbox::{NewOutboxRecord, OutboxRecord, OutboxState};
pub use uptime::{FleetUptimeSummary, UptimeLogEntry, UptimeWindow};
