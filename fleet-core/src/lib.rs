//! Core library for the fleet monitoring backend: the Heartbeat Gateway,
//! the transactional outbox dispatcher, the event consumers, the uptime
//! engine, and the stale-agent sweeper. `fleet-server` wires these pieces
//! to the HTTP boundary and the process lifecycle.

pub mod broker;
pub mod cache;
pub mod consumers;
pub mod database;
pub mod error;
pub mod gateway;
pub mod outbox;
pub mod sweeper;
pub mod uptime;

pub use cache::LivenessCache;
pub use error::{FleetError, Result};
pub use gateway::{HeartbeatGateway, IngestMetricsInput};
pub use sweeper::StaleAgentSweeper;
pub use uptime::UptimeEngine;
