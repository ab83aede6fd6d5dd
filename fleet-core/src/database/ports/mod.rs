//! Repository ports grouped by bounded context, enabling a DDD-style split
//! between the pipeline components and the Postgres adapter.
//!
//! Implementations live under `database::postgres`.

pub mod agents;
pub mod metrics;
pub mod outbox;
pub mod uptime_log;

pub use agents::AgentRepository;
pub use metrics::MetricsSinkRepository;
pub use outbox::OutboxRepository;
pub use uptime_log::UptimeLogRepository;
