//! `sqlx`-backed implementations of the repository ports, grounded on the
//! teacher's `database::infrastructure::postgres::repositories` layout.

mod agents;
mod metrics;
mod outbox;
mod uptime_log;

pub use agents::PostgresAgentRepository;
pub use metrics::PostgresMetricsSinkRepository;
pub use outbox::PostgresOutboxRepository;
pub use uptime_log::PostgresUptimeLogRepository;
