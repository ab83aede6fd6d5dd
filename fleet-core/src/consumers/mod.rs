//! Consumer group runner and the three registered handlers (spec §4.3).

pub mod handler;
pub mod metrics_sink;
pub mod runner;
pub mod status_updater;
pub mod uptime_log_writer;

pub use handler::MessageHandler;
pub use metrics_sink::MetricsSink;
pub use runner::ConsumerGroupRunner;
pub use status_updater::StatusUpdater;
pub use uptime_log_writer::UptimeLogWriter;
