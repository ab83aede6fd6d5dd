//! Uptime Engine: `ComputeWindow` and `AverageUptime` (spec §4.4).

pub mod engine;

pub use engine::UptimeEngine;
