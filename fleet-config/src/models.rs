use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration, composed from sub-structs the way
/// `ferrex-config::models::Config` groups `ServerConfig`/`DatabaseConfig`/
/// `RedisConfig`. Each sub-struct maps to one row of spec §6.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub broker: BrokerConfig,
    pub dispatcher: DispatcherConfig,
    pub gateway: GatewayConfig,
    pub sweeper: SweeperConfig,
    pub uptime: UptimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub shutdown_grace_period: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub bootstrap_servers: String,
    pub client_id: String,
}

/// Corresponds to the `dispatcher.*` options in spec §6.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(with = "humantime_serde")]
    pub process_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub lock_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_lock_age: Duration,
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    pub max_attempts_enabled: bool,
    pub max_attempts: u32,
    pub machine_id: String,
    pub batch_size: i64,
}

/// Corresponds to `gateway.liveness_multiplier`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub liveness_multiplier: f64,
}

/// Corresponds to `sweeper.schedule`.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    pub schedule: String,
}

/// Corresponds to `uptime.worker_pool_size` / `uptime.health_threshold_percent`.
#[derive(Debug, Clone, Deserialize)]
pub struct UptimeConfig {
    pub worker_pool_size: usize,
    pub health_threshold_percent: f64,
}
