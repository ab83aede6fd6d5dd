use config::{Config as ConfigSource, Environment, File};

use crate::error::ConfigLoadError;
use crate::models::Config;

/// Loads [`Config`] from, in increasing priority: built-in defaults, an
/// optional `config.toml` in the working directory, then `FLEET__`-prefixed
/// environment variables (double underscore separates nesting, e.g.
/// `FLEET__DISPATCHER__MAX_ATTEMPTS=10`).
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config, ConfigLoadError> {
        // Best-effort; a missing .env is not an error.
        let _ = dotenvy::dotenv();
        Self::load_from("config")
    }

    pub fn load_from(config_file: &str) -> Result<Config, ConfigLoadError> {
        let builder = ConfigSource::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.shutdown_grace_period", "30s")?
            .set_default("database.url", "postgres://localhost/fleet")?
            .set_default("database.max_connections", 20)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("broker.bootstrap_servers", "localhost:9092")?
            .set_default("broker.client_id", "fleet-monitor")?
            .set_default("dispatcher.process_interval", "5s")?
            .set_default("dispatcher.lock_check_interval", "30s")?
            .set_default("dispatcher.cleanup_interval", "1h")?
            .set_default("dispatcher.max_lock_age", "5m")?
            .set_default("dispatcher.retention", "168h")?
            .set_default("dispatcher.max_attempts_enabled", true)?
            .set_default("dispatcher.max_attempts", 5)?
            .set_default("dispatcher.machine_id", default_machine_id())?
            .set_default("dispatcher.batch_size", 100)?
            .set_default("gateway.liveness_multiplier", 1.5)?
            .set_default("sweeper.schedule", "0/15 * * * * *")?
            .set_default("uptime.worker_pool_size", 15)?
            .set_default("uptime.health_threshold_percent", 70.0)?
            .add_source(File::with_name(config_file).required(false))
            .add_source(Environment::with_prefix("FLEET").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }
}

fn default_machine_id() -> String {
    format!(
        "dispatcher-{}",
        std::env::var("HOSTNAME").unwrap_or_else(|_| uuid_like_suffix())
    )
}

fn uuid_like_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}")
}

fn validate(config: &Config) -> Result<(), ConfigLoadError> {
    if config.dispatcher.max_attempts < 1 {
        return Err(ConfigLoadError::Invalid(
            "dispatcher.max_attempts must be >= 1".into(),
        ));
    }
    if config.dispatcher.machine_id.trim().is_empty() {
        return Err(ConfigLoadError::Invalid(
            "dispatcher.machine_id must be non-empty and unique per instance".into(),
        ));
    }
    if config.gateway.liveness_multiplier <= 1.0 {
        return Err(ConfigLoadError::Invalid(
            "gateway.liveness_multiplier must be > 1.0 to provide a grace window".into(),
        ));
    }
    if config.uptime.worker_pool_size == 0 {
        return Err(ConfigLoadError::Invalid(
            "uptime.worker_pool_size must be >= 1".into(),
        ));
    }
    if !(0.0..=100.0).contains(&config.uptime.health_threshold_percent) {
        return Err(ConfigLoadError::Invalid(
            "uptime.health_threshold_percent must be within [0, 100]".into(),
        ));
    }
    Ok(())
}
