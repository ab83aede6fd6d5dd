//! Layered configuration loading for the fleet monitoring workspace.

pub mod error;
pub mod loader;
pub mod models;

pub use error::ConfigLoadError;
pub use loader::ConfigLoader;
pub use models::{
    BrokerConfig, Config, DatabaseConfig, DispatcherConfig, GatewayConfig, RedisConfig,
    ServerConfig, SweeperConfig, UptimeConfig,
};
