use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
