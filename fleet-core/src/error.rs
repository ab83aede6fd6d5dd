use thiserror::Error;

/// Error taxonomy surfaced by the monitoring core (spec §7).
///
/// Every variant maps to a stable HTTP error code in `fleet-server`; the
/// `Fatal` variant is the only one that should ever terminate the process.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("poison message after {attempts} attempts: {last_error}")]
    PoisonMessage { attempts: i32, last_error: String },

    #[error("fatal invariant breach: {0}")]
    Fatal(String),
}

impl FleetError {
    /// Stable error code surfaced to HTTP clients (spec §7).
    pub fn code(&self) -> &'static str {
        match self {
            FleetError::Validation(_) => "BAD_REQUEST",
            FleetError::NotFound(_) => "NOT_FOUND",
            FleetError::Conflict(_) => "CONFLICT",
            FleetError::TransientIo(_) => "INTERNAL_SERVER_ERROR",
            FleetError::PoisonMessage { .. } => "INTERNAL_SERVER_ERROR",
            FleetError::Fatal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::TransientIo(_))
    }
}

impl From<sqlx::Error> for FleetError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => FleetError::NotFound("row not found".to_string()),
            other => FleetError::TransientIo(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for FleetError {
    fn from(err: redis::RedisError) -> Self {
        FleetError::TransientIo(format!("redis error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
