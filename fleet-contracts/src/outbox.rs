use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::OutboxId;

/// Lifecycle state of an [`OutboxRecord`] (spec §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    Pending,
    Delivered,
    Dead,
}

impl OutboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxState::Pending => "pending",
            OutboxState::Delivered => "delivered",
            OutboxState::Dead => "dead",
        }
    }
}

impl std::str::FromStr for OutboxState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxState::Pending),
            "delivered" => Ok(OutboxState::Delivered),
            "dead" => Ok(OutboxState::Dead),
            other => Err(format!("unrecognized outbox state: {other}")),
        }
    }
}

/// The durable unit of broker message handoff (spec §3).
///
/// Inserted in the same transaction as the business write that produced it;
/// transitions `PENDING -> DELIVERED` or `PENDING -> DEAD` monotonically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: OutboxId,
    pub topic: String,
    pub partition_key: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub state: OutboxState,
    pub created_at: DateTime<Utc>,
    pub lock_id: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Fields required to insert a new [`OutboxRecord`] inside a business
/// transaction. `id`/`created_at`/lock fields are assigned by the store.
#[derive(Clone, Debug)]
pub struct NewOutboxRecord {
    pub topic: String,
    pub partition_key: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl NewOutboxRecord {
    pub fn new(topic: impl Into<String>, partition_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition_key: partition_key.into(),
            payload,
            headers: Vec::new(),
        }
    }
}
