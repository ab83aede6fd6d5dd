use async_trait::async_trait;

use crate::error::Result;

/// A single topic handler invoked by the [`super::runner::ConsumerGroupRunner`]
/// with the raw payload bytes (spec §4.3).
///
/// Handler errors surrender the claim so the broker group rebalances and
/// redelivers; handlers must therefore be idempotent.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<()>;
}
