use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::handler::MessageHandler;
use crate::broker::BrokerConsumer;

/// Cooperative per-topic consumer loop (spec §4.3): polls a message, hands
/// it to the handler, and only stores the offset once the handler succeeds
/// (auto-commit then flushes stored offsets on its own interval). On
/// handler error the runner seeks the partition back to that offset so the
/// very next poll redelivers it — failures never advance past an
/// unprocessed record (spec §7, §8 at-least-once).
pub struct ConsumerGroupRunner<C, H>
where
    C: BrokerConsumer + 'static,
    H: MessageHandler + 'static,
{
    name: String,
    consumer: Arc<C>,
    handler: Arc<H>,
}

impl<C, H> ConsumerGroupRunner<C, H>
where
    C: BrokerConsumer + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(name: impl Into<String>, consumer: Arc<C>, handler: Arc<H>) -> Self {
        Self {
            name: name.into(),
            consumer,
            handler,
        }
    }

    /// Runs until `shutdown` is cancelled, at which point it stops polling
    /// and returns (spec §5 step 3: commit current offsets and exit cleanly
    /// — auto-commit has already advanced past every successfully handled
    /// message by this point).
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = self.consumer.poll() => {
                        match result {
                            Ok(Some(message)) => {
                                match self.handler.handle(&message.payload).await {
                                    Ok(()) => {
                                        if let Err(err) = self.consumer.store_offset(&message) {
                                            warn!(
                                                consumer = %self.name,
                                                error = %err,
                                                "failed to store offset after successful handling"
                                            );
                                        }
                                    }
                                    Err(err) => {
                                        warn!(
                                            consumer = %self.name,
                                            error = %err,
                                            "handler failed, seeking back to redeliver"
                                        );
                                        if let Err(seek_err) = self.consumer.seek_to_retry(&message) {
                                            error!(
                                                consumer = %self.name,
                                                error = %seek_err,
                                                "failed to seek back for redelivery, message may be skipped"
                                            );
                                        }
                                    }
                                }
                            }
                            Ok(None) => {}
                            Err(err) => {
                                error!(consumer = %self.name, error = %err, "poll failed");
                            }
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!(consumer = %self.name, "consumer loop stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::broker::ConsumedMessage;
    use crate::error::{FleetError, Result};

    /// Yields `messages` in order, then idles (returns `Ok(None)` forever)
    /// so the runner loop has something to poll between ticks. Records every
    /// `store_offset`/`seek_to_retry` call so tests can assert the runner
    /// only commits past a message once the handler actually succeeded.
    #[derive(Default)]
    struct StubConsumer {
        messages: StdMutex<Vec<ConsumedMessage>>,
        stored_offsets: StdMutex<Vec<i64>>,
        sought_offsets: StdMutex<Vec<i64>>,
    }

    #[async_trait]
    impl BrokerConsumer for StubConsumer {
        async fn poll(&self) -> Result<Option<ConsumedMessage>> {
            let next = self.messages.lock().unwrap().pop();
            if next.is_none() {
                // Avoid spinning the select! loop hot while idle.
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok(next)
        }

        fn store_offset(&self, message: &ConsumedMessage) -> Result<()> {
            self.stored_offsets.lock().unwrap().push(message.offset);
            Ok(())
        }

        fn seek_to_retry(&self, message: &ConsumedMessage) -> Result<()> {
            self.sought_offsets.lock().unwrap().push(message.offset);
            Ok(())
        }
    }

    struct RecordingHandler {
        handled: StdMutex<Vec<Vec<u8>>>,
        fail_on: Option<Vec<u8>>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, payload: &[u8]) -> Result<()> {
            if self.fail_on.as_deref() == Some(payload) {
                return Err(FleetError::Validation("forced failure".to_string()));
            }
            self.handled.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn runner_hands_every_polled_message_to_the_handler() {
        let messages = vec![
            ConsumedMessage { partition_key: Some("a".into()), payload: b"one".to_vec(), topic: "t".into(), partition: 0, offset: 10 },
            ConsumedMessage { partition_key: Some("a".into()), payload: b"two".to_vec(), topic: "t".into(), partition: 0, offset: 11 },
        ];
        // `pop()` drains from the back, so reverse to preserve intended order.
        let mut reversed = messages;
        reversed.reverse();
        let consumer = Arc::new(StubConsumer { messages: StdMutex::new(reversed), ..Default::default() });
        let handler = Arc::new(RecordingHandler { handled: StdMutex::new(Vec::new()), fail_on: None });

        let shutdown = CancellationToken::new();
        let runner = Arc::new(ConsumerGroupRunner::new("test", Arc::clone(&consumer), Arc::clone(&handler)));
        let join = runner.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        join.await.unwrap();

        let handled = handler.handled.lock().unwrap();
        assert_eq!(handled.as_slice(), &[b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(consumer.stored_offsets.lock().unwrap().as_slice(), &[10, 11]);
        assert!(consumer.sought_offsets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn runner_keeps_polling_after_a_handler_failure() {
        let messages = vec![
            ConsumedMessage { partition_key: None, payload: b"bad".to_vec(), topic: "t".into(), partition: 0, offset: 20 },
            ConsumedMessage { partition_key: None, payload: b"good".to_vec(), topic: "t".into(), partition: 0, offset: 21 },
        ];
        let mut reversed = messages;
        reversed.reverse();
        let consumer = Arc::new(StubConsumer { messages: StdMutex::new(reversed), ..Default::default() });
        let handler = Arc::new(RecordingHandler {
            handled: StdMutex::new(Vec::new()),
            fail_on: Some(b"bad".to_vec()),
        });

        let shutdown = CancellationToken::new();
        let runner = Arc::new(ConsumerGroupRunner::new("test", Arc::clone(&consumer), Arc::clone(&handler)));
        let join = runner.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        join.await.unwrap();

        assert_eq!(handler.handled.lock().unwrap().as_slice(), &[b"good".to_vec()]);
        assert_eq!(consumer.sought_offsets.lock().unwrap().as_slice(), &[20]);
        assert_eq!(consumer.stored_offsets.lock().unwrap().as_slice(), &[21]);
    }
}
