//! Consuming-side poll loop.
//!
//! The loop is deliberately thin: it receives, hands the message to a
//! processor, and settles the outcome. Redelivery comes for free from the
//! visibility timeout, so a failed message needs no explicit requeue.

use crate::client::{
    Client, DeleteMessageInput, MoveMessageToDlqInput, ReceiveMessageInput, ReceiveMessageOutput,
};
use crate::error::{BoxError, ErrorKind, QueueError};
use crate::message::Message;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// Default pause between polls when the queue is empty.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of receives after which a failing message is routed to the
/// dead-letter queue.
pub const DEFAULT_MAXIMUM_RECEIVES: u32 = 10;

/// Handles one received message.
#[async_trait]
pub trait MessageProcessor<T>: Send + Sync {
    /// Process the message. Returning an error leaves the message to the
    /// retry policy instead of deleting it.
    async fn process(&self, message: &Message<T>) -> Result<(), BoxError>;
}

/// Options governing the poll loop.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Pause between polls when the queue is empty or a poll fails.
    pub polling_interval: Duration,
    /// Receive count at which a failing message moves to the DLQ; zero keeps
    /// retrying forever.
    pub maximum_receives: u32,
    /// Visibility window override for this consumer's receipts.
    pub visibility_timeout_secs: Option<u32>,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            maximum_receives: DEFAULT_MAXIMUM_RECEIVES,
            visibility_timeout_secs: None,
        }
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A message was received and settled (deleted, DLQ-routed, or left for
    /// redelivery).
    Handled,
    /// No message was eligible.
    Empty,
}

/// Polling consumer driving a [`MessageProcessor`].
pub struct Consumer<T, P> {
    client: Client<T>,
    processor: P,
    options: ConsumerOptions,
}

impl<T, P> Consumer<T, P>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    P: MessageProcessor<T>,
{
    /// Create a consumer with default options.
    pub fn new(client: Client<T>, processor: P) -> Self {
        Self {
            client,
            processor,
            options: ConsumerOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: ConsumerOptions) -> Self {
        self.options = options;
        self
    }

    /// Run until `shutdown` flips to `true`.
    ///
    /// Transport errors are logged and retried after the polling interval;
    /// they never terminate the loop.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                debug!("consumer shutting down");
                return;
            }
            let pause = match self.poll_once().await {
                Ok(PollOutcome::Handled) => None,
                Ok(PollOutcome::Empty) => Some(self.options.polling_interval),
                Err(err) => {
                    warn!(error = %err, transient = err.is_transient(), "poll failed");
                    Some(self.options.polling_interval)
                }
            };
            if let Some(pause) = pause {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }
    }

    /// Receive and settle at most one message.
    pub async fn poll_once(&self) -> Result<PollOutcome, QueueError> {
        let received = match self
            .client
            .receive_message(ReceiveMessageInput {
                visibility_timeout_secs: self.options.visibility_timeout_secs,
            })
            .await
        {
            Ok(received) => received,
            Err(err) if err.kind() == ErrorKind::EmptyQueue => return Ok(PollOutcome::Empty),
            Err(err) => return Err(err),
        };
        self.settle(received).await?;
        Ok(PollOutcome::Handled)
    }

    async fn settle(&self, received: ReceiveMessageOutput<T>) -> Result<(), QueueError> {
        let message = received.message;
        match self.processor.process(&message).await {
            Ok(()) => {
                self.client
                    .delete_message(DeleteMessageInput {
                        id: message.id.clone(),
                    })
                    .await?;
                debug!(id = %message.id, "message processed");
            }
            Err(cause) => {
                warn!(
                    id = %message.id,
                    receive_count = message.receive_count,
                    error = %cause,
                    "message processing failed"
                );
                if self.options.maximum_receives > 0
                    && message.receive_count >= self.options.maximum_receives
                {
                    self.client
                        .move_message_to_dlq(MoveMessageToDlqInput {
                            id: message.id.clone(),
                        })
                        .await?;
                    warn!(id = %message.id, "message moved to DLQ");
                }
                // Otherwise the visibility timeout returns it to the queue.
            }
        }
        Ok(())
    }
}
