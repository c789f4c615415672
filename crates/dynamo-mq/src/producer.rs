//! Producing-side convenience wrapper.

use crate::client::{Client, SendMessageInput};
use crate::error::QueueError;
use crate::message::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;

/// Generates IDs for produced messages.
pub type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Thin wrapper over [`Client`] that assigns an ID to every message it
/// sends. IDs default to UUID v4.
pub struct Producer<T> {
    client: Client<T>,
    id_generator: IdGenerator,
}

#[derive(Debug, Clone, Default)]
pub struct ProduceInput<T> {
    pub data: T,
    /// Delay before the record becomes eligible for receipt.
    pub delay_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceOutput<T> {
    pub message: Message<T>,
}

impl<T> Producer<T> {
    /// Create a producer with the default UUID v4 ID generator.
    pub fn new(client: Client<T>) -> Self {
        Self {
            client,
            id_generator: Box::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Replace the ID generator.
    pub fn with_id_generator(
        mut self,
        id_generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.id_generator = Box::new(id_generator);
        self
    }
}

impl<T> Producer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Send one message under a freshly generated ID.
    pub async fn produce(&self, input: ProduceInput<T>) -> Result<ProduceOutput<T>, QueueError> {
        let output = self
            .client
            .send_message(SendMessageInput {
                id: (self.id_generator)(),
                data: input.data,
                delay_seconds: input.delay_seconds,
            })
            .await?;
        Ok(ProduceOutput {
            message: output.message,
        })
    }
}
