//! # dynamo-mq
//!
//! Broker-less, SQS-style durable message queue built directly on DynamoDB.
//!
//! This library provides:
//! - At-least-once delivery with per-message visibility timeouts
//! - A dead-letter queue with redrive back into the main queue
//! - Optimistic concurrency through monotonically increasing record versions
//! - Best-effort oldest-first ordering, or strict head-of-line FIFO mode
//! - Lazy recovery of expired claims with no background sweeper
//!
//! All coordination lives in conditional writes against a single table and
//! its `queue_type`/`queue_add_timestamp` index; there is no server-side
//! component to deploy. A [`Client`] is cheap to clone and safe to share
//! across tasks. [`Producer`] and [`Consumer`] wrap it for the common
//! send/poll patterns.

pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod expression;
pub mod message;
pub mod producer;

pub use client::{
    ChangeMessageVisibilityInput, ChangeMessageVisibilityOutput, Client, ClientBuilder,
    DeleteMessageInput, DeleteMessageOutput, GetDlqStatsInput, GetDlqStatsOutput, GetMessageInput,
    GetMessageOutput, GetQueueStatsInput, GetQueueStatsOutput, ListMessagesInput,
    ListMessagesOutput, MessageResult, MoveMessageToDlqInput, MoveMessageToDlqOutput,
    ReceiveMessageInput, ReceiveMessageOutput, RedriveMessageInput, RedriveMessageOutput,
    ReplaceMessageInput, ReplaceMessageOutput, SendMessageInput, SendMessageOutput,
    UpdateMessageAsVisibleInput, UpdateMessageAsVisibleOutput,
};
pub use clock::{Clock, SystemClock};
pub use config::{
    ClientConfig, DEFAULT_AWS_PROFILE, DEFAULT_AWS_REGION, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_TABLE_NAME, DEFAULT_VISIBILITY_TIMEOUT_SECS, QUEUEING_INDEX_NAME,
};
pub use consumer::{Consumer, ConsumerOptions, MessageProcessor, PollOutcome};
pub use error::{BoxError, ErrorKind, QueueError};
pub use expression::{Expression, ExpressionBuilder};
pub use message::{Message, QueueType, Status};
pub use producer::{ProduceInput, ProduceOutput, Producer};
