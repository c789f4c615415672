//! DynamoDB-backed queue client and its operations.
//!
//! There is no broker process anywhere: producers and consumers coordinate
//! purely through conditional writes against the shared table. Every
//! mutation runs under an optimistic-concurrency predicate on the record
//! version, so a client can be cloned freely across tasks without any
//! client-side locking.
//!
//! Cancellation follows Rust convention: every store call is an `.await`
//! suspension point, and dropping an operation future abandons the in-flight
//! call.

use crate::clock::{format_rfc3339_nano, Clock, SystemClock};
use crate::codec::{marshal_message, unmarshal_item, unmarshal_message, Item};
use crate::config::{ClientConfig, MAX_QUERY_PAGE_SIZE, QUEUEING_INDEX_NAME};
use crate::error::QueueError;
use crate::expression::{attr, primary_key, Expression, ExpressionBuilder};
use crate::message::{is_visible_at, Message, QueueType, Status};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Operation Results
// ============================================================================

/// Common fields shared by every mutation outcome.
///
/// Operation outputs embed this by composition; callers dispatch on the
/// operation they invoked, not on a runtime tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResult {
    pub id: String,
    pub status: Status,
    pub updated_at: String,
    pub version: u64,
}

impl MessageResult {
    fn from_message<T>(message: &Message<T>) -> Self {
        Self {
            id: message.id.clone(),
            status: message.status,
            updated_at: message.updated_at.clone(),
            version: message.version,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendMessageInput<T> {
    /// Primary key of the new record; must be non-empty and unused.
    pub id: String,
    pub data: T,
    /// Delay before the record becomes eligible for receipt.
    pub delay_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageOutput<T> {
    pub result: MessageResult,
    pub message: Message<T>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveMessageInput {
    /// Visibility window for this receipt; the client default applies when
    /// unset.
    pub visibility_timeout_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveMessageOutput<T> {
    pub result: MessageResult,
    /// When this receipt claimed the record.
    pub received_at: String,
    pub message: Message<T>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteMessageInput {
    pub id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteMessageOutput;

#[derive(Debug, Clone, Default)]
pub struct UpdateMessageAsVisibleInput {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMessageAsVisibleOutput<T> {
    pub result: MessageResult,
    pub message: Message<T>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeMessageVisibilityInput {
    pub id: String,
    pub visibility_timeout_secs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMessageVisibilityOutput<T> {
    pub result: MessageResult,
    pub message: Message<T>,
}

#[derive(Debug, Clone, Default)]
pub struct MoveMessageToDlqInput {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveMessageToDlqOutput {
    pub result: MessageResult,
}

#[derive(Debug, Clone, Default)]
pub struct RedriveMessageInput {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedriveMessageOutput {
    pub result: MessageResult,
}

#[derive(Debug, Clone, Default)]
pub struct GetMessageInput {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetMessageOutput<T> {
    /// `None` when no record carries the requested ID.
    pub message: Option<Message<T>>,
}

#[derive(Debug, Clone)]
pub struct ReplaceMessageInput<T> {
    pub message: Message<T>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceMessageOutput;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListMessagesInput {
    /// Upper bound on the number of records returned; no ordering guarantee.
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListMessagesOutput<T> {
    pub messages: Vec<Message<T>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetQueueStatsInput;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetQueueStatsOutput {
    /// First 100 record IDs in queue order.
    pub first_100_ids_in_queue: Vec<String>,
    /// First 100 IDs of records currently inside a visibility window.
    pub first_100_selected_ids_in_queue: Vec<String>,
    pub total_records_in_queue: u64,
    pub total_records_in_processing: u64,
    pub total_records_not_started: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetDlqStatsInput;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDlqStatsOutput {
    /// First 100 record IDs in DLQ order.
    pub first_100_ids_in_queue: Vec<String>,
    pub total_records_in_dlq: u64,
}

/// Projected row used by the stats scans; only the attributes needed to
/// evaluate the visibility predicate are fetched.
#[derive(Debug, Default, Deserialize)]
struct QueueRecordSummary {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    received_at: String,
    #[serde(default)]
    visibility_timeout: u32,
}

// ============================================================================
// Client
// ============================================================================

/// Queue client generic over the payload type.
///
/// Cheap to clone; holds only immutable configuration and the underlying
/// store handle, so one client can serve any number of concurrent tasks.
pub struct Client<T> {
    dynamo: aws_sdk_dynamodb::Client,
    table_name: String,
    visibility_timeout_secs: u32,
    use_fifo: bool,
    clock: Arc<dyn Clock>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            dynamo: self.dynamo.clone(),
            table_name: self.table_name.clone(),
            visibility_timeout_secs: self.visibility_timeout_secs,
            use_fifo: self.use_fifo,
            clock: self.clock.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("table_name", &self.table_name)
            .field("visibility_timeout_secs", &self.visibility_timeout_secs)
            .field("use_fifo", &self.use_fifo)
            .finish()
    }
}

impl<T> Client<T> {
    /// Start building a client.
    pub fn builder() -> ClientBuilder<T> {
        ClientBuilder::default()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder<T> {
    config: ClientConfig,
    clock: Option<Arc<dyn Clock>>,
    dynamo: Option<aws_sdk_dynamodb::Client>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Default for ClientBuilder<T> {
    fn default() -> Self {
        Self {
            config: ClientConfig::default(),
            clock: None,
            dynamo: None,
            _payload: PhantomData,
        }
    }
}

impl<T> ClientBuilder<T> {
    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the target table.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.config.table_name = table_name.into();
        self
    }

    /// Set the AWS region.
    pub fn with_aws_region(mut self, region: impl Into<String>) -> Self {
        self.config.aws_region = region.into();
        self
    }

    /// Set the shared-config credentials profile.
    pub fn with_aws_credentials_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.aws_credentials_profile = profile.into();
        self
    }

    /// Set the default visibility window in seconds.
    pub fn with_visibility_timeout_secs(mut self, seconds: u32) -> Self {
        self.config.visibility_timeout_secs = seconds;
        self
    }

    /// Set the SDK retry budget.
    pub fn with_retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// Enable strict head-of-line receive behavior.
    pub fn with_use_fifo(mut self, use_fifo: bool) -> Self {
        self.config.use_fifo = use_fifo;
        self
    }

    /// Override the store endpoint.
    pub fn with_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.base_endpoint = Some(endpoint.into());
        self
    }

    /// Inject a time source; defaults to the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Supply a pre-built store handle instead of loading AWS config.
    pub fn with_dynamodb_client(mut self, client: aws_sdk_dynamodb::Client) -> Self {
        self.dynamo = Some(client);
        self
    }

    /// Finish building, loading the AWS shared config unless a store handle
    /// was supplied.
    pub async fn build(self) -> Client<T> {
        let dynamo = match self.dynamo {
            Some(client) => client,
            None => self.config.connect().await,
        };
        Client {
            dynamo,
            table_name: self.config.table_name,
            visibility_timeout_secs: self.config.visibility_timeout_secs,
            use_fifo: self.config.use_fifo,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            _payload: PhantomData,
        }
    }
}

impl<T> Client<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Write a new READY record into the STANDARD queue.
    ///
    /// The write is conditioned on the ID not existing yet; a duplicate is
    /// reported as [`QueueError::IdDuplicated`].
    pub async fn send_message(
        &self,
        input: SendMessageInput<T>,
    ) -> Result<SendMessageOutput<T>, QueueError> {
        if input.id.is_empty() {
            return Err(QueueError::IdNotProvided);
        }
        let now = self.clock.now();
        let mut message = Message::new(input.id, input.data, now);
        if input.delay_seconds > 0 {
            message.queue_add_timestamp =
                format_rfc3339_nano(now + Duration::seconds(i64::from(input.delay_seconds)));
        }
        let item = marshal_message(&message)?;
        let outcome = self
            .dynamo
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", attr::ID)
            .send()
            .await;
        if let Err(err) = outcome {
            return Err(match QueueError::from_sdk(err) {
                QueueError::ConditionalCheckFailed { .. } => QueueError::IdDuplicated {
                    id: message.id.clone(),
                },
                other => other,
            });
        }
        debug!(id = %message.id, "sent message");
        Ok(SendMessageOutput {
            result: MessageResult::from_message(&message),
            message,
        })
    }

    /// Claim the oldest visible record in the STANDARD queue.
    ///
    /// Scans the queue index oldest-first and attempts a version-conditioned
    /// transition to PROCESSING on the first eligible record. A FIFO client
    /// gives up with [`QueueError::EmptyQueue`] as soon as the head is
    /// contended or still in flight, preserving head-of-line order; a
    /// non-FIFO client skips ahead to the next candidate.
    pub async fn receive_message(
        &self,
        input: ReceiveMessageInput,
    ) -> Result<ReceiveMessageOutput<T>, QueueError> {
        let visibility_timeout = input
            .visibility_timeout_secs
            .unwrap_or(self.visibility_timeout_secs);
        let query = ExpressionBuilder::default()
            .with_key_queue_type(QueueType::Standard)
            .build()?;

        let mut exclusive_start_key: Option<Item> = None;
        loop {
            let page = self
                .dynamo
                .query()
                .table_name(&self.table_name)
                .index_name(QUEUEING_INDEX_NAME)
                .set_key_condition_expression(query.key_condition.clone())
                .set_expression_attribute_names(query.names_opt())
                .set_expression_attribute_values(query.values_opt())
                .scan_index_forward(true)
                .limit(MAX_QUERY_PAGE_SIZE)
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(QueueError::from_sdk)?;

            for item in page.items() {
                let candidate: Message<T> = unmarshal_message(item)?;
                let now = self.clock.now();
                if !candidate.is_visible(now) {
                    // An in-flight record at the head of a FIFO queue blocks
                    // everything behind it; at most one message is in flight
                    // per queue at a time.
                    if self.use_fifo {
                        return Err(QueueError::EmptyQueue);
                    }
                    continue;
                }
                match self.claim(candidate, now, visibility_timeout).await {
                    Ok(claimed) => {
                        debug!(id = %claimed.id, receive_count = claimed.receive_count, "received message");
                        return Ok(ReceiveMessageOutput {
                            result: MessageResult::from_message(&claimed),
                            received_at: claimed.received_at.clone(),
                            message: claimed,
                        });
                    }
                    Err(QueueError::ConditionalCheckFailed { .. }) => {
                        // Lost the race for this record. FIFO consumers must
                        // not skip past a contended head.
                        if self.use_fifo {
                            return Err(QueueError::EmptyQueue);
                        }
                    }
                    Err(other) => return Err(other),
                }
            }

            match page.last_evaluated_key() {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key.clone()),
                _ => break,
            }
        }
        Err(QueueError::EmptyQueue)
    }

    async fn claim(
        &self,
        mut message: Message<T>,
        now: chrono::DateTime<chrono::Utc>,
        visibility_timeout_secs: u32,
    ) -> Result<Message<T>, QueueError> {
        let observed_version = message.version;
        message.mark_as_processing(now, visibility_timeout_secs)?;
        let expr = ExpressionBuilder::default()
            .with_version_condition(observed_version)
            .with_queue_type_condition(QueueType::Standard)
            .with_set(
                attr::STATUS,
                AttributeValue::S(message.status.as_str().to_string()),
            )
            .with_set(
                attr::RECEIVE_COUNT,
                AttributeValue::N(message.receive_count.to_string()),
            )
            .with_set(
                attr::VISIBILITY_TIMEOUT,
                AttributeValue::N(message.visibility_timeout.to_string()),
            )
            .with_set(
                attr::RECEIVED_AT,
                AttributeValue::S(message.received_at.clone()),
            )
            .with_set(
                attr::UPDATED_AT,
                AttributeValue::S(message.updated_at.clone()),
            )
            .build()?;
        self.update_record(&message.id, expr).await
    }

    /// Remove a record by ID. Deleting an absent ID succeeds.
    pub async fn delete_message(
        &self,
        input: DeleteMessageInput,
    ) -> Result<DeleteMessageOutput, QueueError> {
        if input.id.is_empty() {
            return Err(QueueError::IdNotProvided);
        }
        self.dynamo
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(&input.id)))
            .send()
            .await
            .map_err(QueueError::from_sdk)?;
        debug!(id = %input.id, "deleted message");
        Ok(DeleteMessageOutput)
    }

    /// Return a PROCESSING record to the queue ahead of its timeout.
    pub async fn update_message_as_visible(
        &self,
        input: UpdateMessageAsVisibleInput,
    ) -> Result<UpdateMessageAsVisibleOutput<T>, QueueError> {
        let mut message = self.read_required(&input.id).await?;
        let observed_version = message.version;
        message.mark_as_ready(self.clock.now())?;
        let expr = ExpressionBuilder::default()
            .with_version_condition(observed_version)
            .with_set(
                attr::STATUS,
                AttributeValue::S(message.status.as_str().to_string()),
            )
            .with_set(
                attr::VISIBILITY_TIMEOUT,
                AttributeValue::N(message.visibility_timeout.to_string()),
            )
            .with_set(
                attr::UPDATED_AT,
                AttributeValue::S(message.updated_at.clone()),
            )
            .build()?;
        let updated = self.update_record(&message.id, expr).await?;
        Ok(UpdateMessageAsVisibleOutput {
            result: MessageResult::from_message(&updated),
            message: updated,
        })
    }

    /// Change the visibility window of a PROCESSING record.
    pub async fn change_message_visibility(
        &self,
        input: ChangeMessageVisibilityInput,
    ) -> Result<ChangeMessageVisibilityOutput<T>, QueueError> {
        let mut message = self.read_required(&input.id).await?;
        let observed_version = message.version;
        message.change_visibility_timeout(self.clock.now(), input.visibility_timeout_secs)?;
        let expr = ExpressionBuilder::default()
            .with_version_condition(observed_version)
            .with_set(
                attr::VISIBILITY_TIMEOUT,
                AttributeValue::N(message.visibility_timeout.to_string()),
            )
            .with_set(
                attr::UPDATED_AT,
                AttributeValue::S(message.updated_at.clone()),
            )
            .build()?;
        let updated = self.update_record(&message.id, expr).await?;
        Ok(ChangeMessageVisibilityOutput {
            result: MessageResult::from_message(&updated),
            message: updated,
        })
    }

    /// Route a record to the dead-letter queue.
    ///
    /// A record already in the DLQ is reported as success with its current
    /// fields and an unchanged version.
    pub async fn move_message_to_dlq(
        &self,
        input: MoveMessageToDlqInput,
    ) -> Result<MoveMessageToDlqOutput, QueueError> {
        let mut message = self.read_required(&input.id).await?;
        if message.queue_type == QueueType::Dlq {
            return Ok(MoveMessageToDlqOutput {
                result: MessageResult::from_message(&message),
            });
        }
        let observed_version = message.version;
        message.mark_as_moved_to_dlq(self.clock.now())?;
        let expr = ExpressionBuilder::default()
            .with_version_condition(observed_version)
            .with_set(
                attr::QUEUE_TYPE,
                AttributeValue::S(message.queue_type.as_str().to_string()),
            )
            .with_set(
                attr::STATUS,
                AttributeValue::S(message.status.as_str().to_string()),
            )
            .with_set(
                attr::RECEIVE_COUNT,
                AttributeValue::N(message.receive_count.to_string()),
            )
            .with_set(
                attr::VISIBILITY_TIMEOUT,
                AttributeValue::N(message.visibility_timeout.to_string()),
            )
            .with_set(attr::SENT_AT, AttributeValue::S(message.sent_at.clone()))
            .with_set(
                attr::RECEIVED_AT,
                AttributeValue::S(message.received_at.clone()),
            )
            .with_set(
                attr::QUEUE_ADD_TIMESTAMP,
                AttributeValue::S(message.queue_add_timestamp.clone()),
            )
            .with_set(
                attr::UPDATED_AT,
                AttributeValue::S(message.updated_at.clone()),
            )
            .build()?;
        let updated = self.update_record(&message.id, expr).await?;
        debug!(id = %updated.id, "moved message to DLQ");
        Ok(MoveMessageToDlqOutput {
            result: MessageResult::from_message(&updated),
        })
    }

    /// Move a DLQ record back into the STANDARD queue.
    pub async fn redrive_message(
        &self,
        input: RedriveMessageInput,
    ) -> Result<RedriveMessageOutput, QueueError> {
        let mut message = self.read_required(&input.id).await?;
        let observed_version = message.version;
        message.mark_as_restored_from_dlq(self.clock.now())?;
        let expr = ExpressionBuilder::default()
            .with_version_condition(observed_version)
            .with_set(
                attr::QUEUE_TYPE,
                AttributeValue::S(message.queue_type.as_str().to_string()),
            )
            .with_set(
                attr::STATUS,
                AttributeValue::S(message.status.as_str().to_string()),
            )
            .with_set(
                attr::RECEIVE_COUNT,
                AttributeValue::N(message.receive_count.to_string()),
            )
            .with_set(
                attr::QUEUE_ADD_TIMESTAMP,
                AttributeValue::S(message.queue_add_timestamp.clone()),
            )
            .with_set(
                attr::UPDATED_AT,
                AttributeValue::S(message.updated_at.clone()),
            )
            .build()?;
        let updated = self.update_record(&message.id, expr).await?;
        debug!(id = %updated.id, "redrove message");
        Ok(RedriveMessageOutput {
            result: MessageResult::from_message(&updated),
        })
    }

    /// Consistent point read. A missing ID yields `None`, not an error.
    pub async fn get_message(
        &self,
        input: GetMessageInput,
    ) -> Result<GetMessageOutput<T>, QueueError> {
        if input.id.is_empty() {
            return Err(QueueError::IdNotProvided);
        }
        let message = self.read_message(&input.id).await?;
        Ok(GetMessageOutput { message })
    }

    /// Overwrite a record wholesale, bypassing the version check.
    ///
    /// Repair tool for operational intervention; regular mutations should go
    /// through the conditioned operations instead.
    pub async fn replace_message(
        &self,
        input: ReplaceMessageInput<T>,
    ) -> Result<ReplaceMessageOutput, QueueError> {
        if input.message.id.is_empty() {
            return Err(QueueError::IdNotProvided);
        }
        let item = marshal_message(&input.message)?;
        self.dynamo
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(QueueError::from_sdk)?;
        debug!(id = %input.message.id, "replaced message");
        Ok(ReplaceMessageOutput)
    }

    /// Unordered bounded scan over the whole table.
    pub async fn list_messages(
        &self,
        input: ListMessagesInput,
    ) -> Result<ListMessagesOutput<T>, QueueError> {
        let mut scan = self.dynamo.scan().table_name(&self.table_name);
        if input.size > 0 {
            scan = scan.limit(input.size);
        }
        let output = scan.send().await.map_err(QueueError::from_sdk)?;
        let messages = output
            .items()
            .iter()
            .map(unmarshal_message)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListMessagesOutput { messages })
    }

    /// Aggregate counts over the STANDARD queue.
    ///
    /// A record counts as in-processing while it is inside its visibility
    /// window; an expired claim is indistinguishable from not-started, the
    /// same classification the receive path uses.
    pub async fn get_queue_stats(
        &self,
        _input: GetQueueStatsInput,
    ) -> Result<GetQueueStatsOutput, QueueError> {
        let now = self.clock.now();
        let mut stats = GetQueueStatsOutput::default();
        self.scan_queue_index(QueueType::Standard, |row| {
            stats.total_records_in_queue += 1;
            let in_window =
                !is_visible_at(row.status, &row.received_at, row.visibility_timeout, now);
            if in_window {
                stats.total_records_in_processing += 1;
                if stats.first_100_selected_ids_in_queue.len() < 100 {
                    stats.first_100_selected_ids_in_queue.push(row.id.clone());
                }
            }
            if stats.first_100_ids_in_queue.len() < 100 {
                stats.first_100_ids_in_queue.push(row.id);
            }
        })
        .await?;
        stats.total_records_not_started =
            stats.total_records_in_queue - stats.total_records_in_processing;
        Ok(stats)
    }

    /// Aggregate counts over the dead-letter queue.
    pub async fn get_dlq_stats(
        &self,
        _input: GetDlqStatsInput,
    ) -> Result<GetDlqStatsOutput, QueueError> {
        let mut stats = GetDlqStatsOutput::default();
        self.scan_queue_index(QueueType::Dlq, |row| {
            stats.total_records_in_dlq += 1;
            if stats.first_100_ids_in_queue.len() < 100 {
                stats.first_100_ids_in_queue.push(row.id);
            }
        })
        .await?;
        Ok(stats)
    }

    /// Walk one queue's index in sort-key order, feeding each projected row
    /// to `visit`, following pagination to the end.
    async fn scan_queue_index(
        &self,
        queue_type: QueueType,
        mut visit: impl FnMut(QueueRecordSummary),
    ) -> Result<(), QueueError> {
        let query = ExpressionBuilder::default()
            .with_key_queue_type(queue_type)
            .with_projection(&[
                attr::ID,
                attr::STATUS,
                attr::RECEIVED_AT,
                attr::VISIBILITY_TIMEOUT,
            ])
            .build()?;
        let mut exclusive_start_key: Option<Item> = None;
        loop {
            let page = self
                .dynamo
                .query()
                .table_name(&self.table_name)
                .index_name(QUEUEING_INDEX_NAME)
                .set_key_condition_expression(query.key_condition.clone())
                .set_projection_expression(query.projection.clone())
                .set_expression_attribute_names(query.names_opt())
                .set_expression_attribute_values(query.values_opt())
                .scan_index_forward(true)
                .limit(MAX_QUERY_PAGE_SIZE)
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(QueueError::from_sdk)?;
            for item in page.items() {
                visit(unmarshal_item(item)?);
            }
            match page.last_evaluated_key() {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key.clone()),
                _ => return Ok(()),
            }
        }
    }

    /// Read a record that must exist for the calling operation.
    async fn read_required(&self, id: &str) -> Result<Message<T>, QueueError> {
        if id.is_empty() {
            return Err(QueueError::IdNotProvided);
        }
        self.read_message(id)
            .await?
            .ok_or_else(|| QueueError::IdNotFound { id: id.to_string() })
    }

    async fn read_message(&self, id: &str) -> Result<Option<Message<T>>, QueueError> {
        let output = self
            .dynamo
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(QueueError::from_sdk)?;
        match output.item() {
            Some(item) => Ok(Some(unmarshal_message(item)?)),
            None => Ok(None),
        }
    }

    /// Apply a conditioned update and decode the post-image.
    async fn update_record(&self, id: &str, expr: Expression) -> Result<Message<T>, QueueError> {
        let output = self
            .dynamo
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(id)))
            .set_expression_attribute_names(expr.names_opt())
            .set_expression_attribute_values(expr.values_opt())
            .set_update_expression(expr.update)
            .set_condition_expression(expr.condition)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(QueueError::from_sdk)?;
        let attributes = output
            .attributes()
            .ok_or_else(|| QueueError::UnmarshalingAttribute {
                source: "update returned no attributes".into(),
            })?;
        unmarshal_message(attributes)
    }
}
