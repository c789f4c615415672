//! Message records and their state machine.

use crate::clock::{format_rfc3339_nano, parse_rfc3339};
use crate::error::QueueError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

// ============================================================================
// Queue Type and Status
// ============================================================================

/// Logical queue a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QueueType {
    /// Queue of deliverable messages.
    #[default]
    #[serde(rename = "STANDARD")]
    Standard,
    /// Dead-letter queue holding failed records until they are redriven.
    #[serde(rename = "DLQ")]
    Dlq,
}

impl QueueType {
    /// Stable string form, as stored in the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Dlq => "DLQ",
        }
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Eligible for receipt by any consumer.
    #[default]
    #[serde(rename = "READY")]
    Ready,
    /// Claimed by a consumer and invisible until its visibility window ends.
    #[serde(rename = "PROCESSING")]
    Processing,
}

impl Status {
    /// Stable string form, as stored in the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Processing => "PROCESSING",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Message Record
// ============================================================================

/// The unit of work stored in the table.
///
/// Field names mirror the table attribute names one-for-one. Timestamps are
/// RFC3339 UTC strings with nanosecond precision; an unset timestamp is the
/// empty string, never a missing attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    /// Primary key of the record, unique across both queues.
    pub id: String,
    /// Caller-provided payload.
    pub data: T,
    /// Number of times the record transitioned READY to PROCESSING.
    #[serde(default)]
    pub receive_count: u32,
    /// Which logical queue the record belongs to.
    #[serde(default)]
    pub queue_type: QueueType,
    /// Visibility state.
    #[serde(default)]
    pub status: Status,
    /// Optimistic concurrency token; every successful mutation adds one.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// When the record entered its current queue.
    #[serde(default)]
    pub sent_at: String,
    /// When the record was last claimed; empty while it has never been
    /// received or after it moved to the DLQ.
    #[serde(default)]
    pub received_at: String,
    /// Sort key on the queue index; governs receive order. Not restamped on
    /// receive, so a timed-out record keeps its place in line.
    #[serde(default)]
    pub queue_add_timestamp: String,
    /// Seconds a claimed record stays invisible, measured from `received_at`.
    #[serde(default)]
    pub visibility_timeout: u32,
}

impl<T> Message<T> {
    /// Create a fresh READY record in the STANDARD queue with version 1.
    pub fn new(id: impl Into<String>, data: T, now: DateTime<Utc>) -> Self {
        let ts = format_rfc3339_nano(now);
        Self {
            id: id.into(),
            data,
            receive_count: 0,
            queue_type: QueueType::Standard,
            status: Status::Ready,
            version: 1,
            created_at: ts.clone(),
            updated_at: ts.clone(),
            sent_at: ts.clone(),
            received_at: String::new(),
            queue_add_timestamp: ts,
            visibility_timeout: 0,
        }
    }

    /// Instant at which the record becomes visible again, derived from
    /// `received_at` plus the visibility timeout. `None` when the record has
    /// never been received.
    pub fn invisible_until_at(&self) -> Option<DateTime<Utc>> {
        if self.received_at.is_empty() {
            return None;
        }
        let received = parse_rfc3339(&self.received_at).ok()?;
        Some(received + Duration::seconds(i64::from(self.visibility_timeout)))
    }

    /// Whether the record is eligible for receipt at `now`.
    ///
    /// A PROCESSING record whose visibility window has passed is just as
    /// receivable as a READY one; expired claims are reclaimed lazily at
    /// receive time rather than by a sweeper.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        is_visible_at(self.status, &self.received_at, self.visibility_timeout, now)
    }

    // ------------------------------------------------------------------
    // State transitions
    //
    // Each transition validates its legal predecessors and stamps the
    // affected timestamps and counters. The store-side version increment is
    // applied by the conditional update, not here.
    // ------------------------------------------------------------------

    /// Return a claimed record to the queue.
    ///
    /// Valid from PROCESSING only.
    pub fn mark_as_ready(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.status == Status::Ready {
            return Err(self.invalid_transition("mark as ready"));
        }
        self.status = Status::Ready;
        self.visibility_timeout = 0;
        self.updated_at = format_rfc3339_nano(now);
        Ok(())
    }

    /// Claim a visible STANDARD record for processing.
    ///
    /// Rejects DLQ records and records still inside their visibility window.
    pub fn mark_as_processing(
        &mut self,
        now: DateTime<Utc>,
        visibility_timeout_secs: u32,
    ) -> Result<(), QueueError> {
        if self.queue_type == QueueType::Dlq || !self.is_visible(now) {
            return Err(self.invalid_transition("mark as processing"));
        }
        let ts = format_rfc3339_nano(now);
        self.status = Status::Processing;
        self.visibility_timeout = visibility_timeout_secs;
        self.received_at = ts.clone();
        self.updated_at = ts;
        self.receive_count += 1;
        Ok(())
    }

    /// Move a STANDARD record (any status) to the dead-letter queue.
    ///
    /// A DLQ record is always READY with a zero receive count, and its
    /// position in the DLQ is the instant it arrived there.
    pub fn mark_as_moved_to_dlq(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.queue_type == QueueType::Dlq {
            return Err(self.invalid_transition("move to DLQ"));
        }
        let ts = format_rfc3339_nano(now);
        self.queue_type = QueueType::Dlq;
        self.status = Status::Ready;
        self.visibility_timeout = 0;
        self.receive_count = 0;
        self.sent_at = ts.clone();
        self.received_at = String::new();
        self.queue_add_timestamp = ts.clone();
        self.updated_at = ts;
        Ok(())
    }

    /// Redrive a DLQ record back into the STANDARD queue.
    ///
    /// The record re-enters the queue at `now`, behind everything already
    /// waiting.
    pub fn mark_as_restored_from_dlq(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.queue_type != QueueType::Dlq {
            return Err(self.invalid_transition("restore from DLQ"));
        }
        let ts = format_rfc3339_nano(now);
        self.queue_type = QueueType::Standard;
        self.status = Status::Ready;
        self.receive_count = 0;
        self.queue_add_timestamp = ts.clone();
        self.updated_at = ts;
        Ok(())
    }

    /// Extend or shorten the visibility window of a claimed record.
    ///
    /// Valid from PROCESSING only; the window is still measured from the
    /// original `received_at`.
    pub fn change_visibility_timeout(
        &mut self,
        now: DateTime<Utc>,
        visibility_timeout_secs: u32,
    ) -> Result<(), QueueError> {
        if self.status != Status::Processing {
            return Err(self.invalid_transition("change visibility timeout"));
        }
        self.visibility_timeout = visibility_timeout_secs;
        self.updated_at = format_rfc3339_nano(now);
        Ok(())
    }

    fn invalid_transition(&self, operation: &str) -> QueueError {
        QueueError::InvalidStateTransition {
            operation: operation.to_string(),
            queue_type: self.queue_type,
            status: self.status,
        }
    }
}

/// Visibility predicate over raw attribute values, shared by full records and
/// projected stats rows.
pub(crate) fn is_visible_at(
    status: Status,
    received_at: &str,
    visibility_timeout_secs: u32,
    now: DateTime<Utc>,
) -> bool {
    match status {
        Status::Ready => true,
        Status::Processing => {
            if received_at.is_empty() {
                return true;
            }
            match parse_rfc3339(received_at) {
                Ok(received) => {
                    now >= received + Duration::seconds(i64::from(visibility_timeout_secs))
                }
                Err(_) => true,
            }
        }
    }
}
