//! Error taxonomy for queue operations.

use crate::message::{QueueType, Status};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Boxed error cause carried by wrapped variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Comprehensive error type for all queue operations.
///
/// The first five variants are expected outcomes a caller branches on; the
/// rest wrap a transport or internal cause. Match on [`QueueError::kind`]
/// when only the category matters.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("message ID was not provided")]
    IdNotProvided,

    #[error("message not found: {id}")]
    IdNotFound { id: String },

    #[error("message already exists: {id}")]
    IdDuplicated { id: String },

    #[error("no messages available for receipt")]
    EmptyQueue,

    #[error("invalid state transition: cannot {operation} while {queue_type}/{status}")]
    InvalidStateTransition {
        operation: String,
        queue_type: QueueType,
        status: Status,
    },

    #[error("conditional check failed")]
    ConditionalCheckFailed {
        #[source]
        source: BoxError,
    },

    #[error("failed to build expression")]
    BuildingExpression {
        #[source]
        source: BoxError,
    },

    #[error("failed to marshal message attributes")]
    MarshalingAttribute {
        #[source]
        source: BoxError,
    },

    #[error("failed to unmarshal message attributes")]
    UnmarshalingAttribute {
        #[source]
        source: BoxError,
    },

    #[error("DynamoDB API error")]
    DynamoDbApi {
        #[source]
        source: BoxError,
    },
}

/// Stable category tag for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IdNotProvided,
    IdNotFound,
    IdDuplicated,
    EmptyQueue,
    InvalidStateTransition,
    ConditionalCheckFailed,
    BuildingExpression,
    MarshalingAttribute,
    UnmarshalingAttribute,
    DynamoDbApi,
}

impl QueueError {
    /// Category tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IdNotProvided => ErrorKind::IdNotProvided,
            Self::IdNotFound { .. } => ErrorKind::IdNotFound,
            Self::IdDuplicated { .. } => ErrorKind::IdDuplicated,
            Self::EmptyQueue => ErrorKind::EmptyQueue,
            Self::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::ConditionalCheckFailed { .. } => ErrorKind::ConditionalCheckFailed,
            Self::BuildingExpression { .. } => ErrorKind::BuildingExpression,
            Self::MarshalingAttribute { .. } => ErrorKind::MarshalingAttribute,
            Self::UnmarshalingAttribute { .. } => ErrorKind::UnmarshalingAttribute,
            Self::DynamoDbApi { .. } => ErrorKind::DynamoDbApi,
        }
    }

    /// Check if the error is transient and a plain retry can succeed.
    ///
    /// A failed conditional check is NOT transient: the observed version is
    /// stale and the caller must re-read state before trying again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DynamoDbApi { .. })
    }

    /// Check if the error should be retried as-is.
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Fold a DynamoDB SDK dispatch error into the taxonomy.
    ///
    /// `ConditionalCheckFailedException` becomes
    /// [`QueueError::ConditionalCheckFailed`]; everything else is a
    /// transport-level [`QueueError::DynamoDbApi`].
    pub(crate) fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata,
        SdkError<E, R>: std::error::Error + Send + Sync + 'static,
    {
        if err.code() == Some("ConditionalCheckFailedException") {
            return Self::ConditionalCheckFailed {
                source: Box::new(err),
            };
        }
        Self::DynamoDbApi {
            source: Box::new(err),
        }
    }
}
