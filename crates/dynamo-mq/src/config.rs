//! Client configuration and AWS SDK wiring.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Default target table.
pub const DEFAULT_TABLE_NAME: &str = "dynamo-mq-table";

/// Global secondary index every queue scan goes through: partition key
/// `queue_type`, sort key `queue_add_timestamp`, projecting all attributes.
pub const QUEUEING_INDEX_NAME: &str = "dynamo-mq-index-queue_type-queue_add_timestamp";

/// Default AWS region.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Default shared-config credentials profile.
pub const DEFAULT_AWS_PROFILE: &str = "default";

/// Default visibility window for received messages, in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u32 = 30;

/// Default SDK retry budget.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;

/// Page size for queue-index queries.
pub const MAX_QUERY_PAGE_SIZE: i32 = 250;

/// Configuration for a queue client.
///
/// Transport-level retries are the SDK's job and follow
/// `retry_max_attempts`; the client itself never retries a failed
/// conditional check.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target table.
    pub table_name: String,
    /// AWS region for the SDK.
    pub aws_region: String,
    /// Shared-config credentials profile.
    pub aws_credentials_profile: String,
    /// Visibility window applied by `receive_message` unless overridden.
    pub visibility_timeout_secs: u32,
    /// SDK retry budget for transport failures.
    pub retry_max_attempts: u32,
    /// Fail a receive fast when the head of the queue is contended instead
    /// of skipping past it.
    pub use_fifo: bool,
    /// Override for the store endpoint (DynamoDB Local, mock servers).
    pub base_endpoint: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            aws_region: DEFAULT_AWS_REGION.to_string(),
            aws_credentials_profile: DEFAULT_AWS_PROFILE.to_string(),
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            use_fifo: false,
            base_endpoint: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target table.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the AWS region.
    pub fn with_aws_region(mut self, region: impl Into<String>) -> Self {
        self.aws_region = region.into();
        self
    }

    /// Set the shared-config credentials profile.
    pub fn with_aws_credentials_profile(mut self, profile: impl Into<String>) -> Self {
        self.aws_credentials_profile = profile.into();
        self
    }

    /// Set the default visibility window in seconds.
    pub fn with_visibility_timeout_secs(mut self, seconds: u32) -> Self {
        self.visibility_timeout_secs = seconds;
        self
    }

    /// Set the SDK retry budget.
    pub fn with_retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    /// Enable strict head-of-line receive behavior.
    pub fn with_use_fifo(mut self, use_fifo: bool) -> Self {
        self.use_fifo = use_fifo;
        self
    }

    /// Override the store endpoint.
    pub fn with_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.base_endpoint = Some(endpoint.into());
        self
    }

    /// Build a DynamoDB client from this configuration by loading the shared
    /// AWS config (region, profile, credentials chain) and applying the
    /// retry budget and endpoint override.
    pub(crate) async fn connect(&self) -> aws_sdk_dynamodb::Client {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.aws_region.clone()))
            .profile_name(&self.aws_credentials_profile)
            .retry_config(RetryConfig::standard().with_max_attempts(self.retry_max_attempts))
            .load()
            .await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.base_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_dynamodb::Client::from_conf(builder.build())
    }
}
