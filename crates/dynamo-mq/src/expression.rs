//! Conditional expression construction for queue mutations and scans.
//!
//! Every attribute name is routed through an `#alias` so reserved words like
//! `status` never collide with the expression grammar, and every operand is a
//! `:placeholder` in the value map.

use crate::error::QueueError;
use crate::message::QueueType;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

#[cfg(test)]
#[path = "expression_tests.rs"]
mod tests;

/// Table attribute names.
pub(crate) mod attr {
    pub const ID: &str = "id";
    pub const QUEUE_TYPE: &str = "queue_type";
    pub const STATUS: &str = "status";
    pub const VERSION: &str = "version";
    pub const RECEIVE_COUNT: &str = "receive_count";
    pub const UPDATED_AT: &str = "updated_at";
    pub const SENT_AT: &str = "sent_at";
    pub const RECEIVED_AT: &str = "received_at";
    pub const QUEUE_ADD_TIMESTAMP: &str = "queue_add_timestamp";
    pub const VISIBILITY_TIMEOUT: &str = "visibility_timeout";
}

/// Primary-key map for point reads and deletes.
pub(crate) fn primary_key(id: &str) -> HashMap<String, AttributeValue> {
    HashMap::from([(attr::ID.to_string(), AttributeValue::S(id.to_string()))])
}

/// A fully parameterized expression set, ready to splice into a store call.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub update: Option<String>,
    pub condition: Option<String>,
    pub key_condition: Option<String>,
    pub projection: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl Expression {
    /// Name map, or `None` when empty (the store rejects empty maps).
    pub fn names_opt(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// Value map, or `None` when empty.
    pub fn values_opt(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

/// Builds the expression families used by the client:
///
/// 1. version-checked updates (`ADD #version :incr` plus `SET` clauses,
///    condition `#version = :expected_version`, optionally narrowed to one
///    queue type);
/// 2. key-condition queries on the queue index, with optional projection.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    sets: Vec<(&'static str, AttributeValue)>,
    expected_version: Option<u64>,
    expected_queue_type: Option<QueueType>,
    key_queue_type: Option<QueueType>,
    projection: Vec<&'static str>,
}

impl ExpressionBuilder {
    /// Add a `SET` clause for one attribute.
    pub fn with_set(mut self, name: &'static str, value: AttributeValue) -> Self {
        self.sets.push((name, value));
        self
    }

    /// Require the stored version to equal `expected` and bump it by one.
    pub fn with_version_condition(mut self, expected: u64) -> Self {
        self.expected_version = Some(expected);
        self
    }

    /// Additionally require the record to still be in `queue_type`.
    pub fn with_queue_type_condition(mut self, queue_type: QueueType) -> Self {
        self.expected_queue_type = Some(queue_type);
        self
    }

    /// Key condition for a queue-index query partitioned on `queue_type`.
    pub fn with_key_queue_type(mut self, queue_type: QueueType) -> Self {
        self.key_queue_type = Some(queue_type);
        self
    }

    /// Project only the given attributes.
    pub fn with_projection(mut self, names: &[&'static str]) -> Self {
        self.projection.extend_from_slice(names);
        self
    }

    /// Assemble the expression strings and parameter maps.
    pub fn build(self) -> Result<Expression, QueueError> {
        if self.sets.is_empty()
            && self.expected_version.is_none()
            && self.key_queue_type.is_none()
            && self.projection.is_empty()
        {
            return Err(QueueError::BuildingExpression {
                source: "no clauses were provided".into(),
            });
        }
        if self.expected_version.is_some() && self.sets.is_empty() {
            return Err(QueueError::BuildingExpression {
                source: "a version-checked update requires at least one SET clause".into(),
            });
        }
        if !self.sets.is_empty() && self.expected_version.is_none() {
            return Err(QueueError::BuildingExpression {
                source: "SET clauses require a version condition".into(),
            });
        }

        let mut expr = Expression::default();

        if let Some(expected) = self.expected_version {
            expr.names
                .insert(format!("#{}", attr::VERSION), attr::VERSION.to_string());
            expr.values
                .insert(":incr".to_string(), AttributeValue::N("1".to_string()));
            expr.values.insert(
                ":expected_version".to_string(),
                AttributeValue::N(expected.to_string()),
            );

            let clauses: Vec<String> = self
                .sets
                .iter()
                .map(|(name, _)| format!("#{name} = :{name}"))
                .collect();
            for (name, value) in self.sets {
                expr.names.insert(format!("#{name}"), name.to_string());
                expr.values.insert(format!(":{name}"), value);
            }
            expr.update = Some(format!(
                "ADD #{} :incr SET {}",
                attr::VERSION,
                clauses.join(", ")
            ));

            let mut condition = format!("#{} = :expected_version", attr::VERSION);
            if let Some(queue_type) = self.expected_queue_type {
                expr.names.insert(
                    format!("#{}", attr::QUEUE_TYPE),
                    attr::QUEUE_TYPE.to_string(),
                );
                expr.values.insert(
                    ":expected_queue_type".to_string(),
                    AttributeValue::S(queue_type.as_str().to_string()),
                );
                condition.push_str(&format!(
                    " AND #{} = :expected_queue_type",
                    attr::QUEUE_TYPE
                ));
            }
            expr.condition = Some(condition);
        }

        if let Some(queue_type) = self.key_queue_type {
            expr.names.insert(
                format!("#{}", attr::QUEUE_TYPE),
                attr::QUEUE_TYPE.to_string(),
            );
            expr.values.insert(
                ":queue_type".to_string(),
                AttributeValue::S(queue_type.as_str().to_string()),
            );
            expr.key_condition = Some(format!("#{} = :queue_type", attr::QUEUE_TYPE));
        }

        if !self.projection.is_empty() {
            let aliases: Vec<String> = self
                .projection
                .iter()
                .map(|name| format!("#{name}"))
                .collect();
            for name in self.projection {
                expr.names.insert(format!("#{name}"), name.to_string());
            }
            expr.projection = Some(aliases.join(", "));
        }

        Ok(expr)
    }
}
