//! Marshaling between typed messages and DynamoDB attribute values.
//!
//! The payload type only has to implement serde traits; everything crosses
//! through `serde_json::Value` on its way to and from the store's attribute
//! representation. Unknown attributes on decode are ignored, and unset
//! string fields round-trip as present empty strings.

use crate::error::QueueError;
use crate::message::Message;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

/// A stored record: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;

/// Encode a message into its attribute-value map.
pub fn marshal_message<T: Serialize>(message: &Message<T>) -> Result<Item, QueueError> {
    let value = serde_json::to_value(message).map_err(|e| QueueError::MarshalingAttribute {
        source: Box::new(e),
    })?;
    match json_to_attribute(&value) {
        AttributeValue::M(map) => Ok(map),
        _ => Err(QueueError::MarshalingAttribute {
            source: "message did not serialize to a map".into(),
        }),
    }
}

/// Decode a message from its attribute-value map.
pub fn unmarshal_message<T: DeserializeOwned>(item: &Item) -> Result<Message<T>, QueueError> {
    unmarshal_item(item)
}

/// Decode any deserializable shape from an attribute-value map.
///
/// Used for projected reads where only a subset of attributes is present.
pub(crate) fn unmarshal_item<D: DeserializeOwned>(item: &Item) -> Result<D, QueueError> {
    let mut fields = serde_json::Map::new();
    for (name, attr) in item {
        // Attribute types with no JSON counterpart (binary, sets) are skipped,
        // same as any attribute the target shape does not know about.
        if let Some(value) = attribute_to_json(attr) {
            fields.insert(name.clone(), value);
        }
    }
    serde_json::from_value(Value::Object(fields)).map_err(|e| QueueError::UnmarshalingAttribute {
        source: Box::new(e),
    })
}

fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), json_to_attribute(value)))
                .collect(),
        ),
    }
}

fn attribute_to_json(attr: &AttributeValue) -> Option<Value> {
    match attr {
        AttributeValue::S(s) => Some(Value::String(s.clone())),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(Value::Number(i.into()))
            } else if let Ok(u) = n.parse::<u64>() {
                Some(Value::Number(u.into()))
            } else if let Ok(f) = n.parse::<f64>() {
                serde_json::Number::from_f64(f).map(Value::Number)
            } else {
                None
            }
        }
        AttributeValue::Bool(b) => Some(Value::Bool(*b)),
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::L(list) => {
            Some(Value::Array(list.iter().filter_map(attribute_to_json).collect()))
        }
        AttributeValue::M(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(name, value)| {
                    attribute_to_json(value).map(|json| (name.clone(), json))
                })
                .collect(),
        )),
        _ => None,
    }
}
