use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An owned snapshot of one record read from the log.
///
/// Built by the consume loop from the broker's borrowed message and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Record {
    /// Kafka topic
    pub topic: String,
    /// Kafka partition
    pub partition: i32,
    /// Kafka offset
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Raw message value
    pub payload: Vec<u8>,
    /// Message headers, decoded as UTF-8 text
    pub headers: HashMap<String, String>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

/// A decoded application payload together with its source topic.
///
/// Handlers consuming several topics branch on `topic` to pick the right
/// processing path.
#[derive(Debug, Clone)]
pub struct TypedMessage<T> {
    pub data: T,
    pub topic: String,
}

/// A derived result the handler wants forwarded downstream.
///
/// Returning `None` from the handler, or a `Forward` with an empty topic,
/// means commit-only with no side output.
#[derive(Debug, Clone)]
pub struct Forward {
    /// Destination topic
    pub topic: String,
    /// Optional partition key
    pub key: Option<String>,
    /// Opaque payload, JSON-encoded before publishing
    pub data: serde_json::Value,
}

impl Forward {
    pub fn new(topic: impl Into<String>, key: Option<String>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            key,
            data,
        }
    }
}

/// Terminal failure envelope published to the dead-letter topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DlqEnvelope {
    /// Topic the original record came from
    pub topic: String,
    /// Consuming client id
    pub client_id: String,
    /// Consuming group id
    pub group_id: String,
    /// Raw original payload as text
    pub message: String,
    /// Human-readable failure description
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_envelope_serialization() {
        let envelope = DlqEnvelope {
            topic: "orders".to_string(),
            client_id: "simcon".to_string(),
            group_id: "group".to_string(),
            message: "{not json".to_string(),
            description: "decode message error".to_string(),
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["topic"], "orders");
        assert_eq!(json["client_id"], "simcon");
        assert_eq!(json["group_id"], "group");
        assert_eq!(json["message"], "{not json");
        assert_eq!(json["description"], "decode message error");

        let back: DlqEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_forward_empty_topic_means_no_forwarding() {
        let forward = Forward::new("", None, serde_json::json!({}));
        assert!(forward.topic.is_empty());
    }
}
