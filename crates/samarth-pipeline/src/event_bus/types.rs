use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Cross-cutting context carried alongside a payload.
pub type Metadata = serde_json::Map<String, Value>;

/// Core event structure for the Event Bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Per-bus monotonic sequence number
    /// Assigned by the bus on publish, orders history
    pub cursor: u64,

    /// Topic (namespace-prefixed)
    /// Examples: "query.received", "data.loaded", "pipeline.error"
    pub topic: String,

    /// Timestamp (ISO 8601)
    pub time: DateTime<Utc>,

    /// Event-specific data, a contract between adjacent stages only
    pub payload: Value,

    /// Context forwarded unchanged by every stage (correlation id, source, ...)
    pub metadata: Metadata,
}

impl Event {
    /// Metadata key holding the request correlation id.
    pub const CORRELATION_ID: &'static str = "correlation_id";

    /// Create a new event (cursor will be assigned by the bus)
    pub fn new(topic: impl Into<String>, payload: Value, metadata: Metadata) -> Self {
        Self {
            cursor: 0, // Will be assigned by the bus
            topic: topic.into(),
            time: Utc::now(),
            payload,
            metadata,
        }
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        correlation_id(&self.metadata)
    }
}

/// Read the correlation id from event metadata.
pub fn correlation_id(metadata: &Metadata) -> Option<Uuid> {
    metadata
        .get(Event::CORRELATION_ID)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Fresh metadata containing only the given correlation id.
pub fn metadata_with_correlation(id: Uuid) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(Event::CORRELATION_ID.to_string(), Value::String(id.to_string()));
    metadata
}

/// Payload published on `pipeline.error` when a stage fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage_name: String,
    pub error_kind: String,
    pub error_message: String,
}
