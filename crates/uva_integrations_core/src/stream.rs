use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attribute::{strip_image_types, DecodeError};

/// Timestamp layout every stored `createdAt` field uses.
const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// One change-stream delivery: an ordered batch of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamBatch {
    #[serde(rename = "Records")]
    pub records: Vec<StreamRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRecord {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "dynamodb", default)]
    pub change: Option<RecordChange>,
}

/// Before/after images of the stored item, both optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecordChange {
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Map<String, Value>>,
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Insert,
    Modify,
    Other,
}

impl StreamRecord {
    pub fn event_kind(&self) -> EventKind {
        match self.event_name.as_str() {
            "INSERT" => EventKind::Insert,
            "MODIFY" => EventKind::Modify,
            _ => EventKind::Other,
        }
    }

    pub fn new_image(&self) -> Option<&Map<String, Value>> {
        self.change.as_ref().and_then(|change| change.new_image.as_ref())
    }

    /// Plain-text field of the new image, for point extractions that do not
    /// need the full decoded image.
    pub fn new_image_text_field(&self, field: &str) -> Option<&str> {
        self.new_image()
            .and_then(|image| image.get(field))
            .and_then(|tagged| tagged.get("S"))
            .and_then(Value::as_str)
    }
}

/// A stream record reshaped into the flat event the topic consumers expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlattenedEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub ts: i64,
    pub data: Value,
    pub logs: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlattenError {
    MissingNewImage,
    MissingCreatedAt,
    InvalidCreatedAt(String),
    Decode(DecodeError),
}

impl std::fmt::Display for FlattenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingNewImage => f.write_str("record carries no new image"),
            Self::MissingCreatedAt => f.write_str("record has no createdAt field"),
            Self::InvalidCreatedAt(raw) => write!(f, "createdAt '{raw}' is not a valid timestamp"),
            Self::Decode(error) => write!(f, "failed to decode image: {error}"),
        }
    }
}

impl std::error::Error for FlattenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DecodeError> for FlattenError {
    fn from(error: DecodeError) -> Self {
        Self::Decode(error)
    }
}

/// Flattens an insert record into the relayed event shape.
///
/// Non-insert records yield `Ok(None)`: they are filtered, not failed. The
/// `createdAt` field is required; `id`, `type`, `data`, and `logs` are
/// best-effort, with missing mappings defaulting to empty objects.
pub fn flatten_insert_record(record: &StreamRecord) -> Result<Option<FlattenedEvent>, FlattenError> {
    if record.event_kind() != EventKind::Insert {
        return Ok(None);
    }

    let image = record.new_image().ok_or(FlattenError::MissingNewImage)?;
    let plain = strip_image_types(image)?;

    let created_at = plain
        .get("createdAt")
        .and_then(Value::as_str)
        .ok_or(FlattenError::MissingCreatedAt)?;
    let ts = parse_created_at_ms(created_at)?;

    Ok(Some(FlattenedEvent {
        id: plain.get("uvaID").and_then(Value::as_str).map(str::to_string),
        event_type: plain.get("type").and_then(Value::as_str).map(str::to_string),
        ts,
        data: plain.get("data").cloned().unwrap_or_else(empty_object),
        logs: plain.get("logs").cloned().unwrap_or_else(empty_object),
    }))
}

fn parse_created_at_ms(raw: &str) -> Result<i64, FlattenError> {
    NaiveDateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map(|timestamp| timestamp.and_utc().timestamp_millis())
        .map_err(|_| FlattenError::InvalidCreatedAt(raw.to_string()))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn insert_record(new_image: Value) -> StreamRecord {
        StreamRecord {
            event_name: "INSERT".to_string(),
            change: Some(RecordChange {
                old_image: None,
                new_image: Some(
                    new_image
                        .as_object()
                        .expect("test image should be an object")
                        .clone(),
                ),
            }),
        }
    }

    #[test]
    fn parses_wire_shaped_stream_batch() {
        let batch: StreamBatch = serde_json::from_value(json!({
            "Records": [
                {
                    "eventName": "MODIFY",
                    "dynamodb": {
                        "OldImage": {"id": {"S": "uva-1"}},
                        "NewImage": {"id": {"S": "uva-1"}, "latitude": {"S": "4.60"}}
                    }
                }
            ]
        }))
        .expect("batch should parse");

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].event_kind(), EventKind::Modify);
        assert_eq!(batch.records[0].new_image_text_field("latitude"), Some("4.60"));
    }

    #[test]
    fn classifies_unrecognized_event_names_as_other() {
        let record = StreamRecord {
            event_name: "REMOVE".to_string(),
            change: None,
        };
        assert_eq!(record.event_kind(), EventKind::Other);
    }

    #[test]
    fn non_insert_records_flatten_to_none() {
        let record = StreamRecord {
            event_name: "MODIFY".to_string(),
            change: Some(RecordChange::default()),
        };
        assert_eq!(flatten_insert_record(&record).expect("flatten should pass"), None);
    }

    #[test]
    fn flattens_insert_record_with_epoch_millis() {
        let record = insert_record(json!({
            "uvaID": {"S": "uva-7"},
            "type": {"S": "telemetry"},
            "createdAt": {"S": "2024-01-15T10:30:00.000Z"},
            "data": {"M": {"battery": {"N": "87"}}},
            "logs": {"M": {"boot": {"BOOL": "true"}}}
        }));

        let event = flatten_insert_record(&record)
            .expect("flatten should pass")
            .expect("insert should yield an event");

        assert_eq!(event.id.as_deref(), Some("uva-7"));
        assert_eq!(event.event_type.as_deref(), Some("telemetry"));
        assert_eq!(event.ts, 1_705_314_600_000);
        assert_eq!(event.data, json!({"battery": 87}));
        assert_eq!(event.logs, json!({"boot": true}));
    }

    #[test]
    fn missing_data_and_logs_default_to_empty_mappings() {
        let record = insert_record(json!({
            "uvaID": {"S": "uva-7"},
            "createdAt": {"S": "2024-01-15T10:30:00.000Z"}
        }));

        let event = flatten_insert_record(&record)
            .expect("flatten should pass")
            .expect("insert should yield an event");

        assert_eq!(event.event_type, None);
        assert_eq!(event.data, json!({}));
        assert_eq!(event.logs, json!({}));
    }

    #[test]
    fn missing_created_at_is_a_flatten_error() {
        let record = insert_record(json!({"uvaID": {"S": "uva-7"}}));
        let error = flatten_insert_record(&record).expect_err("flatten should fail");
        assert_eq!(error, FlattenError::MissingCreatedAt);
    }

    #[test]
    fn unparseable_created_at_is_a_flatten_error() {
        let record = insert_record(json!({
            "createdAt": {"S": "15/01/2024 10:30"}
        }));
        let error = flatten_insert_record(&record).expect_err("flatten should fail");
        assert_eq!(
            error,
            FlattenError::InvalidCreatedAt("15/01/2024 10:30".to_string())
        );
    }

    #[test]
    fn missing_new_image_is_a_flatten_error() {
        let record = StreamRecord {
            event_name: "INSERT".to_string(),
            change: None,
        };
        let error = flatten_insert_record(&record).expect_err("flatten should fail");
        assert_eq!(error, FlattenError::MissingNewImage);
    }

    #[test]
    fn decode_failure_surfaces_through_flatten() {
        let record = insert_record(json!({
            "createdAt": {"S": "2024-01-15T10:30:00.000Z"},
            "payload": {"B": "b64"}
        }));
        let error = flatten_insert_record(&record).expect_err("flatten should fail");
        assert!(matches!(error, FlattenError::Decode(_)));
    }
}
