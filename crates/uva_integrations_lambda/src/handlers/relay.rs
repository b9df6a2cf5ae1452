use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use uva_integrations_core::contract::{
    MAX_PUBLISH_MESSAGE_BYTES, TOPIC_DATA_TYPE, TOPIC_DEVICE_TYPE,
};
use uva_integrations_core::stream::{flatten_insert_record, StreamBatch};

use crate::adapters::topic::EventTopic;
use crate::handlers::log_handler_event;

const COMPONENT: &str = "stream_relay";

/// First-class result of relaying one stream batch. The handler never
/// raises; size violations and publish failures are outcomes, not errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelayOutcome {
    Published {
        events_published: usize,
        message_bytes: usize,
    },
    SizeExceeded {
        message_bytes: usize,
    },
    PublishFailed {
        message: String,
    },
}

/// Filters the batch to insert records, flattens each, and publishes the
/// whole set as one message. Records that fail to flatten are logged and
/// skipped so the rest of the batch still ships.
pub fn handle_stream_relay(batch: &StreamBatch, topic: &impl EventTopic) -> RelayOutcome {
    let mut events = Vec::with_capacity(batch.records.len());
    for (index, record) in batch.records.iter().enumerate() {
        match flatten_insert_record(record) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(error) => {
                log_relay_error(
                    "record_flatten_failed",
                    json!({
                        "record_index": index,
                        "event_name": record.event_name.clone(),
                        "error": error.to_string(),
                    }),
                );
            }
        }
    }

    let body = serde_json::to_string(&events).expect("flattened events should serialize");
    let message_bytes = body.len();
    if message_bytes > MAX_PUBLISH_MESSAGE_BYTES {
        log_relay_error(
            "message_size_exceeded",
            json!({
                "message_bytes": message_bytes,
                "limit_bytes": MAX_PUBLISH_MESSAGE_BYTES,
            }),
        );
        return RelayOutcome::SizeExceeded { message_bytes };
    }

    let attributes = [
        ("typeDevice", TOPIC_DEVICE_TYPE),
        ("typeData", TOPIC_DATA_TYPE),
    ];
    match topic.publish(&body, &attributes) {
        Ok(()) => {
            log_relay_info(
                "batch_published",
                json!({
                    "events_published": events.len(),
                    "message_bytes": message_bytes,
                }),
            );
            RelayOutcome::Published {
                events_published: events.len(),
                message_bytes,
            }
        }
        Err(message) => {
            log_relay_error("publish_failed", json!({"error": message.clone()}));
            RelayOutcome::PublishFailed { message }
        }
    }
}

fn log_relay_info(event: &str, details: Value) {
    log_handler_event(COMPONENT, "info", event, details);
}

fn log_relay_error(event: &str, details: Value) {
    log_handler_event(COMPONENT, "error", event, details);
}
