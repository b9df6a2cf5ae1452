use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use uva_integrations_core::contract::{location_record_id, DEVICE_MODEL_ID};
use uva_integrations_core::stream::{EventKind, StreamBatch, StreamRecord};

use crate::adapters::directory::DeviceDirectory;
use crate::adapters::graph::{GraphClient, GraphRequest};
use crate::handlers::log_handler_event;

const COMPONENT: &str = "device_sync";

const CREATE_DEVICE_MUTATION: &str = r#"
    mutation CreateDevice($id: ID!, $description: String!, $organizationDevicesId: ID, $name: String!, $deviceModelId: ID!) {
        createDevice(input: {id: $id, description: $description, organizationDevicesId: $organizationDevicesId, name: $name, deviceModelId: $deviceModelId}) {
            id
            description
            organizationDevicesId
            name
            deviceModelId
        }
    }
"#;

// The graph schema names the longitude input field `length`.
const CREATE_LOCATION_MUTATION: &str = r#"
    mutation CreateLocation($id: ID!, $deviceLocationsId: ID!, $latitude: Float, $length: Float) {
        createLocation(input: {id: $id, deviceLocationsId: $deviceLocationsId, latitude: $latitude, length: $length}) {
            id
        }
    }
"#;

const UPDATE_LOCATION_MUTATION: &str = r#"
    mutation UpdateLocation($id: ID!, $latitude: Float, $length: Float) {
        updateLocation(input: {id: $id, latitude: $latitude, length: $length}) {
            id
        }
    }
"#;

/// First-class result of synchronizing one stream record. Mutation and
/// lookup failures are outcomes rather than raised errors, so one failed
/// record never aborts the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordSyncOutcome {
    DeviceCreated {
        device_id: String,
        organization_id: Option<String>,
    },
    LocationCreated {
        device_id: String,
    },
    LocationUpdated {
        device_id: String,
    },
    Skipped {
        reason: String,
    },
    LookupFailed {
        message: String,
    },
    MutationFailed {
        device_id: String,
        message: String,
    },
}

/// Walks the batch in delivery order: inserts create a device under the
/// organization resolved from the record's racimo reference, modifies
/// create or update the device's location record. Event kinds other than
/// insert/modify are ignored.
pub fn handle_device_sync(
    batch: &StreamBatch,
    directory: &impl DeviceDirectory,
    graph: &impl GraphClient,
) -> Vec<RecordSyncOutcome> {
    let mut outcomes = Vec::with_capacity(batch.records.len());
    for record in &batch.records {
        match record.event_kind() {
            EventKind::Insert => outcomes.push(process_insert(record, directory, graph)),
            EventKind::Modify => outcomes.push(process_modify(record, directory, graph)),
            EventKind::Other => {}
        }
    }
    outcomes
}

fn process_insert(
    record: &StreamRecord,
    directory: &impl DeviceDirectory,
    graph: &impl GraphClient,
) -> RecordSyncOutcome {
    let Some(device_id) = record.new_image_text_field("id") else {
        return skipped("insert record has no device identifier");
    };
    let Some(racimo_id) = record.new_image_text_field("racimoID") else {
        return skipped("insert record has no racimo reference");
    };

    let linkage_code = match directory.linkage_code_for_racimo(racimo_id) {
        Ok(Some(code)) => code,
        Ok(None) => return skipped("racimo has no linkage code"),
        Err(message) => {
            log_sync_error(
                "linkage_code_lookup_failed",
                json!({"racimo_id": racimo_id, "error": message.clone()}),
            );
            return RecordSyncOutcome::LookupFailed { message };
        }
    };

    // A device is still created when no organization matches; the missing
    // reference stays visible in the log line and the outcome.
    let organization_id = match directory.organization_for_linkage_code(&linkage_code) {
        Ok(Some(id)) => Some(id),
        Ok(None) => {
            log_sync_info(
                "no_organization_for_linkage_code",
                json!({"device_id": device_id, "linkage_code": linkage_code.clone()}),
            );
            None
        }
        Err(message) => {
            log_sync_error(
                "organization_lookup_failed",
                json!({"device_id": device_id, "error": message}),
            );
            None
        }
    };

    let request = GraphRequest {
        query: CREATE_DEVICE_MUTATION,
        operation_name: Some("CreateDevice"),
        variables: json!({
            "id": device_id,
            "description": device_id,
            "organizationDevicesId": organization_id,
            "name": device_id,
            "deviceModelId": DEVICE_MODEL_ID,
        }),
    };
    match graph.execute(&request) {
        Ok(_) => {
            log_sync_info(
                "device_created",
                json!({"device_id": device_id, "organization_id": organization_id.clone()}),
            );
            RecordSyncOutcome::DeviceCreated {
                device_id: device_id.to_string(),
                organization_id,
            }
        }
        Err(message) => mutation_failed(device_id, "create_device_failed", message),
    }
}

fn process_modify(
    record: &StreamRecord,
    directory: &impl DeviceDirectory,
    graph: &impl GraphClient,
) -> RecordSyncOutcome {
    let Some(device_id) = record.new_image_text_field("id") else {
        return skipped("modify record has no device identifier");
    };
    let (Some(latitude), Some(longitude)) = (
        record.new_image_text_field("latitude"),
        record.new_image_text_field("longitude"),
    ) else {
        // No partial location writes: both coordinates or nothing.
        return skipped("modify record carries an incomplete location");
    };

    let location_exists = match directory.device_location_exists(device_id) {
        Ok(exists) => exists,
        Err(message) => {
            log_sync_error(
                "location_existence_check_failed",
                json!({"device_id": device_id, "error": message}),
            );
            false
        }
    };

    let request = if location_exists {
        GraphRequest {
            query: UPDATE_LOCATION_MUTATION,
            operation_name: Some("UpdateLocation"),
            variables: json!({
                "id": location_record_id(device_id),
                "latitude": latitude,
                "length": longitude,
            }),
        }
    } else {
        GraphRequest {
            query: CREATE_LOCATION_MUTATION,
            operation_name: Some("CreateLocation"),
            variables: json!({
                "id": location_record_id(device_id),
                "deviceLocationsId": device_id,
                "latitude": latitude,
                "length": longitude,
            }),
        }
    };

    match graph.execute(&request) {
        Ok(_) if location_exists => {
            log_sync_info("location_updated", json!({"device_id": device_id}));
            RecordSyncOutcome::LocationUpdated {
                device_id: device_id.to_string(),
            }
        }
        Ok(_) => {
            log_sync_info("location_created", json!({"device_id": device_id}));
            RecordSyncOutcome::LocationCreated {
                device_id: device_id.to_string(),
            }
        }
        Err(message) => {
            let event = if location_exists {
                "update_location_failed"
            } else {
                "create_location_failed"
            };
            mutation_failed(device_id, event, message)
        }
    }
}

fn skipped(reason: &str) -> RecordSyncOutcome {
    RecordSyncOutcome::Skipped {
        reason: reason.to_string(),
    }
}

fn mutation_failed(device_id: &str, event: &str, message: String) -> RecordSyncOutcome {
    log_sync_error(
        event,
        json!({"device_id": device_id, "error": message.clone()}),
    );
    RecordSyncOutcome::MutationFailed {
        device_id: device_id.to_string(),
        message,
    }
}

fn log_sync_info(event: &str, details: Value) {
    log_handler_event(COMPONENT, "info", event, details);
}

fn log_sync_error(event: &str, details: Value) {
    log_handler_event(COMPONENT, "error", event, details);
}
