use serde_json::{json, Map, Value};

use uva_integrations_core::connection::{connection_status, epoch_ms_from_rfc3339};

use crate::adapters::graph::{GraphClient, GraphRequest};
use crate::handlers::{
    log_handler_event, success_response, validation_error_response, ApiGatewayResponse,
};

const COMPONENT: &str = "connection_status";

/// Path value that requests the explicit comma-separated id list instead of
/// a single device.
pub const ALL_DEVICES_PATH: &str = "all";

const LAST_MEASUREMENT_QUERY: &str = r#"
    query LastMeasurement($uvaID: ID!) {
        measurementsByUvaIDAndTs(uvaID: $uvaID, sortDirection: DESC, limit: 1) {
            items {
                ts
                createdAt
            }
        }
    }
"#;

const DEVICE_CREATED_AT_QUERY: &str = r#"
    query DeviceCreatedAt($uvaID: ID!) {
        getUVA(id: $uvaID) {
            createdAt
        }
    }
"#;

/// Reports whether each requested device connected within the trailing
/// 24-hour window. Devices with neither a measurement nor a creation
/// timestamp map to `null`; a timestamp is never synthesized.
pub fn handle_connection_status(
    event: Value,
    now_ms: i64,
    graph: &impl GraphClient,
) -> ApiGatewayResponse {
    let Some(path_id) = event
        .pointer("/pathParameters/id_uva")
        .and_then(Value::as_str)
    else {
        return validation_error_response("path parameter id_uva is required");
    };

    let ids: Vec<String> = if path_id == ALL_DEVICES_PATH {
        let Some(listed) = event
            .pointer("/queryStringParameters/id")
            .and_then(Value::as_str)
        else {
            return validation_error_response(
                "query parameter id is required when requesting all devices",
            );
        };
        listed.split(',').map(str::to_string).collect()
    } else {
        vec![path_id.to_string()]
    };

    let mut results = Map::with_capacity(ids.len());
    for id in ids {
        let entry = match last_connection_ms(&id, graph) {
            Some(last_connection) => {
                serde_json::to_value(connection_status(last_connection, now_ms))
                    .expect("connection status should serialize")
            }
            None => Value::Null,
        };
        results.insert(id, entry);
    }

    success_response(200, Value::Object(results))
}

/// Most recent measurement timestamp, falling back to the device's own
/// creation timestamp. Query failures are logged and collapse to `None`.
fn last_connection_ms(uva_id: &str, graph: &impl GraphClient) -> Option<i64> {
    let response = match graph.execute(&GraphRequest {
        query: LAST_MEASUREMENT_QUERY,
        operation_name: Some("LastMeasurement"),
        variables: json!({"uvaID": uva_id}),
    }) {
        Ok(value) => value,
        Err(error) => {
            log_query_failure(uva_id, "last_measurement_query_failed", &error);
            return None;
        }
    };

    let measurement_created_at = response
        .pointer("/data/measurementsByUvaIDAndTs/items/0/createdAt")
        .and_then(Value::as_str)
        .and_then(epoch_ms_from_rfc3339);
    if measurement_created_at.is_some() {
        return measurement_created_at;
    }

    device_creation_ms(uva_id, graph)
}

fn device_creation_ms(uva_id: &str, graph: &impl GraphClient) -> Option<i64> {
    let response = match graph.execute(&GraphRequest {
        query: DEVICE_CREATED_AT_QUERY,
        operation_name: Some("DeviceCreatedAt"),
        variables: json!({"uvaID": uva_id}),
    }) {
        Ok(value) => value,
        Err(error) => {
            log_query_failure(uva_id, "creation_date_query_failed", &error);
            return None;
        }
    };

    response
        .pointer("/data/getUVA/createdAt")
        .and_then(Value::as_str)
        .and_then(epoch_ms_from_rfc3339)
}

fn log_query_failure(uva_id: &str, event: &str, error: &str) {
    log_handler_event(
        COMPONENT,
        "error",
        event,
        json!({"uva_id": uva_id, "error": error}),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const NOW_MS: i64 = 1_705_314_600_000;
    const HOUR_MS: i64 = 60 * 60 * 1000;

    struct ScriptedGraph {
        requests: Mutex<Vec<GraphRequest>>,
        responses: Mutex<Vec<Result<Value, String>>>,
    }

    impl ScriptedGraph {
        fn new(responses: Vec<Result<Value, String>>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            }
        }

        fn requests(&self) -> Vec<GraphRequest> {
            self.requests.lock().expect("poisoned mutex").clone()
        }
    }

    impl GraphClient for ScriptedGraph {
        fn execute(&self, request: &GraphRequest) -> Result<Value, String> {
            self.requests
                .lock()
                .expect("poisoned mutex")
                .push(request.clone());
            let mut responses = self.responses.lock().expect("poisoned mutex");
            if responses.is_empty() {
                panic!("graph executed more requests than the test scripted");
            }
            responses.remove(0)
        }
    }

    fn single_device_event(id: &str) -> Value {
        json!({"pathParameters": {"id_uva": id}})
    }

    fn measurement_at(epoch_ms: i64) -> Value {
        let created_at = chrono::DateTime::from_timestamp_millis(epoch_ms)
            .expect("test timestamp should be valid")
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        json!({
            "data": {"measurementsByUvaIDAndTs": {"items": [
                {"ts": epoch_ms, "createdAt": created_at}
            ]}}
        })
    }

    fn no_measurements() -> Value {
        json!({"data": {"measurementsByUvaIDAndTs": {"items": []}}})
    }

    fn parse_body(response: &ApiGatewayResponse) -> Value {
        serde_json::from_str(&response.body).expect("body should parse")
    }

    #[test]
    fn recent_measurement_reports_connected() {
        let graph = ScriptedGraph::new(vec![Ok(measurement_at(NOW_MS - 23 * HOUR_MS))]);
        let response = handle_connection_status(single_device_event("uva-1"), NOW_MS, &graph);

        assert_eq!(response.status_code, 200);
        let body = parse_body(&response);
        assert_eq!(body["uva-1"]["connection"], json!(true));
        assert_eq!(body["uva-1"]["ts"], json!(NOW_MS - 23 * HOUR_MS));
    }

    #[test]
    fn stale_measurement_reports_disconnected() {
        let graph = ScriptedGraph::new(vec![Ok(measurement_at(NOW_MS - 25 * HOUR_MS))]);
        let response = handle_connection_status(single_device_event("uva-1"), NOW_MS, &graph);

        let body = parse_body(&response);
        assert_eq!(body["uva-1"]["connection"], json!(false));
    }

    #[test]
    fn missing_measurement_falls_back_to_creation_date() {
        let graph = ScriptedGraph::new(vec![
            Ok(no_measurements()),
            Ok(json!({"data": {"getUVA": {"createdAt": "2024-01-15T10:30:00.000Z"}}})),
        ]);
        let response = handle_connection_status(single_device_event("uva-1"), NOW_MS, &graph);

        let body = parse_body(&response);
        assert_eq!(body["uva-1"]["ts"], json!(1_705_314_600_000_i64));
        assert_eq!(body["uva-1"]["connection"], json!(true));

        let requests = graph.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].operation_name, Some("DeviceCreatedAt"));
    }

    #[test]
    fn device_without_any_timestamp_maps_to_null() {
        let graph = ScriptedGraph::new(vec![
            Ok(no_measurements()),
            Ok(json!({"data": {"getUVA": null}})),
        ]);
        let response = handle_connection_status(single_device_event("uva-1"), NOW_MS, &graph);

        let body = parse_body(&response);
        assert_eq!(body["uva-1"], Value::Null);
    }

    #[test]
    fn query_failure_collapses_to_null_entry() {
        let graph = ScriptedGraph::new(vec![Err(
            "graph request returned status 500: server error".to_string()
        )]);
        let response = handle_connection_status(single_device_event("uva-1"), NOW_MS, &graph);

        assert_eq!(response.status_code, 200);
        assert_eq!(parse_body(&response)["uva-1"], Value::Null);
    }

    #[test]
    fn fan_out_reports_every_listed_device() {
        let graph = ScriptedGraph::new(vec![
            Ok(measurement_at(NOW_MS - HOUR_MS)),
            Ok(measurement_at(NOW_MS - 30 * HOUR_MS)),
            Ok(no_measurements()),
            Ok(json!({"data": {"getUVA": null}})),
        ]);
        let event = json!({
            "pathParameters": {"id_uva": "all"},
            "queryStringParameters": {"id": "a,b,c"},
        });

        let response = handle_connection_status(event, NOW_MS, &graph);
        let body = parse_body(&response);
        let keys: Vec<&String> = body.as_object().expect("body should be a map").keys().collect();

        assert_eq!(keys.len(), 3);
        assert!(body.get("a").is_some());
        assert!(body.get("b").is_some());
        assert!(body.get("c").is_some());
        assert_eq!(body["a"]["connection"], json!(true));
        assert_eq!(body["b"]["connection"], json!(false));
        assert_eq!(body["c"], Value::Null);
    }

    #[test]
    fn fan_out_without_id_list_is_a_validation_response() {
        let graph = ScriptedGraph::new(Vec::new());
        let response = handle_connection_status(single_device_event("all"), NOW_MS, &graph);

        assert_eq!(response.status_code, 400);
        assert!(graph.requests().is_empty());
    }

    #[test]
    fn missing_path_parameter_is_a_validation_response() {
        let graph = ScriptedGraph::new(Vec::new());
        let response = handle_connection_status(json!({}), NOW_MS, &graph);

        assert_eq!(response.status_code, 400);
    }
}
