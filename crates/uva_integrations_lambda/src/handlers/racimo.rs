use serde_json::{json, Value};

use uva_integrations_core::contract::{
    normalize_racimo_request, racimo_config_path, RacimoRecord, RacimoRequest,
};

use crate::adapters::graph::{GraphClient, GraphRequest};
use crate::handlers::{success_response, validation_error_response, ApiGatewayResponse};

const LIST_RACIMOS_QUERY: &str = r#"
    query ListRacimosByLinkageCode($linkageCode: String!) {
        listRACIMOS(filter: {LinkageCode: {eq: $linkageCode}}) {
            startedAt
            items {
                Name
                LinkageCode
            }
        }
    }
"#;

const CREATE_RACIMO_MUTATION: &str = r#"
    mutation CreateRacimo($linkageCode: String!, $name: String!, $configuration: String!) {
        createRACIMO(input: {LinkageCode: $linkageCode, Name: $name, Configuration: $configuration}) {
            id
        }
    }
"#;

/// Failure that aborts the invocation so the trigger reports an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacimoHandlerError {
    pub message: String,
}

impl std::fmt::Display for RacimoHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RacimoHandlerError {}

impl RacimoHandlerError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves a racimo by linkage code: reports the existing record when one
/// matches, creates one otherwise. Upstream failures and a creation response
/// without an id propagate as handler errors; malformed requests are 400s.
pub fn handle_racimo_event(
    event: Value,
    graph: &impl GraphClient,
) -> Result<ApiGatewayResponse, RacimoHandlerError> {
    let payload = match normalize_apigw_event(event) {
        Ok(value) => value,
        Err(message) => return Ok(validation_error_response(&message)),
    };

    let request = match serde_json::from_value::<RacimoRequest>(payload) {
        Ok(value) => value,
        Err(error) => {
            return Ok(validation_error_response(&format!(
                "Malformed request: {error}"
            )));
        }
    };

    let request = match normalize_racimo_request(request) {
        Ok(value) => value,
        Err(error) => return Ok(validation_error_response(error.message())),
    };

    if let Some(existing) = find_racimo(graph, &request.linkage_code)? {
        return Ok(success_response(
            200,
            json!({
                "success": true,
                "message": "Racimo already exists",
                "result": existing,
            }),
        ));
    }

    let racimo_id = create_racimo(graph, &request)?;
    Ok(success_response(
        200,
        json!({
            "success": true,
            "message": "Racimo created successfully",
            "racimoId": racimo_id,
        }),
    ))
}

fn find_racimo(
    graph: &impl GraphClient,
    linkage_code: &str,
) -> Result<Option<RacimoRecord>, RacimoHandlerError> {
    let response = graph
        .execute(&GraphRequest {
            query: LIST_RACIMOS_QUERY,
            operation_name: Some("ListRacimosByLinkageCode"),
            variables: json!({"linkageCode": linkage_code}),
        })
        .map_err(RacimoHandlerError::new)?;

    let first = response
        .pointer("/data/listRACIMOS/items/0")
        .cloned()
        .unwrap_or(Value::Null);
    if first.is_null() {
        return Ok(None);
    }

    // The filter already matched server-side; the stored code is compared
    // once more before the record is trusted.
    let record: RacimoRecord = match serde_json::from_value(first) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    if record.linkage_code == linkage_code {
        Ok(Some(record))
    } else {
        Ok(None)
    }
}

fn create_racimo(
    graph: &impl GraphClient,
    request: &RacimoRequest,
) -> Result<String, RacimoHandlerError> {
    let response = graph
        .execute(&GraphRequest {
            query: CREATE_RACIMO_MUTATION,
            operation_name: Some("CreateRacimo"),
            variables: json!({
                "linkageCode": request.linkage_code,
                "name": request.name,
                "configuration": racimo_config_path(&request.linkage_code),
            }),
        })
        .map_err(RacimoHandlerError::new)?;

    response
        .pointer("/data/createRACIMO/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RacimoHandlerError::new("racimo creation returned no identifier"))
}

fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}
