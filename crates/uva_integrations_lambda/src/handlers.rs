use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod connection;
pub mod device_sync;
pub mod racimo;
pub mod relay;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

pub(crate) fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: serde_json::to_string(&payload).expect("response payload should serialize"),
    }
}

pub(crate) fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}

pub(crate) fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

/// Structured JSON log line for the log-and-continue handlers.
pub(crate) fn log_handler_event(component: &str, level: &str, event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": level,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
