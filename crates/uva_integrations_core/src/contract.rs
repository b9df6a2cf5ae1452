use serde::{Deserialize, Serialize};

/// Hard upper bound the topic enforces on one published message.
pub const MAX_PUBLISH_MESSAGE_BYTES: usize = 256 * 1024;

/// Fixed message attributes every relayed batch is tagged with.
pub const TOPIC_DEVICE_TYPE: &str = "UVA";
pub const TOPIC_DATA_TYPE: &str = "RAW";

/// Model identifier assigned to every device this system creates.
pub const DEVICE_MODEL_ID: &str = "UVA";

/// Location record ids are the device id behind a fixed marker so they
/// never collide with the device's own id.
const LOCATION_ID_MARKER: &str = "A";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RacimoRequest {
    pub name: String,
    #[serde(rename = "linkageCode")]
    pub linkage_code: String,
}

/// The subset of a stored racimo the existence check reports back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RacimoRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "LinkageCode")]
    pub linkage_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_racimo_request(request: RacimoRequest) -> Result<RacimoRequest, ValidationError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::new("name cannot be empty"));
    }

    let linkage_code = request.linkage_code.trim().to_string();
    if linkage_code.is_empty() {
        return Err(ValidationError::new("linkageCode cannot be empty"));
    }

    Ok(RacimoRequest { name, linkage_code })
}

/// Configuration object path assigned to a newly created racimo.
pub fn racimo_config_path(linkage_code: &str) -> String {
    format!("racimos/{linkage_code}/config.json")
}

pub fn location_record_id(device_id: &str) -> String {
    format!("{LOCATION_ID_MARKER}{device_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_racimo_request_trims_fields() {
        let request = RacimoRequest {
            name: " North Field ".to_string(),
            linkage_code: " RC-001 ".to_string(),
        };

        let normalized = normalize_racimo_request(request).expect("request should pass");
        assert_eq!(normalized.name, "North Field");
        assert_eq!(normalized.linkage_code, "RC-001");
    }

    #[test]
    fn normalize_racimo_request_rejects_blank_name() {
        let request = RacimoRequest {
            name: "  ".to_string(),
            linkage_code: "RC-001".to_string(),
        };

        let error = normalize_racimo_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "name cannot be empty");
    }

    #[test]
    fn normalize_racimo_request_rejects_blank_linkage_code() {
        let request = RacimoRequest {
            name: "North Field".to_string(),
            linkage_code: "".to_string(),
        };

        let error = normalize_racimo_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "linkageCode cannot be empty");
    }

    #[test]
    fn derives_racimo_config_path_from_linkage_code() {
        assert_eq!(racimo_config_path("RC-001"), "racimos/RC-001/config.json");
    }

    #[test]
    fn derives_location_record_id_from_device_id() {
        assert_eq!(location_record_id("uva-42"), "Auva-42");
    }

    #[test]
    fn racimo_request_uses_wire_field_names() {
        let request: RacimoRequest =
            serde_json::from_str(r#"{"name":"North Field","linkageCode":"RC-001"}"#)
                .expect("request should parse");
        assert_eq!(request.linkage_code, "RC-001");
    }
}
