use aws_sdk_dynamodb::types::AttributeValue;

use uva_integrations_core::contract::location_record_id;

/// Key-value lookups the device/location synchronizer needs. All three are
/// reads; the store is never written by this system.
pub trait DeviceDirectory {
    /// Linkage code stored on a racimo, by point read.
    fn linkage_code_for_racimo(&self, racimo_id: &str) -> Result<Option<String>, String>;

    /// Organization id whose stored linkage code matches, by index query.
    fn organization_for_linkage_code(&self, linkage_code: &str) -> Result<Option<String>, String>;

    /// Whether a location record already holds coordinates for this device.
    fn device_location_exists(&self, device_id: &str) -> Result<bool, String>;
}

/// DynamoDB-backed directory over the racimo, organization, and location
/// tables.
pub struct DynamoDeviceDirectory {
    client: aws_sdk_dynamodb::Client,
    racimo_table: String,
    organization_table: String,
    organization_linkage_index: String,
    location_table: String,
}

impl DynamoDeviceDirectory {
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        racimo_table: String,
        organization_table: String,
        organization_linkage_index: String,
        location_table: String,
    ) -> Self {
        Self {
            client,
            racimo_table,
            organization_table,
            organization_linkage_index,
            location_table,
        }
    }
}

impl DeviceDirectory for DynamoDeviceDirectory {
    fn linkage_code_for_racimo(&self, racimo_id: &str) -> Result<Option<String>, String> {
        let client = self.client.clone();
        let table = self.racimo_table.clone();
        let key = racimo_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .get_item()
                    .table_name(table)
                    .key("id", AttributeValue::S(key))
                    .send()
                    .await
                    .map_err(|error| format!("failed to read racimo item: {error}"))?;

                Ok(response
                    .item()
                    .and_then(|item| item.get("LinkageCode"))
                    .and_then(|value| value.as_s().ok())
                    .cloned())
            })
        })
    }

    fn organization_for_linkage_code(&self, linkage_code: &str) -> Result<Option<String>, String> {
        let client = self.client.clone();
        let table = self.organization_table.clone();
        let index = self.organization_linkage_index.clone();
        let code = linkage_code.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .query()
                    .table_name(table)
                    .index_name(index)
                    .key_condition_expression("linkage_code = :value")
                    .expression_attribute_values(":value", AttributeValue::S(code))
                    .limit(1)
                    .send()
                    .await
                    .map_err(|error| format!("failed to query organizations: {error}"))?;

                Ok(response
                    .items()
                    .first()
                    .and_then(|item| item.get("id"))
                    .and_then(|value| value.as_s().ok())
                    .cloned())
            })
        })
    }

    fn device_location_exists(&self, device_id: &str) -> Result<bool, String> {
        let client = self.client.clone();
        let table = self.location_table.clone();
        let key = location_record_id(device_id);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .get_item()
                    .table_name(table)
                    .key("id", AttributeValue::S(key))
                    .send()
                    .await
                    .map_err(|error| format!("failed to read location item: {error}"))?;

                Ok(response
                    .item()
                    .map(|item| item.contains_key("latitude"))
                    .unwrap_or(false))
            })
        })
    }
}
