use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use uva_integrations_core::stream::StreamBatch;
use uva_integrations_lambda::adapters::directory::DynamoDeviceDirectory;
use uva_integrations_lambda::adapters::graph::ApiKeyGraphClient;
use uva_integrations_lambda::handlers::device_sync::handle_device_sync;

struct SyncConfig {
    racimo_table: String,
    organization_table: String,
    organization_linkage_index: String,
    location_table: String,
    graph_url: String,
    api_key: String,
}

fn load_config() -> Result<SyncConfig, Error> {
    Ok(SyncConfig {
        racimo_table: std::env::var("RACIMOTable")
            .map_err(|_| Error::from("RACIMOTable must be configured"))?,
        organization_table: std::env::var("OrganizationTable")
            .map_err(|_| Error::from("OrganizationTable must be configured"))?,
        organization_linkage_index: std::env::var("OrganizationLinkageIndex")
            .unwrap_or_else(|_| "linkage_code-index".to_string()),
        location_table: std::env::var("LocationTable")
            .map_err(|_| Error::from("LocationTable must be configured"))?,
        graph_url: std::env::var("AppSyncURL")
            .map_err(|_| Error::from("AppSyncURL must be configured"))?,
        api_key: std::env::var("ApiKey").map_err(|_| Error::from("ApiKey must be configured"))?,
    })
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = load_config()?;

    let batch: StreamBatch = serde_json::from_value(event.payload)
        .map_err(|error| Error::from(format!("invalid stream batch: {error}")))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let directory = DynamoDeviceDirectory::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.racimo_table,
        config.organization_table,
        config.organization_linkage_index,
        config.location_table,
    );
    let graph = ApiKeyGraphClient::new(config.graph_url, config.api_key);

    let outcomes = handle_device_sync(&batch, &directory, &graph);
    Ok(json!({"status": "ok", "outcomes": outcomes}))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
