use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use uva_integrations_lambda::adapters::graph::ApiKeyGraphClient;
use uva_integrations_lambda::handlers::connection::handle_connection_status;
use uva_integrations_lambda::handlers::ApiGatewayResponse;

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    let graph_url =
        std::env::var("AppSyncURL").map_err(|_| Error::from("AppSyncURL must be configured"))?;
    let api_key = std::env::var("ApiKey").map_err(|_| Error::from("ApiKey must be configured"))?;

    let graph = ApiKeyGraphClient::new(graph_url, api_key);
    let now_ms = Utc::now().timestamp_millis();

    Ok(handle_connection_status(event.payload, now_ms, &graph))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
