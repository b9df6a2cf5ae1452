use aws_credential_types::provider::ProvideCredentials;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use uva_integrations_lambda::adapters::graph::SignedGraphClient;
use uva_integrations_lambda::handlers::racimo::handle_racimo_event;
use uva_integrations_lambda::handlers::ApiGatewayResponse;

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    let graph_url =
        std::env::var("AppSyncURL").map_err(|_| Error::from("AppSyncURL must be configured"))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let region = aws_config
        .region()
        .map(|region| region.to_string())
        .ok_or_else(|| Error::from("no AWS region configured"))?;
    let credentials = aws_config
        .credentials_provider()
        .ok_or_else(|| Error::from("no AWS credentials provider configured"))?
        .provide_credentials()
        .await
        .map_err(|error| Error::from(format!("failed to resolve AWS credentials: {error}")))?;

    let graph = SignedGraphClient::new(graph_url, region, credentials);
    handle_racimo_event(event.payload, &graph).map_err(|error| Error::from(error.message))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
