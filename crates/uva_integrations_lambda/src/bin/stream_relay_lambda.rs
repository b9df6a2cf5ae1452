use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use uva_integrations_core::stream::StreamBatch;
use uva_integrations_lambda::adapters::topic::SnsEventTopic;
use uva_integrations_lambda::handlers::relay::handle_stream_relay;

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let topic_arn =
        std::env::var("SNSTopicARN").map_err(|_| Error::from("SNSTopicARN must be configured"))?;

    let batch: StreamBatch = serde_json::from_value(event.payload)
        .map_err(|error| Error::from(format!("invalid stream batch: {error}")))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let topic = SnsEventTopic::new(aws_sdk_sns::Client::new(&aws_config), topic_arn);

    let outcome = handle_stream_relay(&batch, &topic);
    serde_json::to_value(outcome)
        .map_err(|error| Error::from(format!("failed to serialize relay outcome: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
