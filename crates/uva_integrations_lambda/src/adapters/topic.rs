use aws_sdk_sns::types::MessageAttributeValue;

/// Publishes one message with string attributes to the configured topic.
pub trait EventTopic {
    fn publish(&self, body: &str, attributes: &[(&str, &str)]) -> Result<(), String>;
}

pub struct SnsEventTopic {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsEventTopic {
    pub fn new(client: aws_sdk_sns::Client, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }
}

impl EventTopic for SnsEventTopic {
    fn publish(&self, body: &str, attributes: &[(&str, &str)]) -> Result<(), String> {
        let client = self.client.clone();
        let topic_arn = self.topic_arn.clone();
        let message = body.to_string();
        let attributes: Vec<(String, String)> = attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut request = client.publish().topic_arn(topic_arn).message(message);
                for (name, value) in attributes {
                    let attribute = MessageAttributeValue::builder()
                        .data_type("String")
                        .string_value(value)
                        .build()
                        .map_err(|error| format!("invalid message attribute: {error}"))?;
                    request = request.message_attributes(name, attribute);
                }

                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to publish to topic: {error}"))
            })
        })
    }
}
