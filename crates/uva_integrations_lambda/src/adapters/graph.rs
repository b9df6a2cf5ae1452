use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use serde_json::{json, Value};

/// One query or mutation against the graph API.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    pub query: &'static str,
    pub operation_name: Option<&'static str>,
    pub variables: Value,
}

impl GraphRequest {
    pub fn body(&self) -> Value {
        match self.operation_name {
            Some(operation_name) => json!({
                "query": self.query,
                "operationName": operation_name,
                "variables": self.variables,
            }),
            None => json!({
                "query": self.query,
                "variables": self.variables,
            }),
        }
    }
}

/// Executes graph requests and returns the parsed response document.
/// Implementations map non-success statuses and transport failures to `Err`.
pub trait GraphClient {
    fn execute(&self, request: &GraphRequest) -> Result<Value, String>;
}

/// Graph client for query-only paths, authenticated with a static API key.
pub struct ApiKeyGraphClient {
    url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl ApiKeyGraphClient {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }
}

impl GraphClient for ApiKeyGraphClient {
    fn execute(&self, request: &GraphRequest) -> Result<Value, String> {
        let body = request.body();
        let url = self.url.clone();
        let api_key = self.api_key.clone();
        let client = self.http_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .post(&url)
                    .header("x-api-key", &api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|error| format!("graph request failed: {error}"))?;
                parse_graph_response(response).await
            })
        })
    }
}

/// Graph client for elevated-trust paths, signing each request with the
/// invocation role's credentials.
pub struct SignedGraphClient {
    url: String,
    region: String,
    credentials: Credentials,
    http_client: reqwest::Client,
}

impl SignedGraphClient {
    pub fn new(url: String, region: String, credentials: Credentials) -> Self {
        Self {
            url,
            region,
            credentials,
            http_client: reqwest::Client::new(),
        }
    }

    /// Headers carrying the request signature, computed over the exact body
    /// that is sent.
    fn signing_headers(&self, body: &str) -> Result<Vec<(String, String)>, String> {
        let identity = self.credentials.clone().into();
        let signing_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name("appsync")
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|error| format!("failed to build signing parameters: {error}"))?
            .into();

        let signable_request = SignableRequest::new(
            "POST",
            self.url.as_str(),
            std::iter::once(("content-type", "application/json")),
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|error| format!("failed to prepare request for signing: {error}"))?;

        let (signing_instructions, _signature) = sign(signable_request, &signing_params)
            .map_err(|error| format!("failed to sign graph request: {error}"))?
            .into_parts();

        Ok(signing_instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

impl GraphClient for SignedGraphClient {
    fn execute(&self, request: &GraphRequest) -> Result<Value, String> {
        let body = serde_json::to_string(&request.body())
            .map_err(|error| format!("failed to serialize graph request: {error}"))?;
        let signed_headers = self.signing_headers(&body)?;
        let url = self.url.clone();
        let client = self.http_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut outgoing = client
                    .post(&url)
                    .header("content-type", "application/json");
                for (name, value) in &signed_headers {
                    outgoing = outgoing.header(name, value);
                }
                let response = outgoing
                    .body(body)
                    .send()
                    .await
                    .map_err(|error| format!("graph request failed: {error}"))?;
                parse_graph_response(response).await
            })
        })
    }
}

async fn parse_graph_response(response: reqwest::Response) -> Result<Value, String> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(format!("graph request returned status {status}: {detail}"));
    }
    response
        .json::<Value>()
        .await
        .map_err(|error| format!("graph response was not valid json: {error}"))
}
