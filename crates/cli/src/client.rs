//! HTTP client for the preprocessor endpoint

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use url::Url;

/// Header carrying the caller's trace / custom attributes
pub const CUSTOM_ATTRIBUTES_HEADER: &str = "X-Amzn-SageMaker-Custom-Attributes";

/// One invocation request
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub endpoint_name: String,
    pub content_type: String,
    pub accept: String,
    pub custom_attributes: Option<String>,
    pub body: Vec<u8>,
}

/// Raw response of an invocation
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub custom_attributes: Option<String>,
    pub body: Vec<u8>,
}

/// Client for the serving endpoint
pub struct EndpointClient {
    client: Client,
    base_url: Url,
}

impl EndpointClient {
    /// Create a new endpoint client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid endpoint URL")?;

        Ok(Self { client, base_url })
    }

    /// POST the payload to `endpoints/{name}/invocations`
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse> {
        let path = format!("endpoints/{}/invocations", request.endpoint_name);
        let url = self.base_url.join(&path).context("Invalid endpoint name")?;

        let mut builder = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, &request.content_type)
            .header(header::ACCEPT, &request.accept)
            .body(request.body.clone());
        if let Some(attributes) = &request.custom_attributes {
            builder = builder.header(CUSTOM_ATTRIBUTES_HEADER, attributes);
        }

        let response = builder.send().await.context("Failed to send request")?;

        let status = response.status();
        let content_type = header_string(response.headers(), header::CONTENT_TYPE.as_str());
        let custom_attributes = header_string(response.headers(), CUSTOM_ATTRIBUTES_HEADER);
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();

        Ok(InvokeResponse {
            status,
            content_type,
            custom_attributes,
            body,
        })
    }

    /// GET `/ping`, true when the endpoint reports ready
    pub async fn ping(&self) -> Result<bool> {
        let url = self.base_url.join("ping").context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Ok(response.status().is_success())
    }
}

fn header_string(headers: &header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
