//! Network access for the offline controller.
//!
//! `Network::fetch` follows browser fetch semantics: any HTTP response,
//! including 4xx/5xx, is a successful fetch. Only transport failures are
//! errors, and those are what trigger the cache fallbacks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use tracing::debug;

use super::error::OfflineError;
use super::request::{Request, Response};

/// HTTP request timeout in seconds.
/// The controller imposes no timeout of its own; this is the client's.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, OfflineError>;
}

/// Network backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, OfflineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, OfflineError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| OfflineError::InvalidResponse(format!("invalid method: {}", e)))?;

        let response = self.client.request(method, &request.url).send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.bytes().await?.to_vec();
        debug!(url = %request.url, status, content_type = %content_type, bytes = body.len(), "Fetched");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
