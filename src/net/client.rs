//! Network fetch boundary.
//!
//! The `Fetch` trait is the only path to the network; policies depend on it
//! rather than on a concrete HTTP client, which keeps them testable offline.

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::error::FetchError;
use super::types::{Method, Request, Snapshot};

/// Performs a network fetch, reading the body to completion.
///
/// A non-2xx status is not an error; the snapshot carries whatever status
/// the server returned. Errors mean the exchange itself failed (connection
/// refused, interrupted body, offline).
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Snapshot, FetchError>;
}

/// reqwest-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
///
/// No request deadline is configured: the caching policies define no timeout
/// or cancellation anywhere, so a hung fetch holds its task indefinitely.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Patch => reqwest::Method::PATCH,
    }
}

#[async_trait]
impl Fetch for HttpClient {
    async fn fetch(&self, request: &Request) -> Result<Snapshot, FetchError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value =
                header::HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        debug!(url = %request.url, method = %request.method, "fetching from network");

        let response = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    FetchError::Offline(e.to_string())
                } else {
                    FetchError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(n, v)| v.to_str().ok().map(|v| (n.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Snapshot::new(status, headers, body))
    }
}

// ============================================================================
// Tests
// ============================================================================
