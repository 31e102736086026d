//! HTTP client shared by the CrowdSec stream client and the Galle sink
//!
//! Wraps a single `reqwest::Client` configured with request and connect
//! timeouts, and maps transport failures and status codes into the
//! upstream ([`SourceError`]) and downstream ([`PushError`]) taxonomies.

use crate::config::HttpConfig;
use crate::error::{PushError, SourceError};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the CrowdSec bouncer key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP client with bouncer defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("galle-bouncer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create an HTTP client around a custom reqwest Client
    pub fn with_client(client: Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    /// GET an upstream resource authenticated with an API key
    ///
    /// 401/403 map to [`SourceError::Forbidden`], connect failures and
    /// timeouts to [`SourceError::Timeout`], everything else to
    /// [`SourceError::Other`].
    pub async fn get_with_api_key(
        &self,
        url: &str,
        api_key: &str,
        query: &[(&str, &str)],
    ) -> Result<Bytes, SourceError> {
        debug!(url = url, "Sending HTTP GET request");

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SourceError::Timeout(format!("could not reach {}: {}", url, e))
                } else {
                    SourceError::Other(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        SourceError::Timeout(format!("could not reach {}: {}", url, e))
                    } else {
                        SourceError::Other(e.to_string())
                    }
                })?;
                debug!(url = url, body_size = body.len(), "Received response");
                Ok(body)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = url, status = response.status().as_u16(), "Unauthorized");
                Err(SourceError::Forbidden)
            }
            status => {
                warn!(url = url, status = status.as_u16(), "Unexpected status");
                Err(SourceError::Other(format!("HTTP {}", status.as_u16())))
            }
        }
    }

    /// POST a form-encoded body
    ///
    /// Only HTTP 200 counts as success.
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<(), PushError> {
        debug!(url = url, "Sending HTTP POST request");

        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| PushError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(PushError::Status(status.as_u16())),
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}
