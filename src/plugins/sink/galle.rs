//! Galle control endpoint
//!
//! Galle takes a form-encoded `verb=ban_set&ips=<ip>-<ip>...` POST and
//! answers 200 once the new list is in place.

use async_trait::async_trait;

use crate::error::PushError;
use crate::models::BanSetPayload;
use crate::sync::HttpClient;

use super::EnforcementSink;

/// Sink pushing ban lists to a Galle control URL
#[derive(Debug, Clone)]
pub struct GalleSink {
    url: String,
    http: HttpClient,
}

impl GalleSink {
    /// Create a sink for the given control URL
    pub fn new(url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl EnforcementSink for GalleSink {
    fn target(&self) -> &str {
        &self.url
    }

    async fn replace_ban_set(&self, payload: &BanSetPayload) -> Result<(), PushError> {
        self.http.post_form(&self.url, payload).await
    }
}
