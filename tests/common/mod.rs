//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::time::Duration;

use galle_bouncer::config::HttpConfig;
use galle_bouncer::plugins::source::CrowdSecConfig;
use galle_bouncer::sync::HttpClient;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// API key every mocked LAPI accepts
pub const TEST_API_KEY: &str = "test-bouncer-key";

/// A LAPI decision as returned by `/v1/decisions/stream`
pub fn decision(ip: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "origin": "crowdsec",
        "scenario": "crowdsecurity/http-probing",
        "scope": "Ip",
        "type": "ban",
        "value": ip,
        "duration": "3h59m58s"
    })
}

/// Start a LAPI mock serving `ips` at startup and no changes afterwards
pub async fn start_lapi(ips: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let new: Vec<serde_json::Value> = ips.iter().map(|ip| decision(ip)).collect();

    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .and(query_param("startup", "true"))
        .and(header("X-Api-Key", TEST_API_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "new": new, "deleted": null })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .and(query_param("startup", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "new": null, "deleted": null })),
        )
        .mount(&server)
        .await;

    server
}

/// Start a LAPI mock rejecting every key
pub async fn start_forbidden_lapi() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/decisions/stream"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    server
}

/// HTTP client with short timeouts
pub fn create_test_http_client() -> HttpClient {
    HttpClient::new(HttpConfig {
        timeout_secs: 2,
        connect_timeout_secs: 1,
    })
    .expect("Failed to create HTTP client")
}

/// Stream client configuration pointing at a mocked LAPI
pub fn create_test_crowdsec_config(lapi_url: &str) -> CrowdSecConfig {
    CrowdSecConfig {
        lapi_url: lapi_url.to_string(),
        api_key: TEST_API_KEY.to_string(),
        pull_interval: Duration::from_millis(50),
        scopes: vec!["ip".to_string()],
        decision_types: vec!["ban".to_string()],
    }
}

/// Write a configuration file to a temporary location
pub fn write_config_file(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write config file");
    file
}
