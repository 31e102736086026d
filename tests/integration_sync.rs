//! Synchronization integration tests
//!
//! Runs the scheduler against a mocked CrowdSec LAPI and a mocked Galle
//! control endpoint:
//! - End-to-end push of the decision set
//! - Fatal credential rejection
//! - Downstream failures do not stop the loop
//! - Configuration errors are caught before anything is wired

mod common;

use std::sync::Arc;
use std::time::Duration;

use galle_bouncer::config::{Config, ConfigError, RetryConfig};
use galle_bouncer::error::{SourceError, SyncError};
use galle_bouncer::plugins::sink::GalleSink;
use galle_bouncer::plugins::source::CrowdSecStreamClient;
use galle_bouncer::sync::{SchedulerConfig, SyncScheduler};
use tokio::sync::broadcast;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    create_test_crowdsec_config, create_test_http_client, start_forbidden_lapi, start_lapi,
    write_config_file,
};

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(100),
        startup_retry: RetryConfig {
            backoff_secs: 1,
            max_retries: Some(3),
        },
    }
}

fn build_scheduler(
    lapi: &MockServer,
    galle_url: String,
    shutdown_rx: broadcast::Receiver<()>,
) -> SyncScheduler {
    let http = create_test_http_client();
    let source = Arc::new(CrowdSecStreamClient::new(
        create_test_crowdsec_config(&lapi.uri()),
        http.clone(),
    ));
    let sink = Arc::new(GalleSink::new(galle_url, http));
    SyncScheduler::new(scheduler_config(), source, sink, shutdown_rx)
}

/// Test 1: Decisions from the LAPI end up in Galle, every cycle
#[tokio::test]
async fn test_end_to_end_push() {
    let lapi = start_lapi(&["5.6.7.8", "1.2.3.4"]).await;
    let galle = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .and(body_string("verb=ban_set&ips=1.2.3.4-5.6.7.8"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&galle)
        .await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = build_scheduler(&lapi, format!("{}/control", galle.uri()), shutdown_rx);
    let handle = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(350)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("Scheduler did not stop");
    assert!(result.unwrap().is_ok());

    let requests = galle.received_requests().await.unwrap();
    assert!(requests.len() >= 2, "got {} pushes", requests.len());
    for request in &requests {
        assert_eq!(request.body, requests[0].body);
    }
}

/// Test 2: A rejected API key ends the run before any push
#[tokio::test]
async fn test_forbidden_never_pushes() {
    let lapi = start_forbidden_lapi().await;
    let galle = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&galle)
        .await;

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = build_scheduler(&lapi, format!("{}/control", galle.uri()), shutdown_rx);

    let result = tokio::time::timeout(Duration::from_secs(2), scheduler.run())
        .await
        .expect("Scheduler did not return");

    assert_eq!(
        result.unwrap_err(),
        SyncError::Source(SourceError::Forbidden)
    );
}

/// Test 3: Galle answering 503 does not stop the loop
#[tokio::test]
async fn test_unavailable_galle_keeps_looping() {
    let lapi = start_lapi(&["1.2.3.4"]).await;
    let galle = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&galle)
        .await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = build_scheduler(&lapi, format!("{}/control", galle.uri()), shutdown_rx);
    let handle = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("Scheduler did not stop");
    assert!(result.unwrap().is_ok());

    let requests = galle.received_requests().await.unwrap();
    assert!(requests.len() >= 3, "got {} pushes", requests.len());
}

/// Test 4: Unreachable Galle does not stop the loop
#[tokio::test]
async fn test_unreachable_galle_keeps_looping() {
    let lapi = start_lapi(&["1.2.3.4"]).await;

    // Bind then drop a listener so the port is closed
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = build_scheduler(&lapi, format!("http://{}/control", addr), shutdown_rx);
    let handle = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("Scheduler did not stop");
    assert!(result.unwrap().is_ok());
}

/// Test 5: Missing option in the file is reported by name
#[test]
fn test_config_file_missing_option() {
    let file = write_config_file(
        r#"
general:
  log_level: info
  crowdsec_api_key: key
  crowdsec_lapi_url: http://127.0.0.1:8080/
  galle_control_url: http://127.0.0.1:8000/control
"#,
    );

    let result = Config::from_file(file.path()).unwrap().validate();

    assert_eq!(
        result.unwrap_err(),
        ConfigError::MissingRequired("general.poll_interval".to_string())
    );
}

/// Test 6: Non-positive poll intervals are rejected
#[test]
fn test_config_file_non_positive_interval() {
    for interval in ["0", "-5"] {
        let file = write_config_file(&format!(
            r#"
general:
  log_level: info
  crowdsec_api_key: key
  crowdsec_lapi_url: http://127.0.0.1:8080/
  galle_control_url: http://127.0.0.1:8000/control
  poll_interval: {}
"#,
            interval
        ));

        let result = Config::from_file(file.path()).unwrap().validate();

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}

/// Test 7: Example configuration validates once the key is set
#[test]
fn test_example_config_is_valid() {
    std::env::set_var("CROWDSEC_API_KEY", "example-key");
    let file = write_config_file(&Config::example());

    let config = Config::from_file(file.path()).unwrap().validate().unwrap();

    assert_eq!(config.crowdsec_api_key, "example-key");
    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert_eq!(SchedulerConfig::from(&config).startup_retry.backoff_secs, 20);
}
