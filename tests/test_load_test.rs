use std::time::Duration;

use hpa_experiment::experiment_config::{BasicAuth, LoadConfig};
use hpa_experiment::load_profile::LoadLevel;
use hpa_experiment::load_test::{stats_key, HttpLoadDriver, LoadDriver, LoadTestStats, RequestRecorder};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_users() -> LoadConfig {
    LoadConfig {
        min_wait: 0.01,
        max_wait: 0.02,
        ..Default::default()
    }
}

#[test]
fn test_recorder_aggregates_per_request() {
    let mut recorder = RequestRecorder::new();
    for (time, success) in [(40, true), (10, true), (30, false), (20, true)] {
        recorder.record("GET", "/", time, success);
    }
    recorder.record("GET", "/other", 7, false);
    assert_eq!(recorder.num_requests(), 5);

    let stats = recorder.finish(10., 30.);
    assert_eq!(stats.start_time, 10.);
    assert_eq!(stats.end_time, 30.);
    assert_eq!(stats.num_requests, 5);
    assert_eq!(stats.num_requests_fail, 2);

    let root = &stats.requests[&stats_key("GET", "/")];
    assert_eq!(root.name, "/");
    assert_eq!(root.method, "GET");
    assert_eq!(root.num_requests, 4);
    assert_eq!(root.num_failures, 1);
    assert_eq!(root.avg_response_time, 25.);
    assert_eq!(root.min_response_time, 10.);
    assert_eq!(root.max_response_time, 40.);
    assert_eq!(root.median_response_time, 20.);

    let other = &stats.requests["GET_/other"];
    assert_eq!(other.median_response_time, 7.);
    assert_eq!(other.num_failures, 1);
}

#[test]
fn test_fail_percentage() {
    assert_eq!(LoadTestStats::default().fail_percentage(), 0.);
    let stats = LoadTestStats {
        num_requests: 8,
        num_requests_fail: 2,
        ..Default::default()
    };
    assert_eq!(stats.fail_percentage(), 25.);
}

#[tokio::test]
async fn test_http_driver_sends_authenticated_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let config = LoadConfig {
        auth: Some(BasicAuth { username: "user".to_string(), password: Some("pass".to_string()) }),
        ..fast_users()
    };
    let driver = HttpLoadDriver::new(&config).unwrap();
    let stats = driver.run(&format!("{}/", server.uri()), LoadLevel::new(3, 20.), Duration::from_millis(500))
        .await
        .unwrap();

    assert!(stats.num_requests > 0);
    assert_eq!(stats.num_requests_fail, 0);
    assert!(stats.end_time >= stats.start_time);
    let root = &stats.requests["GET_/"];
    assert_eq!(root.num_requests, stats.num_requests);
    assert!(root.min_response_time <= root.median_response_time);
    assert!(root.median_response_time <= root.max_response_time);
}

#[tokio::test]
async fn test_http_driver_counts_error_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let driver = HttpLoadDriver::new(&fast_users()).unwrap();
    let stats = driver.run(&format!("{}/api/", server.uri()), LoadLevel::new(2, 10.), Duration::from_millis(300))
        .await
        .unwrap();

    assert!(stats.num_requests > 0);
    assert_eq!(stats.num_requests_fail, stats.num_requests);
    assert!(stats.requests.contains_key("GET_/api/"));
}

#[tokio::test]
async fn test_http_driver_rejects_invalid_url() {
    let driver = HttpLoadDriver::new(&fast_users()).unwrap();
    let result = driver.run("not a url", LoadLevel::new(1, 1.), Duration::from_millis(10)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_http_driver_without_users() {
    let driver = HttpLoadDriver::new(&fast_users()).unwrap();
    let stats = driver.run("http://127.0.0.1:9/", LoadLevel::new(0, 1.), Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(stats.num_requests, 0);
    assert!(stats.requests.is_empty());
}

#[tokio::test]
async fn test_http_driver_rejects_non_finite_settings() {
    let config = LoadConfig { request_timeout: f64::INFINITY, ..fast_users() };
    assert!(HttpLoadDriver::new(&config).is_err());
    let config = LoadConfig { min_wait: f64::NAN, ..fast_users() };
    assert!(HttpLoadDriver::new(&config).is_err());

    let driver = HttpLoadDriver::new(&fast_users()).unwrap();
    let result = driver.run("http://127.0.0.1:9/", LoadLevel::new(1, f64::NAN), Duration::from_millis(10)).await;
    assert!(result.is_err());
}
