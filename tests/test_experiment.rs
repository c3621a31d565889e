mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeCluster, FakeDriver, MockKubeCluster};
use mockall::Sequence;
use hpa_experiment::error::ExperimentError;
use hpa_experiment::experiment::{next_probe_delay, service_proxy_stats_key, service_proxy_url, HpaExperiment};
use hpa_experiment::experiment_config::ExperimentConfig;
use hpa_experiment::load_profile::LoadLevel;
use hpa_experiment::results::ExperimentResults;
use tokio_util::sync::CancellationToken;

fn config_in(dir: &std::path::Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.results_dir = dir.to_path_buf();
    config.short.run_time = 300.;
    config
}

#[test]
fn test_service_proxy_url() {
    assert_eq!(service_proxy_url("10.0.0.1:8001", "default", "horizontal-deployment"),
               "http://10.0.0.1:8001/api/v1/namespaces/default/services/horizontal-deployment/proxy//");
    assert_eq!(service_proxy_url("https://api.example:6443/", "ns", "svc"),
               "https://api.example:6443/api/v1/namespaces/ns/services/svc/proxy//");
    assert_eq!(service_proxy_stats_key("default", "predictive-deployment"),
               "GET_/api/v1/namespaces/default/services/predictive-deployment/proxy//");
}

#[test]
fn test_next_probe_delay() {
    let interval = Duration::from_secs(30);
    assert_eq!(next_probe_delay(Duration::from_secs(20), interval), Duration::from_secs(10));
    assert_eq!(next_probe_delay(Duration::from_secs(65), interval), Duration::from_secs(25));
    assert_eq!(next_probe_delay(Duration::from_secs(60), interval), interval);
}

#[tokio::test(start_paused = true)]
async fn test_experiment_runs_both_targets() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let driver = Arc::new(FakeDriver::new());
    let experiment = HpaExperiment::new(cluster.clone(), driver.clone(), config_in(dir.path()), "10.0.0.1:8001");

    let results = experiment.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(results.horizontal.replicas, (1..=10).collect::<Vec<u64>>());
    assert_eq!(results.predictive.replicas, (11..=20).collect::<Vec<u64>>());
    assert_eq!(results.horizontal.latency.len(), 10);
    assert_eq!(results.predictive.latency.len(), 10);
    assert!(results.horizontal.load_profile.is_some());

    let calls = cluster.calls();
    assert_eq!(calls.first().unwrap(), "apply horizontal.yaml");
    assert_eq!(cluster.calls_starting_with("apply"), vec!["apply horizontal.yaml", "apply predictive.yaml"]);
    assert_eq!(cluster.calls_starting_with("delete"), vec!["delete horizontal.yaml", "delete predictive.yaml"]);
    assert_eq!(cluster.calls_starting_with("replicas default run=horizontal-deployment").len(), 10);
    assert_eq!(calls.last().unwrap(), "delete predictive.yaml");

    let runs = driver.runs();
    assert_eq!(runs.len(), 20);
    assert_eq!(runs[0].0, "http://10.0.0.1:8001/api/v1/namespaces/default/services/horizontal-deployment/proxy//");
    assert_eq!(runs[10].0, "http://10.0.0.1:8001/api/v1/namespaces/default/services/predictive-deployment/proxy//");
    let levels: Vec<LoadLevel> = runs[..10].iter().map(|(_, level)| *level).collect();
    assert_eq!(levels[5], LoadLevel::new(100, 100.));
    assert!(levels.iter().enumerate().filter(|(i, _)| *i != 5).all(|(_, l)| *l == LoadLevel::new(5, 5.)));

    let saved = ExperimentResults::from_file(dir.path().join("results.json")).unwrap();
    assert_eq!(saved, results);
}

#[tokio::test(start_paused = true)]
async fn test_experiment_keeps_probe_interval() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let driver = Arc::new(FakeDriver::new());
    let mut config = config_in(dir.path());
    config.short.startup_wait = 0.;
    let experiment = HpaExperiment::new(cluster, driver, config, "localhost");

    let start = tokio::time::Instant::now();
    let result = experiment.run_target(&ExperimentConfig::default().short.horizontal, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.latency.len(), 10);
    assert_eq!(start.elapsed(), Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_experiment_cleans_up_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::failing_for("run=predictive-deployment"));
    let driver = Arc::new(FakeDriver::new());
    let experiment = HpaExperiment::new(cluster.clone(), driver, config_in(dir.path()), "localhost");

    let error = experiment.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(error, ExperimentError::NoDeployment { .. }));
    assert_eq!(cluster.calls_starting_with("delete"),
               vec!["delete horizontal.yaml", "delete horizontal.yaml", "delete predictive.yaml"]);
    assert!(!dir.path().join("results.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_experiment_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let driver = Arc::new(FakeDriver::new());
    let experiment = HpaExperiment::new(cluster.clone(), driver.clone(), config_in(dir.path()), "localhost");

    let shutdown = CancellationToken::new();
    let cancel = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(100)).await;
        cancel.cancel();
    });

    let error = experiment.run(&shutdown).await.unwrap_err();

    assert!(matches!(error, ExperimentError::Interrupted));
    // startup wait of 30s, then probes at 0, 30 and 60 seconds
    assert_eq!(driver.runs().len(), 3);
    assert_eq!(cluster.calls_starting_with("delete"), vec!["delete horizontal.yaml", "delete predictive.yaml"]);
    assert!(!dir.path().join("results.json").exists());
}

#[tokio::test]
async fn test_experiment_cleans_up_when_apply_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cluster = MockKubeCluster::new();
    let mut sequence = Sequence::new();
    cluster.expect_apply()
        .withf(|manifest| manifest.ends_with("horizontal.yaml"))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(ExperimentError::Spawn {
            command: "kubectl apply -f horizontal.yaml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "kubectl"),
        }));
    cluster.expect_delete()
        .withf(|manifest| manifest.ends_with("horizontal.yaml"))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));
    cluster.expect_delete()
        .withf(|manifest| manifest.ends_with("predictive.yaml"))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));
    cluster.expect_replica_count().never();

    let driver = Arc::new(FakeDriver::new());
    let experiment = HpaExperiment::new(Arc::new(cluster), driver.clone(), config_in(dir.path()), "localhost:8001");
    let error = experiment.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(error, ExperimentError::Spawn { .. }));
    assert!(driver.runs().is_empty());
    assert!(!experiment.results_path().exists());
}

#[tokio::test]
async fn test_cleanup_continues_after_failed_delete() {
    let dir = tempfile::tempdir().unwrap();
    let mut cluster = MockKubeCluster::new();
    let mut sequence = Sequence::new();
    cluster.expect_delete()
        .withf(|manifest| manifest.ends_with("horizontal.yaml"))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(ExperimentError::NoDeployment {
            namespace: "default".to_string(),
            selector: "run=horizontal-deployment".to_string(),
        }));
    cluster.expect_delete()
        .withf(|manifest| manifest.ends_with("predictive.yaml"))
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));

    let experiment = HpaExperiment::new(Arc::new(cluster), Arc::new(FakeDriver::new()),
                                        config_in(dir.path()), "localhost:8001");
    experiment.cleanup().await;
}
