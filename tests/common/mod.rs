#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hpa_experiment::cluster::Cluster;
use hpa_experiment::error::{ExperimentError, Result};
use hpa_experiment::load_profile::LoadLevel;
use hpa_experiment::load_test::{LoadDriver, LoadTestStats, RequestRecorder};
use reqwest::Url;

mockall::mock! {
    pub KubeCluster {}

    #[async_trait]
    impl Cluster for KubeCluster {
        async fn apply(&self, manifest: &Path) -> Result<()>;
        async fn delete(&self, manifest: &Path) -> Result<()>;
        async fn replica_count(&self, namespace: &str, label_selector: &str) -> Result<u64>;
    }
}

/// Cluster recording every call. Replica counts go 1, 2, 3, ... across all queries.
#[derive(Default)]
pub struct FakeCluster {
    pub calls: Mutex<Vec<String>>,
    replica_queries: Mutex<u64>,
    failing_selector: Option<String>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Default::default()
    }

    /// Replica queries for `selector` fail with `NoDeployment`.
    pub fn failing_for(selector: &str) -> Self {
        Self {
            failing_selector: Some(selector.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn apply(&self, manifest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(format!("apply {}", manifest.display()));
        Ok(())
    }

    async fn delete(&self, manifest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(format!("delete {}", manifest.display()));
        Ok(())
    }

    async fn replica_count(&self, namespace: &str, label_selector: &str) -> Result<u64> {
        self.calls.lock().unwrap().push(format!("replicas {} {}", namespace, label_selector));
        if self.failing_selector.as_deref() == Some(label_selector) {
            return Err(ExperimentError::NoDeployment {
                namespace: namespace.to_string(),
                selector: label_selector.to_string(),
            });
        }
        let mut queries = self.replica_queries.lock().unwrap();
        *queries += 1;
        Ok(*queries)
    }
}

/// Load driver sleeping for the run time, then reporting one 100ms request per client.
#[derive(Default)]
pub struct FakeDriver {
    pub runs: Mutex<Vec<(String, LoadLevel)>>,
    fail: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn runs(&self) -> Vec<(String, LoadLevel)> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoadDriver for FakeDriver {
    async fn run(&self, url: &str, level: LoadLevel, run_time: Duration) -> Result<LoadTestStats> {
        let start = {
            let mut runs = self.runs.lock().unwrap();
            runs.push((url.to_string(), level));
            runs.len() as f64
        };
        tokio::time::sleep(run_time).await;
        if self.fail {
            return Err(ExperimentError::InvalidConfig("driver down".to_string()));
        }
        let path = Url::parse(url).unwrap().path().to_string();
        let mut recorder = RequestRecorder::new();
        for _ in 0..level.num_clients {
            recorder.record("GET", &path, 100, true);
        }
        Ok(recorder.finish(start, start + run_time.as_secs_f64()))
    }
}
