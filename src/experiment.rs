//! Short experiment: HPA vs predictive HPA, one timed run per target.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::error::{ExperimentError, Result};
use crate::experiment_config::{ExperimentConfig, TargetConfig};
use crate::load_test::{stats_key, LoadDriver};
use crate::results::{ExperimentResults, TargetResult};
use crate::shutdown::{cancellable, sleep_or_cancel};

pub const RESULTS_FILE: &str = "results.json";

/// Path of the API server proxy in front of a service.
pub fn service_proxy_path(namespace: &str, service: &str) -> String {
    format!("/api/v1/namespaces/{}/services/{}/proxy/", namespace, service)
}

/// URL the users request: the root of the service behind the API server proxy.
/// `host` may come with or without a scheme, plain http is assumed without one.
pub fn service_proxy_url(host: &str, namespace: &str, service: &str) -> String {
    let host = host.trim_end_matches('/');
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    format!("{}{}/", base, service_proxy_path(namespace, service))
}

/// Key the requests against a service show up under in the load test stats.
pub fn service_proxy_stats_key(namespace: &str, service: &str) -> String {
    stats_key("GET", &format!("{}/", service_proxy_path(namespace, service)))
}

/// Time left until the next probe boundary, counted from the start of the run.
pub fn next_probe_delay(elapsed: Duration, interval: Duration) -> Duration {
    let interval_nanos = interval.as_nanos().max(1);
    let into_interval = elapsed.as_nanos() % interval_nanos;
    Duration::from_nanos((interval_nanos - into_interval) as u64)
}

pub struct HpaExperiment {
    cluster: Arc<dyn Cluster>,
    driver: Arc<dyn LoadDriver>,
    config: ExperimentConfig,
    host: String,
}

impl HpaExperiment {
    /// Creates an experiment reaching the services through the API server proxy at `host`.
    pub fn new(cluster: Arc<dyn Cluster>, driver: Arc<dyn LoadDriver>, config: ExperimentConfig,
               host: impl Into<String>) -> Self {
        Self {
            cluster,
            driver,
            config,
            host: host.into(),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.config.results_dir.join(RESULTS_FILE)
    }

    /// Runs the horizontal target, then the predictive one, and writes `results.json`.
    /// On failure both targets are torn down before the error is returned.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<ExperimentResults> {
        let outcome = async {
            let horizontal = self.run_target(&self.config.short.horizontal, shutdown).await?;
            let predictive = self.run_target(&self.config.short.predictive, shutdown).await?;
            Ok::<_, ExperimentError>(ExperimentResults { horizontal, predictive })
        }.await;

        match outcome {
            Ok(results) => {
                info!("Writing results to {}", self.results_path().display());
                results.save(self.results_path())?;
                Ok(results)
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                self.cleanup().await;
                Err(e)
            }
        }
    }

    /// Runs the chosen target for the configured run time, putting load on it every probe
    /// interval and capturing latency and replica counts over time.
    pub async fn run_target(&self, target: &TargetConfig, shutdown: &CancellationToken) -> Result<TargetResult> {
        let short = &self.config.short;
        cancellable(shutdown, self.cluster.apply(&target.manifest)).await??;

        // let the pods start
        sleep_or_cancel(shutdown, short.startup_wait()).await?;

        let profile = short.load_profile.build();
        let url = service_proxy_url(&self.host, &self.config.namespace, &target.name);
        let selector = target.label_selector();
        let interval = short.probe_interval();
        let mut result = TargetResult {
            load_profile: Some(serde_json::to_value(profile.as_ref())?),
            ..Default::default()
        };

        let start = Instant::now();
        let probe_count = short.probe_count();
        for probe in 0..probe_count {
            let level = profile.level(probe, Utc::now());
            info!("Running probe {}/{} against {}", probe + 1, probe_count, target.name);
            let stats = cancellable(shutdown, self.driver.run(&url, level, short.load_run_time())).await??;
            result.latency.push(stats);

            let replicas = cancellable(shutdown,
                                       self.cluster.replica_count(&self.config.namespace, &selector)).await??;
            info!("Replicas: {}", replicas);
            result.replicas.push(replicas);

            sleep_or_cancel(shutdown, next_probe_delay(start.elapsed(), interval)).await?;
        }

        self.cluster.delete(&target.manifest).await?;
        Ok(result)
    }

    /// Deletes the objects of both targets, logging failures.
    pub async fn cleanup(&self) {
        for target in [&self.config.short.horizontal, &self.config.short.predictive] {
            info!("Deleting {} and its autoscaler", target.name);
            if let Err(e) = self.cluster.delete(&target.manifest).await {
                warn!("Failed to delete {}: {}", target.manifest.display(), e);
            }
        }
    }
}
