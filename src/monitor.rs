//! Long experiment: continuous load with a daily pattern next to a replica monitor.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use reqwest::Url;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::error::{ExperimentError, Result};
use crate::experiment_config::ExperimentConfig;
use crate::load_test::{stats_key, LoadDriver};
use crate::results::{LoadSample, ReplicaSample};
use crate::sample_logger::SampleLogger;
use crate::shutdown::{cancellable, sleep_or_cancel};

pub struct LoadMonitor {
    cluster: Arc<dyn Cluster>,
    driver: Arc<dyn LoadDriver>,
    config: ExperimentConfig,
    logger: Mutex<Box<dyn SampleLogger>>,
}

impl LoadMonitor {
    pub fn new(cluster: Arc<dyn Cluster>, driver: Arc<dyn LoadDriver>, config: ExperimentConfig,
               logger: Box<dyn SampleLogger>) -> Self {
        Self {
            cluster,
            driver,
            config,
            logger: Mutex::new(logger),
        }
    }

    /// Runs the load and monitor loops until the token is cancelled.
    /// Failed load runs and replica queries are logged and skipped, failing to store a sample is fatal.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let (load, monitor) = tokio::join!(self.load_loop(shutdown), self.monitor_loop(shutdown));
        // whichever loop fails first takes the other one down with it
        load.and(monitor)
    }

    async fn load_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        let result = self.load_loop_inner(shutdown).await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    }

    async fn load_loop_inner(&self, shutdown: &CancellationToken) -> Result<()> {
        let long = &self.config.long;
        let profile = long.load_profile.build();
        let url = long.url();
        let key = Url::parse(&url)
            .map(|parsed| stats_key("GET", parsed.path()))
            .map_err(|e| ExperimentError::InvalidConfig(format!("invalid url `{}`: {}", url, e)))?;

        while !shutdown.is_cancelled() {
            let now = Utc::now();
            let level = profile.level(0, now);
            info!("Current time: {}, running {} users", now.format("%H:%M"), level.num_clients);

            let stats = match cancellable(shutdown, self.driver.run(&url, level, long.load_run_time())).await {
                Err(ExperimentError::Interrupted) => break,
                Err(e) => return Err(e),
                Ok(Err(e)) => {
                    warn!("Load run failed: {}", e);
                    if sleep_or_cancel(shutdown, long.monitor_interval()).await.is_err() {
                        break;
                    }
                    continue;
                }
                Ok(Ok(stats)) => stats,
            };
            let sample = LoadSample::from_stats(timestamp(now), &stats, &key);
            self.logger.lock().await.log_load(sample)?;
        }
        info!("Shutting down load");
        Ok(())
    }

    async fn monitor_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        let result = self.monitor_loop_inner(shutdown).await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    }

    async fn monitor_loop_inner(&self, shutdown: &CancellationToken) -> Result<()> {
        let long = &self.config.long;
        loop {
            let now = Utc::now();
            let count = cancellable(shutdown,
                                    self.cluster.replica_count(&self.config.namespace, &long.label_selector));
            match count.await {
                Err(ExperimentError::Interrupted) => break,
                Err(e) => return Err(e),
                Ok(Ok(replicas)) => {
                    self.logger.lock().await.log_replicas(ReplicaSample { timestamp: timestamp(now), replicas })?;
                }
                Ok(Err(e)) => warn!("Can't read replica count: {}", e),
            }
            if sleep_or_cancel(shutdown, long.monitor_interval()).await.is_err() {
                break;
            }
        }
        info!("Shutting down monitor");
        Ok(())
    }
}

fn timestamp(time: chrono::DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.
}
