//! Experiment configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};
use crate::load_profile::LoadProfileConfig;

/// Environment variables holding HTTP basic auth credentials of the API server proxy.
pub const AUTH_USER_ENV: &str = "AUTH_USER";
pub const AUTH_PASS_ENV: &str = "AUTH_PASS";

/// HTTP basic auth credentials.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// Deployment under test together with the manifest creating it and its autoscaler.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Deployment and service name, pods are labelled `run=<name>`.
    pub name: String,
    /// Manifest passed to `kubectl apply -f`.
    pub manifest: PathBuf,
}

impl TargetConfig {
    pub fn new(name: &str, manifest: &str) -> Self {
        Self {
            name: name.to_string(),
            manifest: PathBuf::from(manifest),
        }
    }

    pub fn label_selector(&self) -> String {
        format!("run={}", self.name)
    }
}

/// Settings of the synthetic users.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Minimum wait between two requests of one user, in seconds.
    pub min_wait: f64,
    /// Maximum wait between two requests of one user, in seconds.
    pub max_wait: f64,
    /// Per request timeout in seconds.
    pub request_timeout: f64,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub auth: Option<BasicAuth>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            min_wait: 0.1,
            max_wait: 1.0,
            request_timeout: 10.0,
            insecure: true,
            auth: None,
        }
    }
}

/// Holds configuration of the short experiment: one timed run per autoscaler.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ShortExperimentConfig {
    /// Duration of the run for each target, in seconds.
    pub run_time: f64,
    /// Time between probes in seconds.
    pub probe_interval: f64,
    /// Wait after applying a manifest before the first probe, in seconds.
    pub startup_wait: f64,
    /// Duration of the load run of a single probe, in seconds.
    pub load_run_time: f64,
    pub load_profile: LoadProfileConfig,
    /// Target scaled by the stock horizontal pod autoscaler.
    pub horizontal: TargetConfig,
    /// Target scaled by the predictive horizontal pod autoscaler.
    pub predictive: TargetConfig,
}

impl Default for ShortExperimentConfig {
    fn default() -> Self {
        Self {
            run_time: 1800.,
            probe_interval: 30.,
            startup_wait: 30.,
            load_run_time: 20.,
            load_profile: LoadProfileConfig::default_short(),
            horizontal: TargetConfig::new("horizontal-deployment", "horizontal.yaml"),
            predictive: TargetConfig::new("predictive-deployment", "predictive.yaml"),
        }
    }
}

impl ShortExperimentConfig {
    pub fn probe_count(&self) -> u64 {
        (self.run_time / self.probe_interval) as u64
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs_f64(self.probe_interval)
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_secs_f64(self.startup_wait)
    }

    pub fn load_run_time(&self) -> Duration {
        Duration::from_secs_f64(self.load_run_time)
    }
}

/// Holds configuration of the long experiment, which runs in-cluster next to a single target.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LongExperimentConfig {
    /// Base URL of the target service.
    pub host: String,
    /// Path requested by every user.
    pub request_path: String,
    pub label_selector: String,
    /// Duration of a single load run in seconds.
    pub load_run_time: f64,
    /// Time between replica samples in seconds.
    pub monitor_interval: f64,
    pub load_profile: LoadProfileConfig,
    /// File name of the replica samples, relative to the target's results directory.
    pub replicas_file: String,
    /// File name of the load samples, relative to the target's results directory.
    pub load_file: String,
}

impl Default for LongExperimentConfig {
    fn default() -> Self {
        Self {
            host: "http://experiment-deployment.default.svc.cluster.local".to_string(),
            request_path: "/".to_string(),
            label_selector: "run=experiment-deployment".to_string(),
            load_run_time: 300.,
            monitor_interval: 15.,
            load_profile: LoadProfileConfig::default_long(),
            replicas_file: "replicas.csv".to_string(),
            load_file: "load.csv".to_string(),
        }
    }
}

impl LongExperimentConfig {
    pub fn load_run_time(&self) -> Duration {
        Duration::from_secs_f64(self.load_run_time)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitor_interval)
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.request_path)
    }
}

/// Holds raw experiment config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawExperimentConfig {
    pub namespace: Option<String>,
    pub results_dir: Option<PathBuf>,
    pub load: Option<RawLoadConfig>,
    pub short: Option<RawShortExperimentConfig>,
    pub long: Option<RawLongExperimentConfig>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawLoadConfig {
    pub min_wait: Option<f64>,
    pub max_wait: Option<f64>,
    pub request_timeout: Option<f64>,
    pub insecure: Option<bool>,
    pub auth: Option<BasicAuth>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawShortExperimentConfig {
    pub run_time: Option<f64>,
    pub probe_interval: Option<f64>,
    pub startup_wait: Option<f64>,
    pub load_run_time: Option<f64>,
    pub load_profile: Option<LoadProfileConfig>,
    pub horizontal: Option<TargetConfig>,
    pub predictive: Option<TargetConfig>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawLongExperimentConfig {
    pub host: Option<String>,
    pub request_path: Option<String>,
    pub label_selector: Option<String>,
    pub load_run_time: Option<f64>,
    pub monitor_interval: Option<f64>,
    pub load_profile: Option<LoadProfileConfig>,
    pub replicas_file: Option<String>,
    pub load_file: Option<String>,
}

/// Represents experiment configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Namespace the targets are deployed to.
    pub namespace: String,
    /// Directory results are written to and read from.
    pub results_dir: PathBuf,
    pub load: LoadConfig,
    pub short: ShortExperimentConfig,
    pub long: LongExperimentConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            results_dir: PathBuf::from("results"),
            load: LoadConfig::default(),
            short: ShortExperimentConfig::default(),
            long: LongExperimentConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_file(file_name: impl AsRef<Path>) -> Result<Self> {
        let path = file_name.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ExperimentError::io(path, e))?;
        let raw: RawExperimentConfig = serde_yaml::from_str(&content)
            .map_err(|source| ExperimentError::Yaml { path: path.to_path_buf(), source })?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawExperimentConfig) -> Self {
        let defaults = Self::default();

        let load = raw.load.unwrap_or_default();
        let short = raw.short.unwrap_or_default();
        let long = raw.long.unwrap_or_default();

        Self {
            namespace: raw.namespace.unwrap_or(defaults.namespace),
            results_dir: raw.results_dir.unwrap_or(defaults.results_dir),
            load: LoadConfig {
                min_wait: load.min_wait.unwrap_or(defaults.load.min_wait),
                max_wait: load.max_wait.unwrap_or(defaults.load.max_wait),
                request_timeout: load.request_timeout.unwrap_or(defaults.load.request_timeout),
                insecure: load.insecure.unwrap_or(defaults.load.insecure),
                auth: load.auth,
            },
            short: ShortExperimentConfig {
                run_time: short.run_time.unwrap_or(defaults.short.run_time),
                probe_interval: short.probe_interval.unwrap_or(defaults.short.probe_interval),
                startup_wait: short.startup_wait.unwrap_or(defaults.short.startup_wait),
                load_run_time: short.load_run_time.unwrap_or(defaults.short.load_run_time),
                load_profile: short.load_profile.unwrap_or(defaults.short.load_profile),
                horizontal: short.horizontal.unwrap_or(defaults.short.horizontal),
                predictive: short.predictive.unwrap_or(defaults.short.predictive),
            },
            long: LongExperimentConfig {
                host: long.host.unwrap_or(defaults.long.host),
                request_path: long.request_path.unwrap_or(defaults.long.request_path),
                label_selector: long.label_selector.unwrap_or(defaults.long.label_selector),
                load_run_time: long.load_run_time.unwrap_or(defaults.long.load_run_time),
                monitor_interval: long.monitor_interval.unwrap_or(defaults.long.monitor_interval),
                load_profile: long.load_profile.unwrap_or(defaults.long.load_profile),
                replicas_file: long.replicas_file.unwrap_or(defaults.long.replicas_file),
                load_file: long.load_file.unwrap_or(defaults.long.load_file),
            },
        }
    }

    /// Overrides basic auth credentials from `AUTH_USER` / `AUTH_PASS`.
    pub fn apply_env(&mut self) {
        self.apply_auth_vars(|name| std::env::var(name).ok());
    }

    pub fn apply_auth_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(username) = lookup(AUTH_USER_ENV) {
            self.load.auth = Some(BasicAuth {
                username,
                password: lookup(AUTH_PASS_ENV),
            });
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExperimentError::InvalidConfig(msg));

        for (name, value) in [
            ("load.min_wait", self.load.min_wait),
            ("load.max_wait", self.load.max_wait),
            ("short.startup_wait", self.short.startup_wait),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return invalid(format!("{} must be a finite non-negative number of seconds, got {}", name, value));
            }
        }
        if self.load.min_wait > self.load.max_wait {
            return invalid(format!("wait range [{}, {}] is empty", self.load.min_wait, self.load.max_wait));
        }
        for (name, value) in [
            ("load.request_timeout", self.load.request_timeout),
            ("short.run_time", self.short.run_time),
            ("short.probe_interval", self.short.probe_interval),
            ("short.load_run_time", self.short.load_run_time),
            ("long.load_run_time", self.long.load_run_time),
            ("long.monitor_interval", self.long.monitor_interval),
        ] {
            if Duration::try_from_secs_f64(value).is_err() || value <= 0. {
                return invalid(format!("{} must be a finite positive number of seconds, got {}", name, value));
            }
        }
        if self.short.load_run_time > self.short.probe_interval {
            return invalid(format!("short.load_run_time ({}s) exceeds short.probe_interval ({}s)",
                                   self.short.load_run_time, self.short.probe_interval));
        }
        if self.short.horizontal.name == self.short.predictive.name {
            return invalid("horizontal and predictive targets must differ".to_string());
        }
        if !self.long.request_path.starts_with('/') {
            return invalid("long.request_path must start with `/`".to_string());
        }
        self.short.load_profile.validate().map_err(ExperimentError::InvalidConfig)?;
        self.long.load_profile.validate().map_err(ExperimentError::InvalidConfig)?;
        Ok(())
    }
}
