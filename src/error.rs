//! Error type shared by the experiment drivers and the analysis.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML from {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("can't render plot: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("`{command}` exited with {status}: {stderr}")]
    Kubectl {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no deployment matches selector `{selector}` in namespace `{namespace}`")]
    NoDeployment { namespace: String, selector: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("nothing to analyse: {0}")]
    EmptyInput(String),

    #[error("interrupted by shutdown signal")]
    Interrupted,
}

impl ExperimentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
