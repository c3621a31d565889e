//! Experiment results and their on-disk formats.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};
use crate::load_test::LoadTestStats;

/// Everything measured for one target during the short experiment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetResult {
    /// One entry per probe.
    pub latency: Vec<LoadTestStats>,
    /// Replica count sampled after every probe's load run.
    pub replicas: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_profile: Option<serde_json::Value>,
}

/// Results of the short experiment, as stored in `results.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub horizontal: TargetResult,
    pub predictive: TargetResult,
}

impl ExperimentResults {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ExperimentError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let mut writer = BufWriter::new(File::create(path).map_err(|e| ExperimentError::io(path, e))?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(|e| ExperimentError::io(path, e))
    }
}

/// Replica count of the target at a point in time. Stored as `timestamp,replicas`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSample {
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub replicas: u64,
}

/// Outcome of one long-experiment load run.
/// Stored as `timestamp,num_requests,num_requests_fail,avg_response_time,min_response_time,max_response_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub timestamp: f64,
    pub num_requests: u64,
    pub num_requests_fail: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
}

impl LoadSample {
    /// Builds a sample from the stats entry of `key`, zeroed latencies if there is none.
    pub fn from_stats(timestamp: f64, stats: &LoadTestStats, key: &str) -> Self {
        let request = stats.requests.get(key);
        Self {
            timestamp,
            num_requests: stats.num_requests,
            num_requests_fail: stats.num_requests_fail,
            avg_response_time: request.map_or(0., |r| r.avg_response_time),
            min_response_time: request.map_or(0., |r| r.min_response_time),
            max_response_time: request.map_or(0., |r| r.max_response_time),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| ExperimentError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Appends a single headerless row to a CSV file, creating it if needed.
pub fn append_csv_row<T: Serialize>(path: impl AsRef<Path>, row: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ExperimentError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.serialize(row)?;
    writer.flush().map_err(|e| ExperimentError::io(path, e))
}

/// Reads all rows of a headerless CSV file.
pub fn read_csv_rows<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ExperimentError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(file);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
