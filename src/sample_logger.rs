use std::path::PathBuf;

use crate::error::Result;
use crate::results::{append_csv_row, LoadSample, ReplicaSample};

/// Sink for the samples of the long experiment.
pub trait SampleLogger: Send {
    fn log_replicas(&mut self, sample: ReplicaSample) -> Result<()>;
    fn log_load(&mut self, sample: LoadSample) -> Result<()>;
}

pub struct EmptySampleLogger {}

impl SampleLogger for EmptySampleLogger {
    fn log_replicas(&mut self, _sample: ReplicaSample) -> Result<()> {
        Ok(())
    }

    fn log_load(&mut self, _sample: LoadSample) -> Result<()> {
        Ok(())
    }
}

pub struct StdoutSampleLogger {}

impl SampleLogger for StdoutSampleLogger {
    fn log_replicas(&mut self, sample: ReplicaSample) -> Result<()> {
        println!("Time: {}, replicas: {}", sample.timestamp, sample.replicas);
        Ok(())
    }

    fn log_load(&mut self, sample: LoadSample) -> Result<()> {
        println!("Time: {}, requests: {}, failed: {}, avg latency: {}, min latency: {}, max latency: {}",
                 sample.timestamp, sample.num_requests, sample.num_requests_fail, sample.avg_response_time,
                 sample.min_response_time, sample.max_response_time);
        Ok(())
    }
}

/// Appends every sample to its CSV file as soon as it arrives, so a killed run keeps its data.
pub struct CsvSampleLogger {
    replicas_path: PathBuf,
    load_path: PathBuf,
}

impl CsvSampleLogger {
    pub fn new(replicas_path: impl Into<PathBuf>, load_path: impl Into<PathBuf>) -> Self {
        Self {
            replicas_path: replicas_path.into(),
            load_path: load_path.into(),
        }
    }
}

impl SampleLogger for CsvSampleLogger {
    fn log_replicas(&mut self, sample: ReplicaSample) -> Result<()> {
        append_csv_row(&self.replicas_path, &sample)
    }

    fn log_load(&mut self, sample: LoadSample) -> Result<()> {
        append_csv_row(&self.load_path, &sample)
    }
}
