//! Analysis of the short experiment: comparison table and plots from `results.json`.

use std::path::Path;

use log::info;

use crate::error::{ExperimentError, Result};
use crate::experiment::service_proxy_stats_key;
use crate::experiment_config::ExperimentConfig;
use crate::load_test::LoadTestStats;
use crate::plot::{Figure, Panel, Series, BLUE, RED};
use crate::results::{ExperimentResults, TargetResult};
use crate::table::{pipe_table, Column};

pub const HPA_LABEL: &str = "K8s HPA";
pub const PHPA_LABEL: &str = "CPA Predictive HPA";

pub const TABLE_FILE: &str = "predictive_vs_horizontal_table.md";
pub const REPLICAS_PLOT: &str = "predictive_vs_horizontal_replicas.svg";
pub const AVG_LATENCY_PLOT: &str = "avg_latency_comparison.svg";
pub const MAX_LATENCY_PLOT: &str = "max_latency_comparison.svg";
pub const FAIL_PERCENTAGE_PLOT: &str = "fail_percentage_comparison.svg";

/// Per-probe series of one target. Probes whose stats lack the target's request entry are
/// left out of every latency-derived series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetSeries {
    pub replicas: Vec<u64>,
    pub num_requests: Vec<u64>,
    pub avg_latencies: Vec<f64>,
    pub max_latencies: Vec<f64>,
    pub fail_percentages: Vec<f64>,
}

impl TargetSeries {
    pub fn from_result(result: &TargetResult, request_key: &str) -> Self {
        let mut latency: Vec<&LoadTestStats> = result.latency.iter().collect();
        latency.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut series = Self {
            replicas: result.replicas.clone(),
            ..Default::default()
        };
        for stats in latency {
            let Some(request) = stats.requests.get(request_key) else {
                continue;
            };
            series.num_requests.push(stats.num_requests);
            series.avg_latencies.push(request.avg_response_time);
            series.max_latencies.push(request.max_response_time);
            series.fail_percentages.push(stats.fail_percentage());
        }
        series
    }

    fn len(&self) -> usize {
        self.replicas.len().max(self.num_requests.len())
    }
}

pub struct ShortAnalysis {
    /// Minutes between two probes.
    pub step_minutes: f64,
    pub horizontal: TargetSeries,
    pub predictive: TargetSeries,
}

impl ShortAnalysis {
    pub fn new(results: &ExperimentResults, config: &ExperimentConfig) -> Result<Self> {
        let short = &config.short;
        let horizontal = TargetSeries::from_result(
            &results.horizontal, &service_proxy_stats_key(&config.namespace, &short.horizontal.name));
        let predictive = TargetSeries::from_result(
            &results.predictive, &service_proxy_stats_key(&config.namespace, &short.predictive.name));
        if horizontal.len() == 0 && predictive.len() == 0 {
            return Err(ExperimentError::EmptyInput("results contain no probes".to_string()));
        }
        Ok(Self {
            step_minutes: short.probe_interval / 60.,
            horizontal,
            predictive,
        })
    }

    /// Minutes since the start of the run, one entry per probe.
    pub fn time_axis(&self) -> Vec<f64> {
        let len = self.horizontal.len().max(self.predictive.len());
        (0..len).map(|i| i as f64 * self.step_minutes).collect()
    }

    pub fn table(&self) -> String {
        let (hpa, phpa) = (&self.horizontal, &self.predictive);
        pipe_table(&[
            Column::floats("time (mins)", &self.time_axis()),
            Column::numbers("hpa num requests", &hpa.num_requests),
            Column::numbers("phpa num requests", &phpa.num_requests),
            Column::numbers("hpa replicas", &hpa.replicas),
            Column::numbers("phpa replicas", &phpa.replicas),
            Column::floats("hpa avg latencies", &hpa.avg_latencies),
            Column::floats("phpa avg latencies", &phpa.avg_latencies),
            Column::floats("hpa max latencies", &hpa.max_latencies),
            Column::floats("phpa max latencies", &phpa.max_latencies),
            Column::floats("hpa fail requests (%)", &hpa.fail_percentages),
            Column::floats("phpa fail requests (%)", &phpa.fail_percentages),
        ])
    }

    fn comparison(&self, y_label: &str, horizontal: Vec<f64>, predictive: Vec<f64>) -> Figure {
        let time = self.time_axis();
        let points = |values: Vec<f64>| time.iter().copied().zip(values).collect::<Vec<_>>();
        let panel = Panel::new("time (minutes)", y_label)
            .line(Series::new(HPA_LABEL, RED, points(horizontal)))
            .line(Series::new(PHPA_LABEL, BLUE, points(predictive)));
        Figure::single(panel, 600., 600.)
    }

    /// The four comparison plots, keyed by file name.
    pub fn figures(&self) -> Vec<(&'static str, Figure)> {
        let (hpa, phpa) = (&self.horizontal, &self.predictive);
        let as_f64 = |values: &[u64]| values.iter().map(|v| *v as f64).collect::<Vec<_>>();
        vec![
            (REPLICAS_PLOT, self.comparison("number of replicas", as_f64(&hpa.replicas), as_f64(&phpa.replicas))),
            (AVG_LATENCY_PLOT, self.comparison("average latency", hpa.avg_latencies.clone(), phpa.avg_latencies.clone())),
            (MAX_LATENCY_PLOT, self.comparison("maximum latency", hpa.max_latencies.clone(), phpa.max_latencies.clone())),
            (FAIL_PERCENTAGE_PLOT, self.comparison("failed requests (%)",
                                                   hpa.fail_percentages.clone(), phpa.fail_percentages.clone())),
        ]
    }

    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| ExperimentError::io(dir, e))?;

        let table_path = dir.join(TABLE_FILE);
        std::fs::write(&table_path, self.table()).map_err(|e| ExperimentError::io(&table_path, e))?;
        info!("Wrote {}", table_path.display());

        for (name, figure) in self.figures() {
            figure.save(dir.join(name))?;
            info!("Wrote {}", dir.join(name).display());
        }
        Ok(())
    }
}

/// Reads `results.json` from the results directory and writes the table and plots next to it.
pub fn analyse(config: &ExperimentConfig) -> Result<ShortAnalysis> {
    let results = ExperimentResults::from_file(config.results_dir.join(crate::experiment::RESULTS_FILE))?;
    let analysis = ShortAnalysis::new(&results, config)?;
    analysis.write(&config.results_dir)?;
    Ok(analysis)
}
