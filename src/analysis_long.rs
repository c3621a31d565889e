//! Analysis of the long experiment: multi-day plots from the replica and load CSV files.

use std::path::Path;

use log::info;

use crate::error::{ExperimentError, Result};
use crate::experiment_config::ExperimentConfig;
use crate::plot::{Figure, Panel, Series, BLUE, GREEN, ORANGE, PURPLE};
use crate::results::{read_csv_rows, LoadSample, ReplicaSample};

pub const HPA_DIR: &str = "hpa";
pub const PHPA_DIR: &str = "phpa";

/// Number of days plotted one by one.
pub const PLOTTED_DAYS: u32 = 3;
const AVG_LATENCY_LIMIT: f64 = 600.;
const MAX_LATENCY_LIMIT: f64 = 6000.;
const HOURS_PER_DAY: f64 = 24.;

/// Samples of one autoscaler with timestamps in hours since its first replica sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscalerSeries {
    pub name: String,
    pub color: &'static str,
    pub replicas: Vec<ReplicaSample>,
    pub load: Vec<LoadSample>,
}

impl AutoscalerSeries {
    /// Rebases both series on the first replica sample and drops the first row of each.
    pub fn from_samples(name: &str, color: &'static str, replicas: Vec<ReplicaSample>,
                        load: Vec<LoadSample>) -> Result<Self> {
        let start = replicas.first()
            .map(|sample| sample.timestamp)
            .ok_or_else(|| ExperimentError::EmptyInput(format!("no replica samples for {}", name)))?;
        let hours = |timestamp: f64| (timestamp - start) / 3600.;

        Ok(Self {
            name: name.to_string(),
            color,
            replicas: replicas.into_iter()
                .skip(1)
                .map(|s| ReplicaSample { timestamp: hours(s.timestamp), ..s })
                .collect(),
            load: load.into_iter()
                .skip(1)
                .map(|s| LoadSample { timestamp: hours(s.timestamp), ..s })
                .collect(),
        })
    }

    pub fn from_dir(name: &str, color: &'static str, dir: impl AsRef<Path>, config: &ExperimentConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let replicas = read_csv_rows(dir.join(&config.long.replicas_file))?;
        let load = read_csv_rows(dir.join(&config.long.load_file))?;
        Self::from_samples(name, color, replicas, load)
    }

    pub fn replica_points(&self) -> Vec<(f64, f64)> {
        self.replicas.iter().map(|s| (s.timestamp, s.replicas as f64)).collect()
    }

    pub fn load_points(&self, value: impl Fn(&LoadSample) -> f64) -> Vec<(f64, f64)> {
        self.load.iter().map(|s| (s.timestamp, value(s))).collect()
    }

    /// Hours window of day `day` (counting from 1), measured from the first load sample.
    pub fn day_window(&self, day: u32) -> (f64, f64) {
        let start = self.load.iter().map(|s| s.timestamp).fold(f64::INFINITY, f64::min);
        let start = if start.is_finite() { start } else { 0. };
        (start + day.saturating_sub(1) as f64 * HOURS_PER_DAY, start + day as f64 * HOURS_PER_DAY)
    }

    fn requests_panel(&self) -> Panel {
        Panel::new("time", "number of requests")
            .title(&format!("number of requests for {} over time", self.name))
            .line(Series::new(&format!("{} number of requests", self.name), self.color,
                              self.load_points(|s| s.num_requests as f64)))
            .day_ticks(4)
    }
}

/// Quantity compared between the two autoscalers in the top row of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Replicas,
    AvgLatency,
    MaxLatency,
}

impl Metric {
    fn describe(&self) -> (&'static str, &'static str) {
        match self {
            Metric::Replicas => ("replica count", "number of replicas"),
            Metric::AvgLatency => ("average latency", "average latency"),
            Metric::MaxLatency => ("maximum latency", "maximum latency"),
        }
    }

    fn panel(&self, series: &AutoscalerSeries) -> Panel {
        let (legend, y_label) = self.describe();
        let points = match self {
            Metric::Replicas => series.replica_points(),
            Metric::AvgLatency => series.load_points(|s| s.avg_response_time),
            Metric::MaxLatency => series.load_points(|s| s.max_response_time),
        };
        Panel::new("time", y_label)
            .title(&format!("{} for {} over time", legend, series.name))
            .line(Series::new(&format!("{} {}", series.name, legend), series.color, points))
            .day_ticks(4)
    }
}

/// 2x2 grid: the metric on top, request counts below, one autoscaler per column.
pub fn comparison_grid(hpa: &AutoscalerSeries, phpa: &AutoscalerSeries, metric: Metric,
                       y_limit: Option<f64>, day: Option<u32>) -> Figure {
    let limit = |panel: Panel, series: &AutoscalerSeries, top: bool| {
        let panel = match (top, y_limit) {
            (true, Some(max)) => panel.y_limits(0., max),
            _ => panel,
        };
        match day {
            Some(day) => {
                let (from, to) = series.day_window(day);
                panel.x_limits(from, to)
            }
            None => panel,
        }
    };
    let panels = vec![
        limit(metric.panel(hpa), hpa, true),
        limit(metric.panel(phpa), phpa, true),
        limit(hpa.requests_panel(), hpa, false),
        limit(phpa.requests_panel(), phpa, false),
    ];
    Figure::grid(2, 2, panels, 1500., 1500.)
}

/// Average, minimum and maximum latency of one autoscaler with the request count on a second axis.
pub fn latency_overview(series: &AutoscalerSeries) -> Figure {
    let panel = Panel::new("time", "latency")
        .line(Series::new("average latency", BLUE, series.load_points(|s| s.avg_response_time)))
        .line(Series::new("minimum latency", ORANGE, series.load_points(|s| s.min_response_time)))
        .line(Series::new("maximum latency", GREEN, series.load_points(|s| s.max_response_time)))
        .secondary_line("number of requests",
                        Series::new("number of requests", PURPLE, series.load_points(|s| s.num_requests as f64)))
        .day_ticks(2);
    Figure::single(panel, 1000., 1000.)
}

pub struct LongAnalysis {
    pub hpa: AutoscalerSeries,
    pub phpa: AutoscalerSeries,
}

impl LongAnalysis {
    pub fn new(hpa: AutoscalerSeries, phpa: AutoscalerSeries) -> Self {
        Self { hpa, phpa }
    }

    /// Loads `hpa/` and `phpa/` from the results directory.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        Ok(Self::new(
            AutoscalerSeries::from_dir("hpa", GREEN, config.results_dir.join(HPA_DIR), config)?,
            AutoscalerSeries::from_dir("phpa", PURPLE, config.results_dir.join(PHPA_DIR), config)?,
        ))
    }

    /// All plots, keyed by file stem.
    pub fn figures(&self) -> Vec<(String, Figure)> {
        let (hpa, phpa) = (&self.hpa, &self.phpa);
        let mut figures = vec![
            ("replica_compare".to_string(), comparison_grid(hpa, phpa, Metric::Replicas, None, None)),
            ("hpa_latency".to_string(), latency_overview(hpa)),
            ("phpa_latency".to_string(), latency_overview(phpa)),
            ("avg_latency_compare".to_string(),
             comparison_grid(hpa, phpa, Metric::AvgLatency, Some(AVG_LATENCY_LIMIT), None)),
        ];
        for day in 1..=PLOTTED_DAYS {
            figures.push((format!("avg_latency_day_{}", day),
                          comparison_grid(hpa, phpa, Metric::AvgLatency, Some(AVG_LATENCY_LIMIT), Some(day))));
        }
        figures.push(("max_latency_compare".to_string(), comparison_grid(hpa, phpa, Metric::MaxLatency, None, None)));
        for day in 1..=PLOTTED_DAYS {
            figures.push((format!("max_latency_day_{}", day),
                          comparison_grid(hpa, phpa, Metric::MaxLatency, Some(MAX_LATENCY_LIMIT), Some(day))));
        }
        figures
    }

    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        for (name, figure) in self.figures() {
            let path = dir.join(format!("{}.svg", name));
            figure.save(&path)?;
            info!("Wrote {}", path.display());
        }
        Ok(())
    }
}

pub fn analyse_long(config: &ExperimentConfig) -> Result<LongAnalysis> {
    let analysis = LongAnalysis::from_config(config)?;
    analysis.write(&config.results_dir)?;
    Ok(analysis)
}
