use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tracing_subscriber::EnvFilter;

use hpa_experiment::analysis::analyse;
use hpa_experiment::analysis_long::{analyse_long, HPA_DIR, PHPA_DIR};
use hpa_experiment::cluster::KubectlCluster;
use hpa_experiment::experiment::HpaExperiment;
use hpa_experiment::experiment_config::ExperimentConfig;
use hpa_experiment::load_test::HttpLoadDriver;
use hpa_experiment::monitor::LoadMonitor;
use hpa_experiment::sample_logger::{CsvSampleLogger, SampleLogger, StdoutSampleLogger};
use hpa_experiment::shutdown::cancel_on_signal;

#[derive(Parser)]
#[command(
    name = "hpa-experiment",
    about = "Compares the Kubernetes HPA with a predictive HPA under synthetic load",
    version,
    propagate_version = true,
)]
struct Cli {
    /// YAML experiment configuration, built-in defaults if omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory results are written to and read from
    #[arg(short, long, global = true)]
    results_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the short experiment against both targets and write results.json
    Run {
        /// Kubernetes API server host, the services are reached through its proxy
        host: String,
    },
    /// Run the long experiment next to a single target until interrupted
    Monitor {
        /// Autoscaler the target is scaled by, selects the results subdirectory
        #[arg(short, long, value_enum, default_value = "hpa")]
        target: Autoscaler,
        /// Print samples instead of appending them to the CSV files
        #[arg(long)]
        stdout: bool,
    },
    /// Build the comparison table and plots of the short experiment
    Analyse,
    /// Build the plots of the long experiment
    AnalyseLong,
}

#[derive(Clone, Copy, ValueEnum)]
enum Autoscaler {
    Hpa,
    Phpa,
}

impl Autoscaler {
    fn dir(self) -> &'static str {
        match self {
            Autoscaler::Hpa => HPA_DIR,
            Autoscaler::Phpa => PHPA_DIR,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ExperimentConfig> {
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    config.apply_env();
    if let Some(dir) = &cli.results_dir {
        config.results_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { host } => {
            let driver = HttpLoadDriver::new(&config.load)?;
            let experiment = HpaExperiment::new(Arc::new(KubectlCluster::new()), Arc::new(driver), config, host);
            let shutdown = cancel_on_signal();
            experiment.run(&shutdown).await.context("experiment failed")?;
        }
        Commands::Monitor { target, stdout } => {
            let dir = config.results_dir.join(target.dir());
            let logger: Box<dyn SampleLogger> = if stdout {
                Box::new(StdoutSampleLogger {})
            } else {
                info!("Appending samples to {}", dir.display());
                Box::new(CsvSampleLogger::new(dir.join(&config.long.replicas_file),
                                              dir.join(&config.long.load_file)))
            };
            let driver = HttpLoadDriver::new(&config.load)?;
            let monitor = LoadMonitor::new(Arc::new(KubectlCluster::new()), Arc::new(driver), config, logger);
            let shutdown = cancel_on_signal();
            monitor.run(&shutdown).await.context("monitor failed")?;
        }
        Commands::Analyse => {
            analyse(&config).context("analysing short experiment")?;
        }
        Commands::AnalyseLong => {
            analyse_long(&config).context("analysing long experiment")?;
        }
    }
    Ok(())
}
