//! Tooling for comparing the Kubernetes horizontal pod autoscaler with a predictive one:
//! experiment drivers putting synthetic load on both targets while sampling their replica
//! counts, and the analysis turning the samples into tables and plots.

pub mod analysis;
pub mod analysis_long;
pub mod cluster;
pub mod error;
pub mod experiment;
pub mod experiment_config;
pub mod load_profile;
pub mod monitor;
pub mod plot;
pub mod results;
pub mod sample_logger;
pub mod shutdown;
pub mod table;
