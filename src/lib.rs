pub mod algorithms;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use algorithms::{FactorModel, RatingPredictor};
pub use config::Config;
pub use error::{RecError, Result};
pub use ingest::IngestFilter;
pub use models::*;
pub use services::recommendation::Recommender;
pub use services::training::{EvaluationReport, TrainingService};
pub use store::RatingStore;

/// Installs the stderr subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
