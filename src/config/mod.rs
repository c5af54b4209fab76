use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ingest: IngestConfig,
    pub model: ModelConfig,
    pub evaluation: EvaluationConfig,
    pub recommendation: RecommendationConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub min_ratings: usize,
    pub max_ratings: usize,
    /// Only items whose `group:` equals this value contribute ratings.
    pub category: String,
    pub ratings_path: String,
    pub metadata_path: String,
}

/// Hyper-parameters of the SVD++ model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub factors: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub epochs: usize,
    pub seed: u64,
    pub init_mean: f64,
    pub init_std_dev: f64,
    /// Adds the `y_j` implicit-feedback terms; plain biased SVD when false.
    pub implicit_feedback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub test_fraction: f64,
    pub split_seed: u64,
    pub k: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_ratings: 2,
            max_ratings: 100,
            category: "Music".to_string(),
            ratings_path: "customer_ratings_filtered.txt".to_string(),
            metadata_path: "asin_metadata_filtered.txt".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            factors: 20,
            learning_rate: 0.005,
            regularization: 0.1,
            epochs: 20,
            seed: 42,
            init_mean: 0.0,
            init_std_dev: 0.1,
            implicit_feedback: true,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            split_seed: 42,
            k: 5,
            threshold: 4.0,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            model: ModelConfig::default(),
            evaluation: EvaluationConfig::default(),
            recommendation: RecommendationConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Layers the defaults, the given file and `REVIEWREC_`-prefixed environment
    /// variables (e.g. `REVIEWREC_MODEL__EPOCHS=40`).
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("REVIEWREC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!("Config file {} not found, using default configuration", path);
            Ok(Self::default())
        }
    }
}
