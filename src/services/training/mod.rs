use crate::algorithms::{FactorModel, RatingPredictor};
use crate::config::Config;
use crate::error::RecError;
use crate::models::Triple;
use crate::store::RatingStore;
use crate::utils::metrics::{self, MetricsCalculator};
use crate::utils::validation::validate_config;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Held-out quality of a model trained on the train side of a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub train_size: usize,
    pub test_size: usize,
    pub cold_start_predictions: usize,
    pub rmse: f64,
    pub mae: f64,
    pub k: usize,
    pub threshold: f64,
    pub customers_evaluated: usize,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub f1: f64,
    pub training_millis: u64,
}

pub struct TrainingService {
    config: Arc<Config>,
    cancel: Arc<AtomicBool>,
}

impl TrainingService {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops a running `train` call at its next check. The flag is
    /// cleared once the cancelled run returns, so the service stays usable.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn train(&self, triples: &[Triple]) -> Result<FactorModel> {
        let start = Instant::now();
        let result = FactorModel::fit_with_cancel(triples, &self.config.model, &self.cancel);
        if let Err(RecError::Cancelled { epochs_completed }) = &result {
            warn!(epochs_completed, "Training cancelled");
            self.cancel.store(false, Ordering::Relaxed);
        }
        let model = result.context("training the factor model")?;

        info!(
            ratings = triples.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );
        Ok(model)
    }

    /// Trains on every rating in the store, for serving recommendations.
    pub fn train_full(&self, store: &RatingStore) -> Result<FactorModel> {
        self.train(&store.all_triples())
    }

    /// Splits the store, trains on the train side and scores the test side.
    pub fn evaluate(&self, store: &RatingStore) -> Result<(FactorModel, EvaluationReport)> {
        let evaluation = &self.config.evaluation;
        let (train, test) = store
            .split(evaluation.test_fraction, evaluation.split_seed)
            .context("splitting ratings")?;
        info!(train = train.len(), test = test.len(), "Split ratings into train and test");

        let start = Instant::now();
        let model = self.train(&train)?;
        let training_millis = start.elapsed().as_millis() as u64;

        let predictions = model.test(&test);
        let cold_start_predictions = predictions.iter().filter(|p| p.cold_start).count();
        if cold_start_predictions > 0 {
            warn!(
                cold_start_predictions,
                "Some test ratings belong to customers or items unseen in training"
            );
        }

        let calculator = MetricsCalculator::new(evaluation.k, evaluation.threshold);
        let ranking = calculator.precision_recall_at_k(&predictions);

        let report = EvaluationReport {
            train_size: train.len(),
            test_size: test.len(),
            cold_start_predictions,
            rmse: metrics::rmse(&predictions).context("computing RMSE")?,
            mae: metrics::mae(&predictions).context("computing MAE")?,
            k: evaluation.k,
            threshold: evaluation.threshold,
            customers_evaluated: ranking.precision.len(),
            mean_precision: ranking.mean_precision(),
            mean_recall: ranking.mean_recall(),
            f1: ranking.f1(),
            training_millis,
        };

        info!(rmse = report.rmse, precision = report.mean_precision, "Evaluation finished");
        Ok((model, report))
    }
}
