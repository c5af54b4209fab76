pub mod initializer;
pub mod optimizer;

use crate::config::ModelConfig;
use crate::error::{RecError, Result};
use crate::models::{Estimate, Prediction, Triple};
use initializer::NormalInitializer;
use nalgebra::DVector;
use optimizer::Sgd;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Ratings processed between two looks at the cancellation flag.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Anything that can score a (customer, item) pair.
pub trait RatingPredictor: Send + Sync {
    fn predict(&self, customer_id: &str, item_id: &str) -> Estimate;

    /// Scores several items for one customer.
    fn predict_items(&self, customer_id: &str, item_ids: &[&str]) -> Vec<Estimate> {
        item_ids
            .iter()
            .map(|item_id| self.predict(customer_id, item_id))
            .collect()
    }

    fn test(&self, triples: &[Triple]) -> Vec<Prediction> {
        triples
            .par_iter()
            .map(|triple| Prediction::new(triple, self.predict(&triple.customer_id, &triple.item_id)))
            .collect()
    }
}

/// Biased matrix factorization with implicit feedback (SVD++).
///
/// `r(u,i) = mu + b_u + b_i + q_i . (p_u + |N(u)|^-1/2 * sum_{j in N(u)} y_j)`
/// where `N(u)` is the set of items `u` rated in the training data.
#[derive(Debug, Clone)]
pub struct FactorModel {
    config: ModelConfig,
    global_mean: f64,
    customer_index: HashMap<String, usize>,
    item_index: HashMap<String, usize>,
    customer_bias: Vec<f64>,
    item_bias: Vec<f64>,
    customer_factors: Vec<DVector<f64>>,
    item_factors: Vec<DVector<f64>>,
    implicit_factors: Vec<DVector<f64>>,
    rated_items: Vec<Vec<usize>>,
}

impl FactorModel {
    pub fn fit(train: &[Triple], config: &ModelConfig) -> Result<Self> {
        Self::fit_with_cancel(train, config, &AtomicBool::new(false))
    }

    /// Trains for exactly `config.epochs` epochs unless `cancel` is raised, in which
    /// case training stops and `RecError::Cancelled` is returned.
    pub fn fit_with_cancel(train: &[Triple], config: &ModelConfig, cancel: &AtomicBool) -> Result<Self> {
        check_config(config)?;
        if train.is_empty() {
            return Err(RecError::EmptyInput("training set"));
        }

        let (mut model, mut samples) = Self::allocate(train, config);
        let mut rng = StdRng::seed_from_u64(config.seed);

        // factors stay at zero when no epoch will run
        if config.epochs > 0 {
            model.initialize_factors(&mut rng)?;
        }

        info!(
            customers = model.customer_index.len(),
            items = model.item_index.len(),
            ratings = samples.len(),
            factors = config.factors,
            epochs = config.epochs,
            "Training factor model"
        );

        let sgd = Sgd::new(config.learning_rate, config.regularization);
        for epoch in 0..config.epochs {
            samples.shuffle(&mut rng);

            let mut squared_error = 0.0;
            for (n, &(u, i, rating)) in samples.iter().enumerate() {
                if n % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                    info!(epoch, "Training cancelled");
                    return Err(RecError::Cancelled {
                        epochs_completed: epoch,
                    });
                }
                let error = model.sgd_step(&sgd, u, i, rating);
                squared_error += error * error;
            }

            debug!(
                epoch = epoch + 1,
                train_rmse = (squared_error / samples.len() as f64).sqrt(),
                "Completed epoch"
            );
        }

        Ok(model)
    }

    /// Builds zeroed parameter tables and the index-encoded training samples.
    fn allocate(train: &[Triple], config: &ModelConfig) -> (Self, Vec<(usize, usize, f64)>) {
        let customers: BTreeSet<&str> = train.iter().map(|t| t.customer_id.as_str()).collect();
        let items: BTreeSet<&str> = train.iter().map(|t| t.item_id.as_str()).collect();

        let customer_index: HashMap<String, usize> = customers
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.to_string(), idx))
            .collect();
        let item_index: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.to_string(), idx))
            .collect();

        let mut rated: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); customers.len()];
        let samples: Vec<(usize, usize, f64)> = train
            .iter()
            .map(|t| {
                let u = customer_index[t.customer_id.as_str()];
                let i = item_index[t.item_id.as_str()];
                rated[u].insert(i);
                (u, i, t.rating as f64)
            })
            .collect();

        let global_mean = samples.iter().map(|s| s.2).sum::<f64>() / samples.len() as f64;
        let f = config.factors;

        let model = Self {
            config: config.clone(),
            global_mean,
            customer_bias: vec![0.0; customers.len()],
            item_bias: vec![0.0; items.len()],
            customer_factors: vec![DVector::zeros(f); customers.len()],
            item_factors: vec![DVector::zeros(f); items.len()],
            implicit_factors: vec![DVector::zeros(f); items.len()],
            rated_items: rated.into_iter().map(|set| set.into_iter().collect()).collect(),
            customer_index,
            item_index,
        };

        (model, samples)
    }

    fn initialize_factors(&mut self, rng: &mut StdRng) -> Result<()> {
        let init = NormalInitializer::new(self.config.init_mean, self.config.init_std_dev)?;
        let f = self.config.factors;

        self.customer_factors = init.table(rng, self.customer_bias.len(), f);
        self.item_factors = init.table(rng, self.item_bias.len(), f);
        if self.config.implicit_feedback {
            self.implicit_factors = init.table(rng, self.item_bias.len(), f);
        }
        Ok(())
    }

    /// `|N(u)|^-1/2`, or zero when implicit feedback is off or `N(u)` is empty.
    fn implicit_norm(&self, u: usize) -> f64 {
        let n = self.rated_items[u].len();
        if !self.config.implicit_feedback || n == 0 {
            0.0
        } else {
            1.0 / (n as f64).sqrt()
        }
    }

    fn implicit_sum(&self, u: usize) -> DVector<f64> {
        let mut sum = DVector::zeros(self.config.factors);
        let norm = self.implicit_norm(u);
        if norm == 0.0 {
            return sum;
        }
        for &j in &self.rated_items[u] {
            sum += &self.implicit_factors[j];
        }
        sum * norm
    }

    /// One online update for customer `u`'s `rating` of item `i`; returns the
    /// prediction error measured before the update.
    fn sgd_step(&mut self, sgd: &Sgd, u: usize, i: usize, rating: f64) -> f64 {
        let preference = self.preference(u);
        let estimate = self.global_mean
            + self.customer_bias[u]
            + self.item_bias[i]
            + self.item_factors[i].dot(&preference);
        let error = rating - estimate;

        sgd.step_scalar(&mut self.customer_bias[u], error);
        sgd.step_scalar(&mut self.item_bias[i], error);

        let item_before = self.item_factors[i].clone();
        sgd.step(&mut self.customer_factors[u], &(&item_before * error));
        sgd.step(&mut self.item_factors[i], &(preference * error));

        let norm = self.implicit_norm(u);
        if norm > 0.0 {
            let direction = item_before * (error * norm);
            for &j in &self.rated_items[u] {
                sgd.step(&mut self.implicit_factors[j], &direction);
            }
        }

        error
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn knows_customer(&self, customer_id: &str) -> bool {
        self.customer_index.contains_key(customer_id)
    }

    pub fn customer_bias(&self, customer_id: &str) -> Option<f64> {
        self.customer_index.get(customer_id).map(|&u| self.customer_bias[u])
    }

    pub fn item_bias(&self, item_id: &str) -> Option<f64> {
        self.item_index.get(item_id).map(|&i| self.item_bias[i])
    }
}

impl RatingPredictor for FactorModel {
    /// Unknown customers or items contribute zero bias and zero factors, so the
    /// estimate falls back to the global mean plus whichever bias is known.
    /// Estimates are not clipped to the rating scale.
    fn predict(&self, customer_id: &str, item_id: &str) -> Estimate {
        let u = self.customer_index.get(customer_id).copied();
        let preference = u.map(|u| self.preference(u));
        self.estimate(u, preference.as_ref(), item_id)
    }

    fn predict_items(&self, customer_id: &str, item_ids: &[&str]) -> Vec<Estimate> {
        let u = self.customer_index.get(customer_id).copied();
        let preference = u.map(|u| self.preference(u));
        item_ids
            .iter()
            .map(|item_id| self.estimate(u, preference.as_ref(), item_id))
            .collect()
    }
}

impl FactorModel {
    /// `p_u` plus the normalized implicit-feedback sum.
    fn preference(&self, u: usize) -> DVector<f64> {
        &self.customer_factors[u] + self.implicit_sum(u)
    }

    fn estimate(&self, u: Option<usize>, preference: Option<&DVector<f64>>, item_id: &str) -> Estimate {
        let i = self.item_index.get(item_id).copied();

        let mut value = self.global_mean;
        if let Some(u) = u {
            value += self.customer_bias[u];
        }
        if let Some(i) = i {
            value += self.item_bias[i];
            if let Some(preference) = preference {
                value += self.item_factors[i].dot(preference);
            }
        }

        Estimate {
            value,
            cold_start: u.is_none() || i.is_none(),
        }
    }
}

fn check_config(config: &ModelConfig) -> Result<()> {
    if config.factors == 0 {
        return Err(RecError::invalid("factors must be at least 1"));
    }
    if !config.learning_rate.is_finite() || config.learning_rate < 0.0 {
        return Err(RecError::invalid(format!(
            "learning rate must be a non-negative number, got {}",
            config.learning_rate
        )));
    }
    if !config.regularization.is_finite() || config.regularization < 0.0 {
        return Err(RecError::invalid(format!(
            "regularization must be a non-negative number, got {}",
            config.regularization
        )));
    }
    if !config.init_std_dev.is_finite() || config.init_std_dev < 0.0 {
        return Err(RecError::invalid(format!(
            "init std-dev must be a non-negative number, got {}",
            config.init_std_dev
        )));
    }
    Ok(())
}
