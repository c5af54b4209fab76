use crate::config::{Config, EvaluationConfig, IngestConfig, ModelConfig};
use anyhow::{anyhow, Result};

pub fn validate_ingest_bounds(min_ratings: usize, max_ratings: usize) -> Result<()> {
    if min_ratings > max_ratings {
        return Err(anyhow!(
            "Minimum ratings ({}) cannot exceed maximum ratings ({})",
            min_ratings,
            max_ratings
        ));
    }

    Ok(())
}

pub fn validate_ingest_config(ingest: &IngestConfig) -> Result<()> {
    validate_ingest_bounds(ingest.min_ratings, ingest.max_ratings)?;

    if ingest.category.trim().is_empty() {
        return Err(anyhow!("Ingest category cannot be empty"));
    }

    if ingest.ratings_path.is_empty() || ingest.metadata_path.is_empty() {
        return Err(anyhow!("Output paths cannot be empty"));
    }

    Ok(())
}

pub fn validate_model_config(model: &ModelConfig) -> Result<()> {
    if model.factors == 0 {
        return Err(anyhow!("Number of latent factors must be greater than 0"));
    }

    if model.factors > 1024 {
        return Err(anyhow!("Number of latent factors too large (max 1024)"));
    }

    if !model.learning_rate.is_finite() || model.learning_rate <= 0.0 {
        return Err(anyhow!("Learning rate must be a positive number"));
    }

    if !model.regularization.is_finite() || model.regularization < 0.0 {
        return Err(anyhow!("Regularization cannot be negative"));
    }

    if !model.init_mean.is_finite() || !model.init_std_dev.is_finite() || model.init_std_dev < 0.0 {
        return Err(anyhow!("Initialization parameters must be finite with a non-negative standard deviation"));
    }

    Ok(())
}

pub fn validate_evaluation_config(evaluation: &EvaluationConfig) -> Result<()> {
    if !(evaluation.test_fraction > 0.0 && evaluation.test_fraction < 1.0) {
        return Err(anyhow!(
            "Test fraction must be strictly between 0 and 1, got {}",
            evaluation.test_fraction
        ));
    }

    if evaluation.k == 0 {
        return Err(anyhow!("k must be greater than 0"));
    }

    if !evaluation.threshold.is_finite() {
        return Err(anyhow!("Relevance threshold must be a finite number"));
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<()> {
    validate_ingest_config(&config.ingest)?;
    validate_model_config(&config.model)?;
    validate_evaluation_config(&config.evaluation)?;

    if config.recommendation.top_n > 1000 {
        return Err(anyhow!("Number of recommendations too large (max 1000)"));
    }

    if config.runtime.worker_threads == 0 {
        return Err(anyhow!("Worker threads must be greater than 0"));
    }

    Ok(())
}

pub fn validate_customer_id(customer_id: &str) -> Result<()> {
    if customer_id.is_empty() {
        return Err(anyhow!("Customer ID cannot be empty"));
    }

    if customer_id.chars().any(char::is_whitespace) {
        return Err(anyhow!("Customer ID cannot contain whitespace"));
    }

    Ok(())
}
