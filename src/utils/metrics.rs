use crate::error::{RecError, Result};
use crate::models::Prediction;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Root-mean-squared error. Empty input is an error rather than a silent zero.
pub fn rmse(predictions: &[Prediction]) -> Result<f64> {
    if predictions.is_empty() {
        return Err(RecError::EmptyInput("predictions for RMSE"));
    }

    let mse = predictions
        .iter()
        .map(|p| (p.true_rating - p.estimate).powi(2))
        .sum::<f64>()
        / predictions.len() as f64;

    Ok(mse.sqrt())
}

/// Mean absolute error, with the same empty-input rule as [`rmse`].
pub fn mae(predictions: &[Prediction]) -> Result<f64> {
    if predictions.is_empty() {
        return Err(RecError::EmptyInput("predictions for MAE"));
    }

    Ok(predictions
        .iter()
        .map(|p| (p.true_rating - p.estimate).abs())
        .sum::<f64>()
        / predictions.len() as f64)
}

/// Per-customer precision@k and recall@k.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecall {
    pub precision: BTreeMap<String, f64>,
    pub recall: BTreeMap<String, f64>,
}

impl PrecisionRecall {
    /// Unweighted mean over customers, zero when there are none.
    pub fn mean_precision(&self) -> f64 {
        mean(self.precision.values())
    }

    pub fn mean_recall(&self) -> f64 {
        mean(self.recall.values())
    }

    pub fn f1(&self) -> f64 {
        f1_score(self.mean_precision(), self.mean_recall())
    }
}

fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}

pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Estimate descending, item id ascending on ties.
pub fn by_estimate_desc(a_estimate: f64, a_item: &str, b_estimate: f64, b_item: &str) -> Ordering {
    b_estimate
        .total_cmp(&a_estimate)
        .then_with(|| a_item.cmp(b_item))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsCalculator {
    k: usize,
    threshold: f64,
}

impl MetricsCalculator {
    pub fn new(k: usize, threshold: f64) -> Self {
        Self { k, threshold }
    }

    /// Precision and recall of one customer's held-out predictions.
    ///
    /// Relevant means `true_rating >= threshold` over all of the customer's
    /// predictions; recommended means `estimate >= threshold` within the top k.
    pub fn customer_precision_recall(&self, predictions: &[&Prediction]) -> (f64, f64) {
        let mut ranked = predictions.to_vec();
        ranked.sort_by(|a, b| by_estimate_desc(a.estimate, &a.item_id, b.estimate, &b.item_id));

        let n_relevant = ranked
            .iter()
            .filter(|p| p.true_rating >= self.threshold)
            .count();
        let top_k = &ranked[..self.k.min(ranked.len())];
        let n_recommended = top_k
            .iter()
            .filter(|p| p.estimate >= self.threshold)
            .count();
        let n_relevant_and_recommended = top_k
            .iter()
            .filter(|p| p.estimate >= self.threshold && p.true_rating >= self.threshold)
            .count();

        let precision = if n_recommended == 0 {
            0.0
        } else {
            n_relevant_and_recommended as f64 / n_recommended as f64
        };
        let recall = if n_relevant == 0 {
            0.0
        } else {
            n_relevant_and_recommended as f64 / n_relevant as f64
        };

        (precision, recall)
    }

    /// Groups predictions by customer and scores every group independently.
    pub fn precision_recall_at_k(&self, predictions: &[Prediction]) -> PrecisionRecall {
        let mut by_customer: BTreeMap<&str, Vec<&Prediction>> = BTreeMap::new();
        for prediction in predictions {
            by_customer
                .entry(prediction.customer_id.as_str())
                .or_default()
                .push(prediction);
        }

        let scores: Vec<(String, (f64, f64))> = by_customer
            .into_par_iter()
            .map(|(customer, group)| (customer.to_string(), self.customer_precision_recall(&group)))
            .collect();

        let mut result = PrecisionRecall::default();
        for (customer, (precision, recall)) in scores {
            result.precision.insert(customer.clone(), precision);
            result.recall.insert(customer, recall);
        }
        result
    }
}

/// Free-function form of [`MetricsCalculator::precision_recall_at_k`].
pub fn precision_recall_at_k(predictions: &[Prediction], k: usize, threshold: f64) -> PrecisionRecall {
    MetricsCalculator::new(k, threshold).precision_recall_at_k(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(customer: &str, item: &str, true_rating: f64, estimate: f64) -> Prediction {
        Prediction {
            customer_id: customer.to_string(),
            item_id: item.to_string(),
            true_rating,
            estimate,
            cold_start: false,
        }
    }

    #[test]
    fn test_rmse_exact_predictions() {
        let predictions = vec![
            prediction("C1", "A1", 5.0, 5.0),
            prediction("C1", "A2", 2.0, 2.0),
            prediction("C2", "A1", 3.0, 3.0),
        ];
        assert_eq!(rmse(&predictions).unwrap(), 0.0);
        assert_eq!(mae(&predictions).unwrap(), 0.0);
    }

    #[test]
    fn test_rmse_and_mae() {
        let predictions = vec![prediction("C1", "A1", 5.0, 4.0), prediction("C1", "A2", 1.0, 4.0)];
        assert!((rmse(&predictions).unwrap() - 5f64.sqrt()).abs() < 1e-12);
        assert!((mae(&predictions).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(rmse(&[]), Err(RecError::EmptyInput(_))));
        assert!(matches!(mae(&[]), Err(RecError::EmptyInput(_))));
    }

    #[test]
    fn test_precision_recall_at_k() {
        let predictions = vec![
            prediction("C1", "A1", 5.0, 4.8),
            prediction("C1", "A2", 2.0, 4.5),
            prediction("C1", "A3", 4.0, 3.0),
            prediction("C1", "A4", 5.0, 2.0),
        ];
        let result = precision_recall_at_k(&predictions, 2, 4.0);

        // top-2 are A1 and A2, both recommended, only A1 relevant; 3 relevant overall
        assert_eq!(result.precision["C1"], 0.5);
        assert!((result.recall["C1"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators() {
        let predictions = vec![
            // nothing relevant for C1
            prediction("C1", "A1", 2.0, 4.5),
            prediction("C1", "A2", 1.0, 4.2),
            // nothing recommended for C2
            prediction("C2", "A1", 5.0, 3.0),
            prediction("C2", "A2", 4.0, 2.5),
        ];
        let result = precision_recall_at_k(&predictions, 5, 4.0);

        assert_eq!(result.recall["C1"], 0.0);
        assert_eq!(result.precision["C1"], 0.0);
        assert_eq!(result.precision["C2"], 0.0);
        assert_eq!(result.recall["C2"], 0.0);
    }

    #[test]
    fn test_ties_broken_by_item_id() {
        let predictions = vec![
            prediction("C1", "B", 1.0, 4.0),
            prediction("C1", "A", 5.0, 4.0),
        ];
        let result = precision_recall_at_k(&predictions, 1, 4.0);

        assert_eq!(result.precision["C1"], 1.0);
        assert_eq!(result.recall["C1"], 1.0);
    }

    #[test]
    fn test_values_in_unit_interval_and_means() {
        let predictions: Vec<Prediction> = (0..40)
            .map(|n| {
                prediction(
                    &format!("C{}", n % 7),
                    &format!("A{}", n),
                    (n % 5 + 1) as f64,
                    1.0 + (n * 37 % 41) as f64 / 10.0,
                )
            })
            .collect();
        let result = precision_recall_at_k(&predictions, 3, 3.5);

        assert_eq!(result.precision.len(), 7);
        assert!(result.precision.values().all(|p| (0.0..=1.0).contains(p)));
        assert!(result.recall.values().all(|r| (0.0..=1.0).contains(r)));

        let mean = result.precision.values().sum::<f64>() / 7.0;
        assert!((result.mean_precision() - mean).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&result.f1()));
    }

    #[test]
    fn test_empty_means() {
        let result = PrecisionRecall::default();
        assert_eq!(result.mean_precision(), 0.0);
        assert_eq!(result.mean_recall(), 0.0);
        assert_eq!(result.f1(), 0.0);
    }

    #[test]
    fn test_f1_score() {
        assert_eq!(f1_score(0.0, 0.0), 0.0);
        assert!((f1_score(0.5, 1.0) - 2.0 / 3.0).abs() < 1e-12);
    }
}
