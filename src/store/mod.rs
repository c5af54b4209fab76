//! In-memory rating matrix and seeded train/test partitioning.

use crate::error::{RecError, Result};
use crate::models::{RatingRecord, Triple};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// customer -> (item -> rating), with the reverse index item -> customers.
#[derive(Debug, Clone, Default)]
pub struct RatingMatrix {
    by_customer: BTreeMap<String, BTreeMap<String, u8>>,
    by_item: BTreeMap<String, BTreeSet<String>>,
    num_ratings: usize,
}

impl RatingMatrix {
    fn insert(&mut self, record: RatingRecord) {
        let previous = self
            .by_customer
            .entry(record.customer_id.clone())
            .or_default()
            .insert(record.item_id.clone(), record.rating);
        if previous.is_none() {
            self.num_ratings += 1;
        }

        self.by_item
            .entry(record.item_id)
            .or_default()
            .insert(record.customer_id);
    }

    pub fn num_customers(&self) -> usize {
        self.by_customer.len()
    }

    pub fn num_items(&self) -> usize {
        self.by_item.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.num_ratings
    }

    pub fn rating(&self, customer_id: &str, item_id: &str) -> Option<u8> {
        self.by_customer.get(customer_id)?.get(item_id).copied()
    }

    /// Items rated by `customer_id` with their ratings; empty for unknown customers.
    pub fn ratings_of(&self, customer_id: &str) -> impl Iterator<Item = (&str, u8)> + '_ {
        self.by_customer
            .get(customer_id)
            .into_iter()
            .flat_map(|items| items.iter().map(|(item, rating)| (item.as_str(), *rating)))
    }

    pub fn has_rated(&self, customer_id: &str, item_id: &str) -> bool {
        self.rating(customer_id, item_id).is_some()
    }

    pub fn customers_for_item(&self, item_id: &str) -> Option<&BTreeSet<String>> {
        self.by_item.get(item_id)
    }

    /// Item ids in ascending order.
    pub fn items(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_item.keys().map(String::as_str)
    }

    /// Every rating as a triple, ordered by customer then item.
    pub fn triples(&self) -> Vec<Triple> {
        self.by_customer
            .iter()
            .flat_map(|(customer, items)| {
                items
                    .iter()
                    .map(move |(item, rating)| Triple::new(customer.clone(), item.clone(), *rating))
            })
            .collect()
    }
}

/// Owner of the filtered rating matrix.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    matrix: RatingMatrix,
}

impl RatingStore {
    pub fn build(records: impl IntoIterator<Item = RatingRecord>) -> Self {
        let mut matrix = RatingMatrix::default();
        for record in records {
            matrix.insert(record);
        }

        debug!(
            customers = matrix.num_customers(),
            items = matrix.num_items(),
            ratings = matrix.num_ratings(),
            "Built rating matrix"
        );

        Self { matrix }
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn all_triples(&self) -> Vec<Triple> {
        self.matrix.triples()
    }

    /// Uniform random partition of the individual ratings into `(train, test)`.
    ///
    /// The test side receives `ceil(test_fraction * n)` ratings. The matrix is left
    /// untouched; a customer may end up with no training ratings at all.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Vec<Triple>, Vec<Triple>)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(RecError::invalid(format!(
                "test fraction must lie in (0, 1), got {}",
                test_fraction
            )));
        }

        let mut triples = self.matrix.triples();
        let mut rng = StdRng::seed_from_u64(seed);
        triples.shuffle(&mut rng);

        let test_size = ((test_fraction * triples.len() as f64).ceil() as usize).min(triples.len());
        let train = triples.split_off(test_size);

        debug!(train = train.len(), test = triples.len(), seed, "Split ratings");
        Ok((train, triples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_store() -> RatingStore {
        RatingStore::build(vec![
            RatingRecord::new("C1", "A1", 5),
            RatingRecord::new("C1", "A2", 3),
            RatingRecord::new("C2", "A1", 5),
            RatingRecord::new("C3", "A2", 3),
            RatingRecord::new("C3", "A3", 1),
            RatingRecord::new("C4", "A3", 4),
            RatingRecord::new("C4", "A1", 2),
        ])
    }

    #[test]
    fn test_build_indexes_both_directions() {
        let store = sample_store();
        let matrix = store.matrix();

        assert_eq!(matrix.num_customers(), 4);
        assert_eq!(matrix.num_items(), 3);
        assert_eq!(matrix.num_ratings(), 7);
        assert_eq!(matrix.rating("C1", "A2"), Some(3));
        assert_eq!(matrix.rating("C2", "A2"), None);
        assert!(matrix.has_rated("C4", "A3"));

        let raters: Vec<&str> = matrix
            .customers_for_item("A1")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(raters, vec!["C1", "C2", "C4"]);
        assert_eq!(matrix.items().collect::<Vec<_>>(), vec!["A1", "A2", "A3"]);
        assert_eq!(matrix.ratings_of("nobody").count(), 0);
    }

    #[test]
    fn test_duplicate_record_overwrites() {
        let store = RatingStore::build(vec![
            RatingRecord::new("C1", "A1", 2),
            RatingRecord::new("C1", "A1", 4),
        ]);
        assert_eq!(store.matrix().num_ratings(), 1);
        assert_eq!(store.matrix().rating("C1", "A1"), Some(4));
    }

    #[test]
    fn test_split_partitions_all_ratings() {
        let store = sample_store();
        let full: HashSet<Triple> = store.all_triples().into_iter().collect();

        for seed in [0, 1, 7, 42, 1234] {
            for fraction in [0.1, 0.2, 0.5, 0.9] {
                let (train, test) = store.split(fraction, seed).unwrap();
                let train: HashSet<Triple> = train.into_iter().collect();
                let test: HashSet<Triple> = test.into_iter().collect();

                assert!(train.is_disjoint(&test));
                let union: HashSet<Triple> = train.union(&test).cloned().collect();
                assert_eq!(union, full);
            }
        }
    }

    #[test]
    fn test_split_sizes_and_reproducibility() {
        let store = sample_store();

        let (train, test) = store.split(0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 5);

        let (train_again, test_again) = store.split(0.2, 42).unwrap();
        assert_eq!(train, train_again);
        assert_eq!(test, test_again);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let store = sample_store();
        assert!(store.split(0.0, 1).is_err());
        assert!(store.split(1.0, 1).is_err());
        assert!(store.split(f64::NAN, 1).is_err());
    }

    #[test]
    fn test_split_leaves_matrix_untouched() {
        let store = sample_store();
        let before = store.all_triples();
        let _ = store.split(0.5, 3).unwrap();
        assert_eq!(store.all_triples(), before);
    }
}
