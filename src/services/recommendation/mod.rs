use crate::algorithms::RatingPredictor;
use crate::models::ScoredItem;
use crate::store::RatingStore;
use crate::utils::metrics::by_estimate_desc;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Ranks the items a customer has not rated yet.
pub struct Recommender<'a, P: RatingPredictor + ?Sized> {
    store: &'a RatingStore,
    model: &'a P,
}

impl<'a, P: RatingPredictor + ?Sized> Recommender<'a, P> {
    pub fn new(store: &'a RatingStore, model: &'a P) -> Self {
        Self { store, model }
    }

    /// Every item in the store minus the ones `customer_id` already rated.
    pub fn candidates(&self, customer_id: &str) -> Vec<&'a str> {
        let matrix = self.store.matrix();
        matrix
            .items()
            .filter(|item| !matrix.has_rated(customer_id, item))
            .collect()
    }

    /// At most `n` unrated items, best estimate first, item id ascending on ties.
    /// Customers unknown to the store rank the whole catalogue.
    pub fn top_n(&self, customer_id: &str, n: usize) -> Vec<ScoredItem> {
        let candidates = self.candidates(customer_id);
        let estimates = self.model.predict_items(customer_id, &candidates);

        let mut scored: Vec<ScoredItem> = candidates
            .into_iter()
            .zip(estimates)
            .map(|(item_id, estimate)| ScoredItem {
                item_id: item_id.to_string(),
                estimate: estimate.value,
            })
            .collect();

        scored.sort_by(|a, b| by_estimate_desc(a.estimate, &a.item_id, b.estimate, &b.item_id));
        scored.truncate(n);

        debug!(customer = customer_id, returned = scored.len(), "Ranked candidates");
        scored
    }

    /// Independent top-n lists for several customers, computed in parallel.
    pub fn top_n_for_all(&self, customer_ids: &[&str], n: usize) -> BTreeMap<String, Vec<ScoredItem>> {
        customer_ids
            .par_iter()
            .map(|customer_id| (customer_id.to_string(), self.top_n(customer_id, n)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}

/// Free-function form of [`Recommender::top_n`].
pub fn top_n<P: RatingPredictor + ?Sized>(
    customer_id: &str,
    n: usize,
    store: &RatingStore,
    model: &P,
) -> Vec<ScoredItem> {
    Recommender::new(store, model).top_n(customer_id, n)
}
