use serde::{Deserialize, Serialize};

/// Lowest rating accepted from the dump.
pub const MIN_RATING: u8 = 1;
/// Highest rating accepted from the dump.
pub const MAX_RATING: u8 = 5;

/// One customer's rating of one item. Column names follow the ratings TSV header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "ASIN")]
    pub item_id: String,
    #[serde(rename = "Rating")]
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(rename = "ASIN")]
    pub item_id: String,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "AvgRating")]
    pub avg_rating: Option<f64>,
}

/// A (customer, item, rating) entry of a train or test partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub customer_id: String,
    pub item_id: String,
    pub rating: u8,
}

/// Five-number summary plus mean of the kept customers' rating counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountSummary {
    pub min: usize,
    pub q1: usize,
    pub median: usize,
    pub q3: usize,
    pub max: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub min_ratings: usize,
    pub max_ratings: usize,
    pub total_customers: usize,
    pub removed_too_few: usize,
    pub removed_too_many: usize,
    pub kept: usize,
    pub ratings_before: usize,
    pub ratings_after: usize,
    pub items_before: usize,
    pub items_after: usize,
    pub distribution: Option<CountSummary>,
}

/// Percentage of `part` in `whole`, zero when `whole` is empty.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

impl FilterStats {
    pub fn removed_too_few_pct(&self) -> f64 {
        percentage(self.removed_too_few, self.total_customers)
    }

    pub fn removed_too_many_pct(&self) -> f64 {
        percentage(self.removed_too_many, self.total_customers)
    }

    pub fn kept_pct(&self) -> f64 {
        percentage(self.kept, self.total_customers)
    }

    pub fn ratings_after_pct(&self) -> f64 {
        percentage(self.ratings_after, self.ratings_before)
    }
}

/// Model output for a single (customer, item) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    /// True when the customer or the item was absent from training.
    pub cold_start: bool,
}

/// A held-out rating next to the model's estimate for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub customer_id: String,
    pub item_id: String,
    pub true_rating: f64,
    pub estimate: f64,
    pub cold_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: String,
    pub estimate: f64,
}

impl RatingRecord {
    pub fn new(customer_id: impl Into<String>, item_id: impl Into<String>, rating: u8) -> Self {
        Self {
            customer_id: customer_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }
}

impl Triple {
    pub fn new(customer_id: impl Into<String>, item_id: impl Into<String>, rating: u8) -> Self {
        Self {
            customer_id: customer_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }
}

impl From<RatingRecord> for Triple {
    fn from(record: RatingRecord) -> Self {
        Self {
            customer_id: record.customer_id,
            item_id: record.item_id,
            rating: record.rating,
        }
    }
}

impl Prediction {
    pub fn new(triple: &Triple, estimate: Estimate) -> Self {
        Self {
            customer_id: triple.customer_id.clone(),
            item_id: triple.item_id.clone(),
            true_rating: triple.rating as f64,
            estimate: estimate.value,
            cold_start: estimate.cold_start,
        }
    }
}
