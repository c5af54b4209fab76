//! Review-dump ingestion.
//!
//! The dump is a stream of item records. An `ASIN:` line opens a record, the
//! `title:`, `group:` and `reviews:` lines describe it, and each review line
//! that follows carries a customer id and an integer rating. Only records of
//! the target category contribute ratings and metadata. After parsing,
//! customers are filtered by how many ratings they gave.

use crate::config::IngestConfig;
use crate::error::{RecError, Result};
use crate::models::{
    CountSummary, FilterStats, ItemMetadata, RatingRecord, MAX_RATING, MIN_RATING,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, trace};

const ASIN_MARKER: &str = "ASIN:";
const TITLE_MARKER: &str = "title:";
const GROUP_MARKER: &str = "group:";
const REVIEWS_MARKER: &str = "reviews:";
const RATING_TOKEN: &str = "rating:";
/// The source dump misspells the customer token; the correct spelling is accepted too.
const CUSTOMER_TOKENS: [&str; 2] = ["cutomer:", "customer:"];

/// Filtered output of a dump: sorted ratings, sorted metadata and the filter statistics.
#[derive(Debug, Clone)]
pub struct ParsedDump {
    pub records: Vec<RatingRecord>,
    pub metadata: Vec<ItemMetadata>,
    pub stats: FilterStats,
}

/// Ratings and metadata of the target category before customer filtering.
#[derive(Debug, Clone, Default)]
pub struct RawDump {
    pub ratings: BTreeMap<String, BTreeMap<String, u8>>,
    pub metadata: BTreeMap<String, ItemMetadata>,
}

/// Fields of the item record currently being read; cleared on every `ASIN:` line.
#[derive(Debug, Clone, Default)]
struct CurrentItem {
    item_id: Option<String>,
    title: Option<String>,
    group: Option<String>,
    avg_rating: Option<f64>,
}

impl CurrentItem {
    fn open(item_id: &str) -> Self {
        Self {
            item_id: non_empty(item_id),
            ..Default::default()
        }
    }

    fn in_category(&self, category: &str) -> bool {
        self.group.as_deref() == Some(category)
    }
}

struct Accumulator<'a> {
    category: &'a str,
    current: CurrentItem,
    raw: RawDump,
    lines: usize,
}

impl<'a> Accumulator<'a> {
    fn new(category: &'a str) -> Self {
        Self {
            category,
            current: CurrentItem::default(),
            raw: RawDump::default(),
            lines: 0,
        }
    }

    fn consume(mut self, line: &str) -> Self {
        self.lines += 1;

        if let Some(rest) = line.strip_prefix(ASIN_MARKER) {
            self.current = CurrentItem::open(rest.trim());
        } else if let Some(rest) = line.strip_prefix(TITLE_MARKER) {
            self.current.title = non_empty(rest.trim());
        } else if let Some(rest) = line.strip_prefix(GROUP_MARKER) {
            self.current.group = non_empty(rest.trim());
        } else if line.starts_with(REVIEWS_MARKER) {
            self.summary_line(line);
        } else if self.current.in_category(self.category) {
            self.review_line(line);
        }

        self
    }

    fn summary_line(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Some(avg) = parse_after(&tokens, RATING_TOKEN, |t| t.parse::<f64>().ok()) {
            self.current.avg_rating = Some(avg);
        }

        if !self.current.in_category(self.category) {
            return;
        }
        if let Some(item_id) = &self.current.item_id {
            self.raw.metadata.insert(
                item_id.clone(),
                ItemMetadata {
                    item_id: item_id.clone(),
                    title: self.current.title.clone(),
                    avg_rating: self.current.avg_rating,
                },
            );
        }
    }

    fn review_line(&mut self, line: &str) {
        if !line.contains(RATING_TOKEN) || !CUSTOMER_TOKENS.iter().any(|t| line.contains(t)) {
            return;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let customer = parse_after(&tokens, CUSTOMER_TOKENS[0], |t| Some(t.to_string()))
            .or_else(|| parse_after(&tokens, CUSTOMER_TOKENS[1], |t| Some(t.to_string())));
        let rating = parse_after(&tokens, RATING_TOKEN, |t| t.parse::<u8>().ok())
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(r));

        match (customer, rating, &self.current.item_id) {
            (Some(customer), Some(rating), Some(item_id)) => {
                self.raw
                    .ratings
                    .entry(customer)
                    .or_default()
                    .insert(item_id.clone(), rating);
            }
            _ => trace!(line = self.lines, "skipping incomplete review line"),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parses the token following each occurrence of `marker`; the last successful parse wins.
fn parse_after<T>(tokens: &[&str], marker: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    tokens
        .windows(2)
        .filter(|pair| pair[0] == marker)
        .filter_map(|pair| parse(pair[1]))
        .last()
}

/// Streams a dump into per-customer ratings and item metadata of `category`.
pub fn read_raw<R: BufRead>(reader: R, category: &str) -> Result<RawDump> {
    let accumulator = reader
        .split(b'\n')
        .try_fold(Accumulator::new(category), |acc, bytes| {
            let bytes = bytes?;
            let line = String::from_utf8_lossy(&bytes);
            Ok::<_, std::io::Error>(acc.consume(line.trim()))
        })?;

    debug!(
        lines = accumulator.lines,
        customers = accumulator.raw.ratings.len(),
        items = accumulator.raw.metadata.len(),
        "Read review dump"
    );

    Ok(accumulator.raw)
}

fn check_bounds(min_ratings: usize, max_ratings: usize) -> Result<()> {
    if min_ratings > max_ratings {
        return Err(RecError::invalid(format!(
            "min_ratings ({}) exceeds max_ratings ({})",
            min_ratings, max_ratings
        )));
    }
    Ok(())
}

/// Keeps customers whose rating count lies in `[min_ratings, max_ratings]` and the
/// metadata of items they rated. Inverted bounds are rejected.
pub fn filter(raw: RawDump, min_ratings: usize, max_ratings: usize) -> Result<ParsedDump> {
    check_bounds(min_ratings, max_ratings)?;

    let total_customers = raw.ratings.len();
    let ratings_before = raw.ratings.values().map(BTreeMap::len).sum();
    let items_before = raw.metadata.len();

    let mut removed_too_few = 0;
    let mut removed_too_many = 0;
    let mut kept_counts = Vec::new();
    let mut records = Vec::new();

    for (customer_id, items) in raw.ratings {
        let count = items.len();
        if count < min_ratings {
            removed_too_few += 1;
            continue;
        }
        if count > max_ratings {
            removed_too_many += 1;
            continue;
        }

        kept_counts.push(count);
        records.extend(
            items
                .into_iter()
                .map(|(item_id, rating)| RatingRecord::new(customer_id.clone(), item_id, rating)),
        );
    }

    let rated_items: BTreeSet<&str> = records.iter().map(|r| r.item_id.as_str()).collect();
    let metadata: Vec<ItemMetadata> = raw
        .metadata
        .into_values()
        .filter(|meta| rated_items.contains(meta.item_id.as_str()))
        .collect();

    let stats = FilterStats {
        min_ratings,
        max_ratings,
        total_customers,
        removed_too_few,
        removed_too_many,
        kept: kept_counts.len(),
        ratings_before,
        ratings_after: records.len(),
        items_before,
        items_after: metadata.len(),
        distribution: summarize_counts(&kept_counts),
    };

    Ok(ParsedDump {
        records,
        metadata,
        stats,
    })
}

/// Min, quartiles by floor indexing into the sorted counts, max and mean.
pub fn summarize_counts(counts: &[usize]) -> Option<CountSummary> {
    if counts.is_empty() {
        return None;
    }

    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();

    Some(CountSummary {
        min: sorted[0],
        q1: sorted[n / 4],
        median: sorted[n / 2],
        q3: sorted[3 * n / 4],
        max: sorted[n - 1],
        mean: sorted.iter().sum::<usize>() as f64 / n as f64,
    })
}

/// Parser configured with the target category and the customer-activity bounds.
#[derive(Debug, Clone)]
pub struct IngestFilter {
    category: String,
    min_ratings: usize,
    max_ratings: usize,
}

impl IngestFilter {
    pub fn new(min_ratings: usize, max_ratings: usize) -> Self {
        Self {
            category: IngestConfig::default().category,
            min_ratings,
            max_ratings,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.min_ratings, config.max_ratings).with_category(config.category.clone())
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn parse(&self, path: impl AsRef<Path>) -> Result<ParsedDump> {
        let path = path.as_ref();
        info!("Parsing {}", path.display());
        let file = File::open(path)?;
        self.parse_reader(BufReader::new(file))
    }

    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<ParsedDump> {
        check_bounds(self.min_ratings, self.max_ratings)?;
        let raw = read_raw(reader, &self.category)?;
        info!(
            min = self.min_ratings,
            max = self.max_ratings,
            "Filtering customers"
        );
        filter(raw, self.min_ratings, self.max_ratings)
    }
}

/// Parses the dump at `path` for the default category and filters it.
pub fn parse(path: impl AsRef<Path>, min_ratings: usize, max_ratings: usize) -> Result<ParsedDump> {
    IngestFilter::new(min_ratings, max_ratings).parse(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_MUSIC_ITEMS: &str = "\
Id:   1
ASIN: A1
  title: First Album
  group: Music
  salesrank: 100
  similar: 0
  categories: 1
   |Music[5174]|Styles[301668]
  reviews: total: 2  downloaded: 2  avg rating: 5
    2000-7-28  cutomer: C1  rating: 5  votes:  10  helpful:   9
    2001-1-2  cutomer: C2  rating: 5  votes:   0  helpful:   0

Id:   2
ASIN: A2
  title: Second Album
  group: Music
  reviews: total: 2  downloaded: 2  avg rating: 3
    2002-3-4  cutomer: C1  rating: 3  votes:   1  helpful:   1
    2002-5-6  cutomer: C3  rating: 3  votes:   2  helpful:   0
";

    fn parse_str(input: &str, min: usize, max: usize) -> ParsedDump {
        IngestFilter::new(min, max)
            .parse_reader(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_two_music_items_keep_everything() {
        let dump = parse_str(TWO_MUSIC_ITEMS, 1, 10);

        assert_eq!(
            dump.records,
            vec![
                RatingRecord::new("C1", "A1", 5),
                RatingRecord::new("C1", "A2", 3),
                RatingRecord::new("C2", "A1", 5),
                RatingRecord::new("C3", "A2", 3),
            ]
        );
        assert_eq!(dump.metadata.len(), 2);
        assert_eq!(dump.metadata[0].title.as_deref(), Some("First Album"));
        assert_eq!(dump.metadata[1].avg_rating, Some(3.0));

        assert_eq!(dump.stats.total_customers, 3);
        assert_eq!(dump.stats.removed_too_few, 0);
        assert_eq!(dump.stats.removed_too_many, 0);
        assert_eq!(dump.stats.kept, 3);
        assert_eq!(dump.stats.ratings_before, 4);
        assert_eq!(dump.stats.ratings_after, 4);
    }

    #[test]
    fn test_single_rating_customers_removed() {
        let dump = parse_str(TWO_MUSIC_ITEMS, 2, 10);

        assert_eq!(dump.stats.removed_too_few, 2);
        assert_eq!(dump.stats.kept, 1);
        assert!(dump.records.iter().all(|r| r.customer_id == "C1"));
        assert_eq!(dump.stats.ratings_after, 2);
        assert_eq!(dump.stats.items_after, 2);
    }

    #[test]
    fn test_one_extra_single_rating_customer() {
        let input = format!(
            "{}ASIN: A3\n  group: Music\n  reviews: total: 1  avg rating: 4\n    \
             2003-1-1  cutomer: C9  rating: 4  votes: 0  helpful: 0\n",
            TWO_MUSIC_ITEMS
        );
        let before = parse_str(TWO_MUSIC_ITEMS, 1, 10);
        let after = parse_str(&input, 2, 10);
        let baseline = parse_str(TWO_MUSIC_ITEMS, 2, 10);

        assert_eq!(before.stats.removed_too_few, 0);
        assert_eq!(after.stats.removed_too_few, baseline.stats.removed_too_few + 1);
        assert!(after.records.iter().all(|r| r.customer_id != "C9"));
        assert!(after.metadata.iter().all(|m| m.item_id != "A3"));
    }

    #[test]
    fn test_too_many_ratings_removed() {
        let dump = parse_str(TWO_MUSIC_ITEMS, 1, 1);

        assert_eq!(dump.stats.removed_too_many, 1);
        assert_eq!(dump.stats.kept, 2);
        assert!(dump.records.iter().all(|r| r.customer_id != "C1"));
    }

    #[test]
    fn test_other_categories_dropped() {
        let input = "\
ASIN: B1
  title: A Book
  group: Book
  reviews: total: 1  downloaded: 1  avg rating: 4
    2000-1-1  cutomer: C1  rating: 4  votes: 0  helpful: 0
ASIN: A1
  group: Music
  reviews: total: 1  downloaded: 1  avg rating: 2
    2000-1-1  cutomer: C2  rating: 2  votes: 0  helpful: 0
";
        let dump = parse_str(input, 1, 10);

        assert_eq!(dump.records, vec![RatingRecord::new("C2", "A1", 2)]);
        assert_eq!(dump.metadata.len(), 1);
        assert_eq!(dump.metadata[0].item_id, "A1");
        assert_eq!(dump.metadata[0].title, None);
    }

    #[test]
    fn test_marker_resets_item_state() {
        let input = "\
ASIN: A1
  title: Leaky Title
  group: Music
ASIN: A2
  reviews: total: 1  downloaded: 1  avg rating: 4
    2000-1-1  cutomer: C1  rating: 4  votes: 0  helpful: 0
";
        let dump = parse_str(input, 1, 10);

        // A2 never declared a group, so nothing is attributed to it
        assert!(dump.records.is_empty());
        assert!(dump.metadata.is_empty());
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let input = "\
ASIN: A1
  title: Odd Album
  group: Music
  reviews: total: 3  downloaded: 3  avg rating: n/a
    2000-1-1  cutomer: C1  rating: five  votes: 0  helpful: 0
    2000-1-2  cutomer: C2  rating: 9  votes: 0  helpful: 0
    2000-1-3  cutomer: C3  rating: 0  votes: 0  helpful: 0
    2000-1-4  cutomer:
    2000-1-5  cutomer: C4  rating: 4  votes: 0  helpful: 0
    2000-1-6  cutomer: C5  rating:
";
        let dump = parse_str(input, 1, 10);

        assert_eq!(dump.records, vec![RatingRecord::new("C4", "A1", 4)]);
        assert_eq!(dump.metadata[0].avg_rating, None);
        assert_eq!(dump.metadata[0].title.as_deref(), Some("Odd Album"));
        assert_eq!(dump.stats.total_customers, 1);
    }

    #[test]
    fn test_ratings_stay_in_range() {
        let dump = parse_str(TWO_MUSIC_ITEMS, 1, 100);
        assert!(dump
            .records
            .iter()
            .all(|r| (MIN_RATING..=MAX_RATING).contains(&r.rating)));
    }

    #[test]
    fn test_duplicate_rating_keeps_last() {
        let input = "\
ASIN: A1
  group: Music
  reviews: total: 2  downloaded: 2  avg rating: 3
    2000-1-1  cutomer: C1  rating: 1  votes: 0  helpful: 0
    2000-1-2  cutomer: C1  rating: 5  votes: 0  helpful: 0
";
        let dump = parse_str(input, 1, 10);
        assert_eq!(dump.records, vec![RatingRecord::new("C1", "A1", 5)]);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut input = b"ASIN: A1\n  title: Caf\xe9\n  group: Music\n".to_vec();
        input.extend_from_slice(b"  reviews: total: 1  avg rating: 4\n");
        input.extend_from_slice(b"    2000-1-1  cutomer: C1  rating: 4  votes: 0\n");

        let dump = IngestFilter::new(1, 10)
            .parse_reader(input.as_slice())
            .unwrap();
        assert_eq!(dump.records.len(), 1);
        assert!(dump.metadata[0].title.as_deref().unwrap().starts_with("Caf"));
    }

    #[test]
    fn test_empty_input() {
        let dump = parse_str("", 2, 100);

        assert!(dump.records.is_empty());
        assert_eq!(dump.stats.total_customers, 0);
        assert_eq!(dump.stats.kept_pct(), 0.0);
        assert!(dump.stats.distribution.is_none());
    }

    #[test]
    fn test_custom_category() {
        let input = TWO_MUSIC_ITEMS.replace("group: Music", "group: DVD");
        let dump = IngestFilter::new(1, 10)
            .with_category("DVD")
            .parse_reader(input.as_bytes())
            .unwrap();
        assert_eq!(dump.stats.kept, 3);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = IngestFilter::new(3, 1).parse_reader(TWO_MUSIC_ITEMS.as_bytes());
        assert!(matches!(result, Err(RecError::InvalidParameter(_))));

        let raw = read_raw(TWO_MUSIC_ITEMS.as_bytes(), "Music").unwrap();
        assert!(matches!(filter(raw, 2, 1), Err(RecError::InvalidParameter(_))));
    }

    #[test]
    fn test_equal_bounds_keep_exact_count() {
        // C1 rated two items, C2 and C3 one each
        let dump = parse_str(TWO_MUSIC_ITEMS, 1, 1);
        assert_eq!(dump.stats.removed_too_few, 0);
        assert_eq!(dump.stats.removed_too_many, 1);
        assert_eq!(dump.stats.kept, 2);
    }

    #[test]
    fn test_summarize_counts() {
        let summary = summarize_counts(&[8, 1, 7, 2, 6, 3, 5, 4]).unwrap();

        assert_eq!(summary.min, 1);
        assert_eq!(summary.q1, 3);
        assert_eq!(summary.median, 5);
        assert_eq!(summary.q3, 7);
        assert_eq!(summary.max, 8);
        assert_eq!(summary.mean, 4.5);

        let single = summarize_counts(&[3]).unwrap();
        assert_eq!((single.q1, single.median, single.q3), (3, 3, 3));
        assert!(summarize_counts(&[]).is_none());
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_MUSIC_ITEMS.as_bytes()).unwrap();

        let dump = parse(file.path(), 1, 10).unwrap();
        assert_eq!(dump.stats.kept, 3);
        assert!(parse("/nonexistent/dump.txt", 1, 10).is_err());
    }
}
