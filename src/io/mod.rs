//! Tab-separated ratings and metadata files.
//!
//! Ratings: header `CustomerID\tASIN\tRating`, rows sorted by customer then item.
//! Metadata: header `ASIN\tTitle\tAvgRating`, rows sorted by item, absent values
//! left empty.

use crate::error::{RecError, Result};
use crate::models::{ItemMetadata, RatingRecord, MAX_RATING, MIN_RATING};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const RATINGS_HEADER: [&str; 3] = ["CustomerID", "ASIN", "Rating"];
pub const METADATA_HEADER: [&str; 3] = ["ASIN", "Title", "AvgRating"];

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer)
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader)
}

/// Renders an average the way the dump's consumers expect it: `4.5`, `4.0`.
fn format_avg(avg: f64) -> String {
    format!("{:?}", avg)
}

pub fn write_ratings<W: Write>(writer: W, records: &[RatingRecord]) -> Result<()> {
    let mut sorted: Vec<&RatingRecord> = records.iter().collect();
    sorted.sort();

    let mut wtr = tsv_writer(writer);
    wtr.write_record(RATINGS_HEADER)?;
    for record in sorted {
        let rating = record.rating.to_string();
        wtr.write_record([record.customer_id.as_str(), record.item_id.as_str(), rating.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_metadata<W: Write>(writer: W, metadata: &[ItemMetadata]) -> Result<()> {
    let mut sorted: Vec<&ItemMetadata> = metadata.iter().collect();
    sorted.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    let mut wtr = tsv_writer(writer);
    wtr.write_record(METADATA_HEADER)?;
    for meta in sorted {
        let avg_rating = meta.avg_rating.map(format_avg).unwrap_or_default();
        wtr.write_record([
            meta.item_id.as_str(),
            meta.title.as_deref().unwrap_or(""),
            avg_rating.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_ratings<R: Read>(reader: R) -> Result<Vec<RatingRecord>> {
    let mut rdr = tsv_reader(reader);
    let mut records = Vec::new();

    for (row, result) in rdr.deserialize::<RatingRecord>().enumerate() {
        let record = result?;
        if !(MIN_RATING..=MAX_RATING).contains(&record.rating) {
            return Err(RecError::invalid(format!(
                "rating {} on data row {} is outside [{}, {}]",
                record.rating,
                row + 1,
                MIN_RATING,
                MAX_RATING
            )));
        }
        records.push(record);
    }

    Ok(records)
}

pub fn read_metadata<R: Read>(reader: R) -> Result<Vec<ItemMetadata>> {
    let mut rdr = tsv_reader(reader);
    let records = rdr
        .deserialize::<ItemMetadata>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn write_ratings_file(path: impl AsRef<Path>, records: &[RatingRecord]) -> Result<()> {
    write_ratings(File::create(path)?, records)
}

pub fn write_metadata_file(path: impl AsRef<Path>, metadata: &[ItemMetadata]) -> Result<()> {
    write_metadata(File::create(path)?, metadata)
}

pub fn read_ratings_file(path: impl AsRef<Path>) -> Result<Vec<RatingRecord>> {
    read_ratings(File::open(path)?)
}

pub fn read_metadata_file(path: impl AsRef<Path>) -> Result<Vec<ItemMetadata>> {
    read_metadata(File::open(path)?)
}
