use anyhow::{Context, Result};
use clap::Parser;
use reviewrec::io::{write_metadata_file, write_ratings_file};
use reviewrec::utils::format_count;
use reviewrec::utils::validation::validate_ingest_config;
use reviewrec::{init_tracing, Config, FilterStats, IngestFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

const USAGE: &str = "\
Usage: reviewrec-ingest <input_file> [min_ratings] [max_ratings]

Default: min_ratings=2, max_ratings=100

Outputs:
  - customer_ratings_filtered.txt: All ratings (TSV format)
  - asin_metadata_filtered.txt: ASIN info (TSV)";

/// Filters a raw review dump into a ratings table and an item metadata table.
#[derive(Parser, Debug)]
#[command(name = "reviewrec-ingest", author, version, about, long_about = None)]
struct Args {
    input_file: Option<PathBuf>,

    min_ratings: Option<usize>,

    max_ratings: Option<usize>,

    #[arg(long)]
    ratings_out: Option<String>,

    #[arg(long)]
    metadata_out: Option<String>,

    /// Product group whose reviews are kept
    #[arg(long)]
    category: Option<String>,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let Some(input_file) = args.input_file.clone() else {
        println!("{}", USAGE);
        return ExitCode::from(1);
    };

    init_tracing(&args.log_level);

    match run(&args, input_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args, input_file: PathBuf) -> Result<()> {
    let mut config = Config::load_or_default(&args.config)?;
    if let Some(min_ratings) = args.min_ratings {
        config.ingest.min_ratings = min_ratings;
    }
    if let Some(max_ratings) = args.max_ratings {
        config.ingest.max_ratings = max_ratings;
    }
    if let Some(category) = &args.category {
        config.ingest.category = category.clone();
    }
    if let Some(path) = &args.ratings_out {
        config.ingest.ratings_path = path.clone();
    }
    if let Some(path) = &args.metadata_out {
        config.ingest.metadata_path = path.clone();
    }
    validate_ingest_config(&config.ingest)?;

    let start = Instant::now();
    let dump = IngestFilter::from_config(&config.ingest)
        .parse(&input_file)
        .with_context(|| format!("failed to parse {}", input_file.display()))?;

    print_summary(&dump.stats);

    println!("\nWriting output files...");
    write_ratings_file(&config.ingest.ratings_path, &dump.records)
        .with_context(|| format!("failed to write {}", config.ingest.ratings_path))?;
    println!("  {}", config.ingest.ratings_path);
    write_metadata_file(&config.ingest.metadata_path, &dump.metadata)
        .with_context(|| format!("failed to write {}", config.ingest.metadata_path))?;
    println!("  {}", config.ingest.metadata_path);

    info!(
        ratings = dump.records.len(),
        items = dump.metadata.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Ingest finished"
    );
    println!("\nDone!");
    Ok(())
}

fn print_summary(stats: &FilterStats) {
    println!("=== Filtering Statistics ===");
    println!("Customers:");
    println!("  Total: {}", format_count(stats.total_customers));
    println!(
        "  Removed (< {} ratings): {} ({:.1}%)",
        stats.min_ratings,
        format_count(stats.removed_too_few),
        stats.removed_too_few_pct()
    );
    println!(
        "  Removed (> {} ratings): {} ({:.1}%)",
        stats.max_ratings,
        format_count(stats.removed_too_many),
        stats.removed_too_many_pct()
    );
    println!("  Kept: {} ({:.1}%)", format_count(stats.kept), stats.kept_pct());

    println!("\nRatings:");
    println!("  Total before: {}", format_count(stats.ratings_before));
    println!(
        "  Total after: {} ({:.1}%)",
        format_count(stats.ratings_after),
        stats.ratings_after_pct()
    );

    if let Some(summary) = &stats.distribution {
        println!("\nRating count distribution (kept customers):");
        println!("  Min: {}", summary.min);
        println!("  Q1 (25%): {}", summary.q1);
        println!("  Median: {}", summary.median);
        println!("  Q3 (75%): {}", summary.q3);
        println!("  Max: {}", summary.max);
        println!("  Average: {:.1}", summary.mean);
    }

    println!("\nASINs:");
    println!("  Total in original data: {}", format_count(stats.items_before));
    println!("  In filtered ratings: {}", format_count(stats.items_after));
}
