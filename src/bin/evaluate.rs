use anyhow::{Context, Result};
use clap::Parser;
use reviewrec::io::read_ratings_file;
use reviewrec::services::thread_pool;
use reviewrec::utils::{format_count, format_duration};
use reviewrec::{init_tracing, Config, RatingStore, TrainingService};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Trains on a random split of the ratings table and reports held-out accuracy.
#[derive(Parser, Debug)]
#[command(name = "reviewrec-evaluate", author, version, about, long_about = None)]
struct Args {
    /// Ratings TSV written by reviewrec-ingest
    #[arg(long)]
    ratings: Option<String>,

    #[arg(long)]
    test_fraction: Option<f64>,

    #[arg(short)]
    k: Option<usize>,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    factors: Option<usize>,

    /// Train plain biased SVD without the implicit-feedback terms
    #[arg(long)]
    no_implicit: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(path) = &args.ratings {
        config.ingest.ratings_path = path.clone();
    }
    if let Some(test_fraction) = args.test_fraction {
        config.evaluation.test_fraction = test_fraction;
    }
    if let Some(k) = args.k {
        config.evaluation.k = k;
    }
    if let Some(threshold) = args.threshold {
        config.evaluation.threshold = threshold;
    }
    if let Some(epochs) = args.epochs {
        config.model.epochs = epochs;
    }
    if let Some(factors) = args.factors {
        config.model.factors = factors;
    }
    if args.no_implicit {
        config.model.implicit_feedback = false;
    }

    let records = read_ratings_file(&config.ingest.ratings_path)
        .with_context(|| format!("failed to read {}", config.ingest.ratings_path))?;
    info!("Loaded {} ratings", records.len());

    let store = RatingStore::build(records);
    let pool = thread_pool(&config.runtime)?;
    let service = TrainingService::new(Arc::new(config))?;

    let (_, report) = pool.install(|| service.evaluate(&store))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Customers: {}", format_count(store.matrix().num_customers()));
    println!("Items: {}", format_count(store.matrix().num_items()));
    println!(
        "Train/test: {} / {}",
        format_count(report.train_size),
        format_count(report.test_size)
    );
    println!(
        "Training time: {}",
        format_duration(Duration::from_millis(report.training_millis))
    );
    println!("Cold-start predictions: {}", format_count(report.cold_start_predictions));
    println!("RMSE: {:.4}", report.rmse);
    println!("MAE: {:.4}", report.mae);
    println!("Precision@{}: {:.4}", report.k, report.mean_precision);
    println!("Recall@{}: {:.4}", report.k, report.mean_recall);
    println!("F1@{}: {:.4}", report.k, report.f1);

    Ok(())
}
