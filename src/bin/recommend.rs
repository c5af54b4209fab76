use anyhow::{Context, Result};
use clap::Parser;
use reviewrec::io::{read_metadata_file, read_ratings_file};
use reviewrec::services::thread_pool;
use reviewrec::utils::validation::validate_customer_id;
use reviewrec::{init_tracing, Config, RatingStore, Recommender, TrainingService};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Trains on the whole ratings table and prints the best unrated items per customer.
#[derive(Parser, Debug)]
#[command(name = "reviewrec-recommend", author, version, about, long_about = None)]
struct Args {
    #[arg(required = true)]
    customer_ids: Vec<String>,

    #[arg(short)]
    n: Option<usize>,

    #[arg(long)]
    ratings: Option<String>,

    #[arg(long)]
    metadata: Option<String>,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    for customer_id in &args.customer_ids {
        validate_customer_id(customer_id)?;
    }

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(n) = args.n {
        config.recommendation.top_n = n;
    }
    if let Some(path) = &args.ratings {
        config.ingest.ratings_path = path.clone();
    }
    if let Some(path) = &args.metadata {
        config.ingest.metadata_path = path.clone();
    }

    let records = read_ratings_file(&config.ingest.ratings_path)
        .with_context(|| format!("failed to read {}", config.ingest.ratings_path))?;
    let store = RatingStore::build(records);

    let titles: HashMap<String, String> = if Path::new(&config.ingest.metadata_path).exists() {
        read_metadata_file(&config.ingest.metadata_path)
            .with_context(|| format!("failed to read {}", config.ingest.metadata_path))?
            .into_iter()
            .filter_map(|meta| meta.title.map(|title| (meta.item_id, title)))
            .collect()
    } else {
        info!("No metadata at {}, printing ids only", config.ingest.metadata_path);
        HashMap::new()
    };

    let top_n = config.recommendation.top_n;
    let pool = thread_pool(&config.runtime)?;
    let service = TrainingService::new(Arc::new(config))?;
    let model = service.train_full(&store)?;

    let customers: Vec<&str> = args.customer_ids.iter().map(String::as_str).collect();
    let recommender = Recommender::new(&store, &model);
    let all = pool.install(|| recommender.top_n_for_all(&customers, top_n));

    for (customer_id, recs) in &all {
        if !model.knows_customer(customer_id) {
            warn!(customer = %customer_id, "Customer has no ratings, showing cold-start ranking");
        }

        println!("Top {} recommendations for {}:", top_n, customer_id);
        for rec in recs {
            match titles.get(&rec.item_id) {
                Some(title) => println!(
                    "ASIN: {} | Predicted Score: {:.2} | {}",
                    rec.item_id, rec.estimate, title
                ),
                None => println!("ASIN: {} | Predicted Score: {:.2}", rec.item_id, rec.estimate),
            }
        }
    }

    Ok(())
}
