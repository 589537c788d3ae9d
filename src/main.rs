use anyhow::{Context, Result};
use crate::config::PipelineConfig;
use crate::pipeline::Preprocessor;
use crate::processor::{RecordFlattener, TextCleaner};
use crate::storage::LocalStorage;
use std::env;
use tracing::{info, warn};

mod config;
mod error;
mod pipeline;
mod processor;
mod storage;

const DEFAULT_CONFIG_PATH: &str = "src/configs/pipeline.toml";

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = config_path_from_args(env::args().skip(1));
    info!("🚀 Starting movie review preprocessing pipeline");

    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load pipeline configuration from {}", config_path))?;

    info!(
        "Inputs: movies={}, reviews={}",
        config.input.movies.display(),
        config.input.reviews.display()
    );

    let flattener = RecordFlattener::new();

    let raw_movies = LocalStorage::load_records(&config.input.movies)?;
    let movies = flattener.flatten_to_dataframe(&raw_movies)?;
    info!("Flattened movies to DataFrame with {} rows", movies.height());

    let raw_reviews = LocalStorage::load_records(&config.input.reviews)?;
    let reviews = flattener.flatten_to_dataframe(&raw_reviews)?;
    info!("Flattened reviews to DataFrame with {} rows", reviews.height());

    if reviews.height() == 0 {
        warn!("⚠️ No reviews to process, nothing will be written");
        return Ok(());
    }

    let mut merged = match &config.text.stopwords_file {
        Some(path) => {
            let cleaner = TextCleaner::from_stopword_file(path)?;
            info!("Using {} custom stopwords", cleaner.stopword_count());
            let today = chrono::Local::now().date_naive();
            Preprocessor::new(cleaner).run(movies, reviews, today)?
        }
        None => pipeline::preprocess(movies, reviews)?,
    };

    let storage = LocalStorage::new(&config.output.dir);
    let output_path = storage.store_parquet(&mut merged)?;

    info!("=== Pipeline Summary ===");
    info!("📊 Merged rows: {}", merged.height());
    info!("📊 Columns: {}", merged.width());
    info!("✅ Output written to {}", output_path.display());

    Ok(())
}

fn config_path_from_args(mut args: impl Iterator<Item = String>) -> String {
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            if let Some(path) = args.next() {
                return path;
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }

    DEFAULT_CONFIG_PATH.to_string()
}
