use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod classify;
mod config;
mod corpus;
mod engine;
mod error;
mod geo;
mod logging;
mod rank;
mod scoring;

use crate::classify::{BayesClassifier, CategoryClassifier};
use crate::config::AppConfig;
use crate::corpus::CorpusStore;
use crate::engine::RecommendEngine;

#[derive(Parser)]
#[command(name = "placerank")]
#[command(about = "Location recommendation blending category relevance and proximity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend POIs for a query at a location
    Recommend {
        #[arg(help = "Free-text query, e.g. 'indonesian consulate'")]
        query: String,

        #[arg(long, help = "User latitude", allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, help = "User longitude", allow_hyphen_values = true)]
        lng: f64,

        #[arg(long, help = "Print the full response as JSON")]
        json: bool,
    },

    /// Classify a query without ranking anything
    Classify {
        #[arg(help = "Free-text query")]
        query: String,
    },

    /// Validate the corpus file and print category statistics
    CorpusCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        AppConfig::load_from_file(config_path).await?
    } else {
        AppConfig::load().await?
    };

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init_logging(&config.logging)?;

    info!("placerank v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Recommend { query, lat, lng, json } => {
            let engine = RecommendEngine::from_config(&config)?;
            let recommendation = engine.recommend(&query, lat, lng).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                print_recommendation(&recommendation);
            }
        }

        Commands::Classify { query } => {
            let classifier = BayesClassifier::load(&config.classifier.model_dir)?;
            let prediction = classifier.classify(&query)?;
            println!("{} (confidence: {:.4})", prediction.label, prediction.confidence);
        }

        Commands::CorpusCheck => {
            let store = CorpusStore::from_file(&config.corpus.path)?;
            let snapshot = store.snapshot();
            println!("POIs: {}", snapshot.len());
            println!("Categories:");
            for (label, count) in snapshot.categories() {
                println!("  {}: {}", label, count);
            }
        }
    }

    Ok(())
}

fn print_recommendation(rec: &crate::engine::Recommendation) {
    println!(
        "Category: {} (confidence: {:.4}), {} results in {} ms",
        rec.category,
        rec.confidence,
        rec.results.len(),
        rec.elapsed_ms
    );

    for (i, r) in rec.results.iter().enumerate() {
        println!("\n  {}. {}", i + 1, r.poi.name);
        if !r.poi.address.is_empty() {
            println!("     {}", r.poi.address);
        }
        println!(
            "     total {:.4} = spec {:.4} + dist {:.4} ({:.2} km)",
            r.total_score, r.spec_score, r.distance_score, r.raw_distance_km
        );
        if !r.spec_reason.is_empty() {
            println!("     reason: {}", r.spec_reason);
        }
    }
}
