mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recipe_search_core::{
    Aggregator, CancellationToken, CandidateRecipe, Deduplicator, Difficulty, RateLimitConfig,
    SearchConfig, SearchCriteria, SlidingWindowTracker,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::fixtures::FixtureFile;

#[derive(Parser)]
#[command(name = "recipe-search")]
#[command(about = "Search several recipe providers at once", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an aggregated search against the providers in a fixture file
    Search {
        /// JSON file describing the providers and their recipes
        #[arg(long)]
        fixtures: PathBuf,
        /// Ingredient to search for (repeatable)
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,
        #[arg(long)]
        cuisine: Option<String>,
        /// Meal type such as "dinner" (repeatable)
        #[arg(long = "meal-type")]
        meal_types: Vec<String>,
        #[arg(long)]
        max_cost: Option<f64>,
        /// Dietary tag every result must carry (repeatable)
        #[arg(long = "diet")]
        dietary_tags: Vec<String>,
        /// Allergen to exclude (repeatable)
        #[arg(long = "allergy")]
        allergies: Vec<String>,
        #[arg(long)]
        max_minutes: Option<u32>,
        /// Hardest acceptable difficulty: easy, medium or hard
        #[arg(long, value_parser = parse_difficulty)]
        difficulty: Option<Difficulty>,
        /// Overrides RECIPE_SEARCH_MAX_RESULTS
        #[arg(long)]
        max_results: Option<usize>,
        /// Overrides RECIPE_SEARCH_PROVIDER_TIMEOUT_MS
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Overrides RECIPE_SEARCH_MIN_GENERATED
        #[arg(long)]
        min_generated: Option<usize>,
        /// Overrides RECIPE_SEARCH_MAX_GENERATED
        #[arg(long)]
        max_generated: Option<usize>,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
    /// Merge duplicates in a JSON array of recipes, keeping the first of each group
    Dedup {
        /// JSON file containing an array of recipes
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the JSON result
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    match value.to_ascii_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(format!("unknown difficulty '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Search {
            fixtures,
            ingredients,
            cuisine,
            meal_types,
            max_cost,
            dietary_tags,
            allergies,
            max_minutes,
            difficulty,
            max_results,
            timeout_ms,
            min_generated,
            max_generated,
            pretty,
        } => {
            let mut config = SearchConfig::from_env()?;
            if let Some(max_results) = max_results {
                config = config.with_max_results(max_results);
            }
            if let Some(ms) = timeout_ms {
                config = config.with_provider_timeout(Duration::from_millis(ms));
            }
            if min_generated.is_some() || max_generated.is_some() {
                let min = min_generated.unwrap_or(config.min_generated);
                let max = max_generated.unwrap_or(config.max_generated);
                config = config.with_generated_bounds(min, max);
            }

            let criteria = SearchCriteria {
                ingredients,
                cuisine,
                meal_types,
                max_cost,
                dietary_tags,
                allergies,
                max_total_minutes: max_minutes,
                difficulty,
                ..Default::default()
            };

            search(&fixtures, config, criteria, pretty).await?;
        }
        Commands::Dedup { input, pretty } => {
            dedup(&input, pretty)?;
        }
    }

    Ok(())
}

async fn search(
    fixtures: &std::path::Path,
    config: SearchConfig,
    criteria: SearchCriteria,
    pretty: bool,
) -> Result<()> {
    let rate_limiter = Arc::new(SlidingWindowTracker::new(RateLimitConfig::from_env()?));
    let mut aggregator = Aggregator::new(config, rate_limiter)?;
    for provider in FixtureFile::load(fixtures)?.into_providers() {
        aggregator.register(provider)?;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling search");
            on_interrupt.cancel();
        }
    });

    let result = aggregator
        .search(&criteria, &cancel)
        .await
        .context("Search did not complete")?;

    print_json(&result, pretty)
}

fn dedup(input: &std::path::Path, pretty: bool) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let recipes: Vec<CandidateRecipe> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse recipes from {}", input.display()))?;

    let config = SearchConfig::from_env()?;
    let outcome = Deduplicator::from_config(&config).reduce(recipes, |_| 0);
    tracing::info!(
        kept = outcome.recipes.len(),
        removed = outcome.duplicates_removed,
        "Deduplicated recipes"
    );

    print_json(&outcome.recipes, pretty)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
