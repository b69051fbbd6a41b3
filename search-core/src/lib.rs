//! Hybrid recipe search.
//!
//! Fans a search out to several recipe providers, tolerates partial provider
//! failure, merges near-duplicate results and tops the result set up with
//! generated recipes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use recipe_search_core::{
//!     Aggregator, CancellationToken, FakeProvider, SearchConfig, SearchCriteria,
//! };
//!
//! let aggregator = Aggregator::with_config(SearchConfig::from_env()?)?
//!     .with_provider(Arc::new(FakeProvider::new("catalog", 0).with_distinct_recipes(3)))?
//!     .with_provider(Arc::new(FakeProvider::new("ai", 10).with_distinct_recipes(3)))?;
//!
//! let result = aggregator
//!     .search(&SearchCriteria::default(), &CancellationToken::new())
//!     .await?;
//! println!("{} recipes from {:?}", result.recipes.len(), result.providers_searched);
//! ```

pub mod aggregator;
pub mod config;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod rate_limit;
pub mod types;

pub use aggregator::{generative_quota, Aggregator};
pub use config::SearchConfig;
pub use dedup::{DedupOutcome, Deduplicator};
pub use error::{ConfigError, ProviderError, SearchError};
pub use provider::{CatalogProvider, FakeProvider, ProviderHandle, SearchProvider};
pub use rate_limit::{RateLimitConfig, RateLimitTracker, SlidingWindowTracker};
pub use types::{
    AggregationResult, CallStatus, CandidateRecipe, Difficulty, Nutrition, ProviderOutcome,
    ProviderReport, RecipeIngredient, SearchCriteria, SkipReason, SkippedProvider,
};

/// Re-exported so callers don't need a direct `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
