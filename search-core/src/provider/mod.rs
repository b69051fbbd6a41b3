//! Search provider abstraction.
//!
//! Every recipe source (local catalogue, external API, generative model)
//! implements `SearchProvider`. The aggregator holds them as a flat list of
//! peers; the generative provider is singled out by name only.

mod catalog;
mod fake;

pub use catalog::CatalogProvider;
pub use fake::FakeProvider;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::{ProviderOutcome, SearchCriteria};

/// Trait for recipe search providers.
///
/// Implementations must be thread-safe; one instance serves concurrent
/// searches. `search` should return an empty outcome rather than an error
/// when nothing matches, and should stop early with
/// `ProviderError::Cancelled` once `cancel` fires.
#[async_trait]
pub trait SearchProvider: Send + Sync + fmt::Debug {
    /// Stable identifier (e.g., "catalog", "spoonacular", "ai").
    fn name(&self) -> &str;

    /// Tie-break priority. Lower values are preferred.
    fn priority(&self) -> i32;

    /// Whether the provider is configured and reachable.
    fn is_available(&self) -> bool {
        true
    }

    /// Search for up to `max_results` recipes matching `criteria`.
    async fn search(
        &self,
        criteria: &SearchCriteria,
        max_results: usize,
        cancel: CancellationToken,
    ) -> Result<ProviderOutcome, ProviderError>;
}

/// Shared handle to a registered provider.
pub type ProviderHandle = Arc<dyn SearchProvider>;
