//! Hybrid search aggregation.
//!
//! One search runs in two phases:
//! 1. Every enabled, available, unthrottled non-generative provider is called
//!    concurrently, each under its own timeout. Results are joined in priority
//!    order and deduplicated.
//! 2. The generative provider is asked to top up the result set, sized from
//!    what phase one produced.
//!
//! A provider that fails, panics or times out contributes nothing; only the
//! caller's cancellation token aborts a search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::config::{ConfigError, SearchConfig};
use crate::dedup::Deduplicator;
use crate::error::{ProviderError, SearchError};
use crate::provider::{ProviderHandle, SearchProvider};
use crate::rate_limit::{RateLimitTracker, SlidingWindowTracker};
use crate::types::{
    AggregationResult, CallStatus, CandidateRecipe, ProviderOutcome, ProviderReport,
    SearchCriteria, SkipReason, SkippedProvider,
};

/// How one provider call settled.
#[derive(Debug)]
enum CallResult {
    Completed(ProviderOutcome),
    Failed { detail: String, elapsed: Duration },
    TimedOut { elapsed: Duration },
    /// The caller's token fired while this call was in flight
    Cancelled,
}

/// Fans a search out to registered providers and merges their results.
pub struct Aggregator {
    config: SearchConfig,
    providers: Vec<ProviderHandle>,
    rate_limiter: Arc<dyn RateLimitTracker>,
    deduplicator: Deduplicator,
}

impl Aggregator {
    /// Create an aggregator with no providers.
    pub fn new(
        config: SearchConfig,
        rate_limiter: Arc<dyn RateLimitTracker>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let deduplicator = Deduplicator::from_config(&config);
        Ok(Self {
            config,
            providers: Vec::new(),
            rate_limiter,
            deduplicator,
        })
    }

    /// Create an aggregator with an unlimited sliding-window tracker.
    pub fn with_config(config: SearchConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(SlidingWindowTracker::default()))
    }

    /// Register a provider. Registration order doesn't matter; providers are
    /// ordered by priority at search time.
    ///
    /// Names identify providers in results and reports, so they must be
    /// non-empty and unique.
    pub fn register(&mut self, provider: ProviderHandle) -> Result<(), ConfigError> {
        let name = provider.name();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyProviderName);
        }
        if self.providers.iter().any(|p| p.name() == name) {
            return Err(ConfigError::DuplicateProvider(name.to_string()));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn with_provider(mut self, provider: ProviderHandle) -> Result<Self, ConfigError> {
        self.register(provider)?;
        Ok(self)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn providers(&self) -> &[ProviderHandle] {
        &self.providers
    }

    /// Run one search end to end.
    ///
    /// Returns `SearchError::Cancelled` if `cancel` fires before the search
    /// completes; every other failure is absorbed into the result.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, SearchError> {
        self.run(criteria, cancel)
            .instrument(info_span!("aggregate_search"))
            .await
    }

    async fn run(
        &self,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, SearchError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Provider tasks hang off this scope; if the search future is dropped
        // the guard cancels them instead of leaving them to run to timeout.
        let scope = cancel.child_token();
        let _scope_guard = scope.clone().drop_guard();

        let criteria = Arc::new(criteria.clone());
        let mut result = AggregationResult::default();

        let (generative, mut ordinary): (Vec<_>, Vec<_>) = self
            .providers
            .iter()
            .cloned()
            .partition(|p| p.name() == self.config.generative_provider);
        // Stable: equal priorities keep registration order
        ordinary.sort_by_key(|p| p.priority());

        let priorities: HashMap<String, i32> = ordinary
            .iter()
            .map(|p| (p.name().to_string(), p.priority()))
            .collect();

        // Phase one: fan out to the non-generative providers
        let mut scheduled = Vec::with_capacity(ordinary.len());
        for provider in ordinary {
            match self.gate(provider.as_ref()) {
                Some(reason) => record_skip(&mut result, provider.as_ref(), reason, false),
                None => scheduled.push(provider),
            }
        }

        // Spawned in priority order and joined in that same order, so the
        // pool's order doesn't depend on which provider answers first.
        let handles = scheduled
            .iter()
            .map(|provider| {
                self.spawn_call(
                    Arc::clone(provider),
                    Arc::clone(&criteria),
                    self.config.max_results,
                    &scope,
                )
            })
            .collect::<Vec<_>>();
        let settled = join_all(handles).await;

        if cancel.is_cancelled() {
            tracing::info!("Search cancelled by caller during provider fan-out");
            return Err(SearchError::Cancelled);
        }

        let mut pool = Vec::new();
        for (provider, joined) in scheduled.iter().zip(settled) {
            let call = settle(provider.as_ref(), joined);
            if let Some(recipes) = self.absorb(&mut result, provider.as_ref(), call, false)? {
                pool.extend(recipes);
            }
        }

        let deduped = self.deduplicator.reduce(pool, |source| {
            priorities.get(source).copied().unwrap_or(i32::MAX)
        });
        result.duplicates_removed = deduped.duplicates_removed;
        let primary = deduped.recipes;

        // Phase two: generative top-up
        let quota = generative_quota(
            self.config.max_results,
            primary.len(),
            self.config.min_generated,
            self.config.max_generated,
        );
        let mut generated = Vec::new();

        if let Some(provider) = generative.first() {
            if quota == 0 {
                result.reports.push(report(
                    provider.as_ref(),
                    true,
                    CallStatus::NotRequested,
                    0,
                    Duration::ZERO,
                    None,
                ));
            } else if let Some(reason) = self.gate(provider.as_ref()) {
                record_skip(&mut result, provider.as_ref(), reason, true);
            } else {
                result.generated_requested = quota;
                let joined = self
                    .spawn_call(Arc::clone(provider), Arc::clone(&criteria), quota, &scope)
                    .await;

                if cancel.is_cancelled() {
                    tracing::info!("Search cancelled by caller during generative top-up");
                    return Err(SearchError::Cancelled);
                }

                let call = settle(provider.as_ref(), joined);
                if let Some(mut recipes) = self.absorb(&mut result, provider.as_ref(), call, true)?
                {
                    recipes.truncate(quota);
                    generated = recipes;
                }
            }
        } else if quota > 0 {
            tracing::debug!(quota, "No generative provider registered, skipping top-up");
        }

        result.recipes = assemble(
            primary,
            generated,
            self.config.max_results,
            self.config.min_generated,
        );
        result.reports.sort_by_key(|r| (r.generative, r.priority));
        result.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            searched = result.providers_searched.len(),
            skipped = result.providers_skipped.len(),
            duplicates_removed = result.duplicates_removed,
            generated_requested = result.generated_requested,
            returned = result.recipes.len(),
            duration_ms = result.duration_ms,
            "Search complete"
        );

        Ok(result)
    }

    /// Decide whether a provider may be called right now.
    fn gate(&self, provider: &dyn SearchProvider) -> Option<SkipReason> {
        let name = provider.name();
        if !self.config.is_enabled(name) {
            Some(SkipReason::Disabled)
        } else if !provider.is_available() {
            Some(SkipReason::Unavailable)
        } else if self.rate_limiter.is_rate_limited(name) {
            Some(SkipReason::RateLimited)
        } else {
            None
        }
    }

    fn spawn_call(
        &self,
        provider: ProviderHandle,
        criteria: Arc<SearchCriteria>,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> tokio::task::JoinHandle<CallResult> {
        let span = info_span!("provider_search", provider = %provider.name(), max_results);
        let timeout = self.config.provider_timeout;
        let parent = cancel.clone();
        tokio::spawn(
            async move { call_provider(provider, criteria, max_results, timeout, parent).await }
                .instrument(span),
        )
    }

    /// Fold one settled call into the result. Returns the call's recipes on
    /// success, stamped with the provider's name.
    fn absorb(
        &self,
        result: &mut AggregationResult,
        provider: &dyn SearchProvider,
        call: CallResult,
        generative: bool,
    ) -> Result<Option<Vec<CandidateRecipe>>, SearchError> {
        let name = provider.name();
        match call {
            CallResult::Completed(outcome) => {
                self.rate_limiter.record_call(name);
                result.providers_searched.push(name.to_string());

                let detail = outcome.throttled.then(|| {
                    tracing::info!(provider = name, "Provider reports upstream throttling");
                    "upstream throttled".to_string()
                });
                let mut recipes = outcome.recipes;
                for recipe in &mut recipes {
                    recipe.source = name.to_string();
                }
                result.reports.push(report(
                    provider,
                    generative,
                    CallStatus::Completed,
                    recipes.len(),
                    outcome.elapsed,
                    detail,
                ));
                Ok(Some(recipes))
            }
            CallResult::Failed { detail, elapsed } => {
                result.reports.push(report(
                    provider,
                    generative,
                    CallStatus::Failed,
                    0,
                    elapsed,
                    Some(detail),
                ));
                Ok(None)
            }
            CallResult::TimedOut { elapsed } => {
                result.reports.push(report(
                    provider,
                    generative,
                    CallStatus::TimedOut,
                    0,
                    elapsed,
                    Some(format!(
                        "exceeded {}ms timeout",
                        self.config.provider_timeout.as_millis()
                    )),
                ));
                Ok(None)
            }
            CallResult::Cancelled => Err(SearchError::Cancelled),
        }
    }
}

/// Call one provider under its own timeout.
///
/// The provider receives a child of the caller's token. The timeout cancels
/// only that child, so siblings and the search itself carry on; the caller's
/// token firing is reported as `Cancelled` and aborts the search.
async fn call_provider(
    provider: ProviderHandle,
    criteria: Arc<SearchCriteria>,
    max_results: usize,
    timeout: Duration,
    parent: CancellationToken,
) -> CallResult {
    let child = parent.child_token();
    let started = Instant::now();

    let settled = tokio::select! {
        biased;
        _ = parent.cancelled() => return CallResult::Cancelled,
        settled = tokio::time::timeout(
            timeout,
            provider.search(&criteria, max_results, child.clone()),
        ) => settled,
    };
    let elapsed = started.elapsed();

    match settled {
        Ok(Ok(mut outcome)) => {
            outcome.elapsed = elapsed;
            tracing::debug!(
                recipes = outcome.recipes.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Provider returned"
            );
            CallResult::Completed(outcome)
        }
        Ok(Err(ProviderError::Cancelled)) if parent.is_cancelled() => CallResult::Cancelled,
        Ok(Err(e)) => {
            if let ProviderError::RateLimited { retry_after_secs } = &e {
                tracing::warn!(?retry_after_secs, "Provider rate limited upstream");
            } else {
                tracing::warn!(error = %e, "Provider search failed");
            }
            CallResult::Failed {
                detail: e.to_string(),
                elapsed,
            }
        }
        Err(_) => {
            child.cancel();
            if parent.is_cancelled() {
                return CallResult::Cancelled;
            }
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Provider search timed out"
            );
            CallResult::TimedOut { elapsed }
        }
    }
}

/// Unwrap a joined task, treating a panicked provider as a failure.
fn settle(provider: &dyn SearchProvider, joined: Result<CallResult, JoinError>) -> CallResult {
    match joined {
        Ok(call) => call,
        Err(e) => {
            let detail = if e.is_panic() {
                "provider panicked".to_string()
            } else {
                format!("provider task failed: {}", e)
            };
            tracing::error!(provider = provider.name(), "{}", detail);
            CallResult::Failed {
                detail,
                elapsed: Duration::ZERO,
            }
        }
    }
}

fn record_skip(
    result: &mut AggregationResult,
    provider: &dyn SearchProvider,
    reason: SkipReason,
    generative: bool,
) {
    tracing::debug!(provider = provider.name(), reason = %reason, "Skipping provider");
    result.providers_skipped.push(SkippedProvider {
        provider: provider.name().to_string(),
        reason,
    });
    result.reports.push(report(
        provider,
        generative,
        CallStatus::Skipped { reason },
        0,
        Duration::ZERO,
        None,
    ));
}

fn report(
    provider: &dyn SearchProvider,
    generative: bool,
    status: CallStatus,
    recipe_count: usize,
    elapsed: Duration,
    detail: Option<String>,
) -> ProviderReport {
    ProviderReport {
        provider: provider.name().to_string(),
        priority: provider.priority(),
        generative,
        status,
        recipe_count,
        elapsed_ms: elapsed.as_millis() as u64,
        detail,
    }
}

/// Number of recipes to request from the generative provider.
///
/// Fills the slots left after phase one, but never asks for fewer than
/// `min_generated` or more than `max_generated`.
pub fn generative_quota(
    max_results: usize,
    primary_count: usize,
    min_generated: usize,
    max_generated: usize,
) -> usize {
    let remaining = max_results.saturating_sub(primary_count);
    remaining.max(min_generated).min(max_generated)
}

/// Combine both phases into at most `max_results` recipes.
///
/// Up to `min_generated` slots are held back for generated recipes so the
/// final trim can't squeeze them out; primary recipes fill the rest in order.
fn assemble(
    primary: Vec<CandidateRecipe>,
    generated: Vec<CandidateRecipe>,
    max_results: usize,
    min_generated: usize,
) -> Vec<CandidateRecipe> {
    let reserved = generated.len().min(min_generated).min(max_results);
    let mut recipes: Vec<CandidateRecipe> = primary
        .into_iter()
        .take(max_results - reserved)
        .collect();
    recipes.extend(generated);
    recipes.truncate(max_results);
    recipes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(prefix: &str, n: usize) -> Vec<CandidateRecipe> {
        (0..n)
            .map(|i| CandidateRecipe::new(format!("{} {}", prefix, i), prefix))
            .collect()
    }

    #[test]
    fn test_generative_quota() {
        // 7 primary, cap 5: still ask for the minimum
        assert_eq!(generative_quota(5, 7, 1, 3), 1);
        // 3 primary, cap 5: fill the 2 remaining slots
        assert_eq!(generative_quota(5, 3, 1, 3), 2);
        // nothing found: capped at max_generated
        assert_eq!(generative_quota(5, 0, 1, 3), 3);
        // minimum of zero and full primary: don't call at all
        assert_eq!(generative_quota(5, 5, 0, 3), 0);
        assert_eq!(generative_quota(5, 0, 0, 0), 0);
    }

    #[test]
    fn test_assemble_reserves_generated_slots() {
        let recipes = assemble(titled("primary", 7), titled("ai", 1), 5, 1);
        assert_eq!(recipes.len(), 5);
        assert_eq!(recipes[3].title, "primary 3");
        assert_eq!(recipes[4].source, "ai");
    }

    #[test]
    fn test_assemble_fills_with_generated() {
        let recipes = assemble(titled("primary", 2), titled("ai", 3), 5, 1);
        let sources: Vec<_> = recipes.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["primary", "primary", "ai", "ai", "ai"]);
    }

    #[test]
    fn test_assemble_without_generated() {
        let recipes = assemble(titled("primary", 8), Vec::new(), 5, 1);
        assert_eq!(recipes.len(), 5);
        assert!(recipes.iter().all(|r| r.source == "primary"));
    }

    #[test]
    fn test_assemble_reserve_respects_cap() {
        let recipes = assemble(titled("primary", 4), titled("ai", 3), 2, 3);
        let sources: Vec<_> = recipes.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["ai", "ai"]);
    }

    #[test]
    fn test_register_rejects_bad_names() {
        use crate::provider::FakeProvider;

        let mut aggregator = Aggregator::with_config(SearchConfig::default()).unwrap();
        assert_eq!(
            aggregator.register(Arc::new(FakeProvider::new("  ", 0))),
            Err(ConfigError::EmptyProviderName)
        );
        aggregator
            .register(Arc::new(FakeProvider::new("catalog", 0)))
            .unwrap();
        assert_eq!(
            aggregator.register(Arc::new(FakeProvider::new("catalog", 5))),
            Err(ConfigError::DuplicateProvider("catalog".to_string()))
        );
        assert_eq!(aggregator.providers().len(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SearchConfig::default().with_generated_bounds(3, 1);
        assert!(matches!(
            Aggregator::with_config(config),
            Err(ConfigError::GeneratedBounds { min: 3, max: 1 })
        ));
    }
}
