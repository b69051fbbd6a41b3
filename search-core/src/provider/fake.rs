//! Fake search provider for testing.
//!
//! Returns scripted recipes and can be configured to be slow, fail, panic or
//! report itself unavailable, so aggregation can be exercised without any
//! network access.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::SearchProvider;
use crate::error::ProviderError;
use crate::types::{CandidateRecipe, ProviderOutcome, SearchCriteria};

/// A scripted provider.
///
/// Recipes are returned in the order they were added, truncated to the
/// requested `max_results`.
#[derive(Debug)]
pub struct FakeProvider {
    name: String,
    priority: i32,
    available: AtomicBool,
    recipes: Vec<CandidateRecipe>,
    delay: Option<Duration>,
    failure: Option<ProviderError>,
    panics: bool,
    throttled: bool,
    calls: AtomicUsize,
    /// `max_results` of every call, in call order
    requested: Mutex<Vec<usize>>,
}

impl FakeProvider {
    /// Create a provider with no recipes.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            available: AtomicBool::new(true),
            recipes: Vec::new(),
            delay: None,
            failure: None,
            panics: false,
            throttled: false,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Add a recipe with the given title and ingredient names.
    pub fn with_recipe(mut self, title: &str, ingredients: &[&str]) -> Self {
        let recipe = CandidateRecipe::new(title, self.name.clone())
            .with_ingredient_names(ingredients.iter().copied());
        self.recipes.push(recipe);
        self
    }

    /// Add fully specified recipes.
    pub fn with_recipes(mut self, recipes: impl IntoIterator<Item = CandidateRecipe>) -> Self {
        self.recipes.extend(recipes);
        self
    }

    /// Add `count` recipes with distinct titles and ingredients.
    pub fn with_distinct_recipes(mut self, count: usize) -> Self {
        for i in 0..count {
            let title = format!("{} special {}", self.name, i);
            let ingredients = [
                format!("{}-ingredient-{}-a", self.name, i),
                format!("{}-ingredient-{}-b", self.name, i),
            ];
            let recipe = CandidateRecipe::new(title, self.name.clone())
                .with_ingredient_names(ingredients);
            self.recipes.push(recipe);
        }
        self
    }

    /// Sleep this long before answering. The sleep observes cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return `RequestFailed` with this message instead of recipes.
    pub fn failing(self, message: &str) -> Self {
        self.failing_with(ProviderError::RequestFailed(message.to_string()))
    }

    /// Return this error instead of recipes.
    pub fn failing_with(mut self, error: ProviderError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Panic inside `search`.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Mark outcomes as throttled by the upstream source.
    pub fn reporting_throttled(mut self) -> Self {
        self.throttled = true;
        self
    }

    pub fn unavailable(self) -> Self {
        self.set_available(false);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of times `search` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `max_results` passed to each invocation, in order.
    pub fn requested_counts(&self) -> Vec<usize> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn search(
        &self,
        _criteria: &SearchCriteria,
        max_results: usize,
        cancel: CancellationToken,
    ) -> Result<ProviderOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(max_results);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.panics {
            panic!("FakeProvider {} panicked", self.name);
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let recipes = self.recipes.iter().take(max_results).cloned().collect();
        let outcome = ProviderOutcome::new(self.name.clone(), recipes);
        Ok(if self.throttled {
            outcome.throttled()
        } else {
            outcome
        })
    }
}
