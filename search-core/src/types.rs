use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::normalize;

/// Rough difficulty rating shared by criteria and recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Caller-supplied filter for a single search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Ingredients the caller has on hand or wants to use
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    /// e.g. "breakfast", "dinner"
    #[serde(default)]
    pub meal_types: Vec<String>,
    /// Budget ceiling for the whole recipe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    /// Free-text allergy notes ("peanuts", "shellfish")
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_total_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
}

/// One ingredient line of a candidate recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Original free-text line, if the provider had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RecipeIngredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Per-serving nutrition estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
}

/// A normalized recipe as returned by any provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecipe {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergen_notes: Vec<String>,
    /// Provider's confidence in this match, 0.0 to 1.0
    #[serde(default)]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Name of the provider that produced this recipe.
    /// Stamped by the aggregator, so never empty in a result.
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Precomputed content hash, used as a cheap equality check during dedup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl CandidateRecipe {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Replace the ingredient list with bare names.
    pub fn with_ingredient_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = names.into_iter().map(RecipeIngredient::named).collect();
        self
    }

    pub fn total_minutes(&self) -> Option<u32> {
        match (self.prep_minutes, self.cook_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0) + cook.unwrap_or(0)),
        }
    }

    /// SHA-256 over the normalized title and sorted normalized ingredient names.
    ///
    /// Two recipes that differ only in casing, quantities or ingredient order
    /// hash to the same value.
    pub fn compute_content_hash(&self) -> String {
        normalize::content_hash(&self.title, &self.ingredients)
    }

    /// Fill `content_hash` if the provider didn't supply one.
    pub fn ensure_content_hash(&mut self) {
        if self.content_hash.is_none() {
            self.content_hash = Some(self.compute_content_hash());
        }
    }
}

/// Successful result of one provider invocation.
#[derive(Debug, Clone, Default)]
pub struct ProviderOutcome {
    pub provider: String,
    pub recipes: Vec<CandidateRecipe>,
    pub elapsed: Duration,
    /// Set when the upstream source signalled it is close to its quota
    pub throttled: bool,
}

impl ProviderOutcome {
    pub fn new(provider: impl Into<String>, recipes: Vec<CandidateRecipe>) -> Self {
        Self {
            provider: provider.into(),
            recipes,
            elapsed: Duration::ZERO,
            throttled: false,
        }
    }

    pub fn throttled(mut self) -> Self {
        self.throttled = true;
        self
    }
}

/// Why a provider was not invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Disabled,
    Unavailable,
    RateLimited,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::Unavailable => "unavailable",
            SkipReason::RateLimited => "rate-limited",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider that was skipped before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedProvider {
    pub provider: String,
    pub reason: SkipReason,
}

/// Terminal state of one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallStatus {
    Completed,
    Failed,
    TimedOut,
    Skipped { reason: SkipReason },
    /// Generative provider not called because the top-up quota was zero
    NotRequested,
}

/// Diagnostic entry for one registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: String,
    pub priority: i32,
    pub generative: bool,
    pub status: CallStatus,
    pub recipe_count: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final payload of an aggregated search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationResult {
    pub recipes: Vec<CandidateRecipe>,
    pub providers_searched: Vec<String>,
    pub providers_skipped: Vec<SkippedProvider>,
    pub duplicates_removed: usize,
    /// How many recipes the generative provider was asked for (0 if not called)
    pub generated_requested: usize,
    pub duration_ms: u64,
    #[serde(default)]
    pub reports: Vec<ProviderReport>,
}

impl AggregationResult {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn was_searched(&self, provider: &str) -> bool {
        self.providers_searched.iter().any(|p| p == provider)
    }

    pub fn skip_reason(&self, provider: &str) -> Option<SkipReason> {
        self.providers_skipped
            .iter()
            .find(|s| s.provider == provider)
            .map(|s| s.reason)
    }

    pub fn report(&self, provider: &str) -> Option<&ProviderReport> {
        self.reports.iter().find(|r| r.provider == provider)
    }
}
