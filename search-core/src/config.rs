//! Search configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub use crate::error::ConfigError;

/// Default cap on recipes returned per search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Default minimum number of generated recipes requested per search.
pub const DEFAULT_MIN_GENERATED: usize = 1;

/// Default maximum number of generated recipes requested per search.
pub const DEFAULT_MAX_GENERATED: usize = 3;

/// Default per-provider call timeout in milliseconds.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;

/// Default title similarity at or above which two recipes may be duplicates.
pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.85;

/// Default ingredient overlap at or above which two recipes may be duplicates.
pub const DEFAULT_INGREDIENT_OVERLAP: f64 = 0.60;

/// Default name of the generative provider.
pub const DEFAULT_GENERATIVE_PROVIDER: &str = "ai";

/// Aggregated search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum recipes returned per search.
    pub max_results: usize,
    /// Generated recipes requested even when other providers filled the quota.
    pub min_generated: usize,
    /// Upper bound on generated recipes requested.
    pub max_generated: usize,
    /// Budget for each individual provider call.
    pub provider_timeout: Duration,
    /// Title similarity threshold for duplicate detection (0..=1).
    pub title_threshold: f64,
    /// Ingredient overlap threshold for duplicate detection (0..=1).
    pub ingredient_overlap_threshold: f64,
    /// Name of the provider handled in the top-up phase.
    pub generative_provider: String,
    /// Per-provider enable toggles. Providers not listed are enabled.
    pub provider_enabled: HashMap<String, bool>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            min_generated: DEFAULT_MIN_GENERATED,
            max_generated: DEFAULT_MAX_GENERATED,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            title_threshold: DEFAULT_TITLE_THRESHOLD,
            ingredient_overlap_threshold: DEFAULT_INGREDIENT_OVERLAP,
            generative_provider: DEFAULT_GENERATIVE_PROVIDER.to_string(),
            provider_enabled: HashMap::new(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// - `RECIPE_SEARCH_MAX_RESULTS` (default: 5)
    /// - `RECIPE_SEARCH_MIN_GENERATED` (default: 1)
    /// - `RECIPE_SEARCH_MAX_GENERATED` (default: 3)
    /// - `RECIPE_SEARCH_PROVIDER_TIMEOUT_MS` (default: 10000)
    /// - `RECIPE_SEARCH_TITLE_THRESHOLD` (default: 0.85)
    /// - `RECIPE_SEARCH_INGREDIENT_OVERLAP` (default: 0.60)
    /// - `RECIPE_SEARCH_GENERATIVE_PROVIDER` (default: "ai")
    /// - `RECIPE_SEARCH_DISABLED_PROVIDERS`: comma-separated provider names
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_parse("RECIPE_SEARCH_MAX_RESULTS")? {
            config.max_results = v;
        }
        if let Some(v) = env_parse("RECIPE_SEARCH_MIN_GENERATED")? {
            config.min_generated = v;
        }
        if let Some(v) = env_parse("RECIPE_SEARCH_MAX_GENERATED")? {
            config.max_generated = v;
        }
        if let Some(ms) = env_parse::<u64>("RECIPE_SEARCH_PROVIDER_TIMEOUT_MS")? {
            config.provider_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("RECIPE_SEARCH_TITLE_THRESHOLD")? {
            config.title_threshold = v;
        }
        if let Some(v) = env_parse("RECIPE_SEARCH_INGREDIENT_OVERLAP")? {
            config.ingredient_overlap_threshold = v;
        }
        if let Ok(name) = env::var("RECIPE_SEARCH_GENERATIVE_PROVIDER") {
            config.generative_provider = name;
        }
        if let Ok(disabled) = env::var("RECIPE_SEARCH_DISABLED_PROVIDERS") {
            for name in disabled.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                config.provider_enabled.insert(name.to_string(), false);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the aggregator relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::ZeroMaxResults);
        }
        if self.provider_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        check_threshold("title_threshold", self.title_threshold)?;
        check_threshold(
            "ingredient_overlap_threshold",
            self.ingredient_overlap_threshold,
        )?;
        if self.min_generated > self.max_generated {
            return Err(ConfigError::GeneratedBounds {
                min: self.min_generated,
                max: self.max_generated,
            });
        }
        Ok(())
    }

    /// Whether a provider is enabled. Unlisted providers are.
    pub fn is_enabled(&self, provider: &str) -> bool {
        self.provider_enabled.get(provider).copied().unwrap_or(true)
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_generated_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_generated = min;
        self.max_generated = max;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_generative_provider(mut self, name: impl Into<String>) -> Self {
        self.generative_provider = name.into();
        self
    }

    pub fn with_provider_enabled(mut self, provider: impl Into<String>, enabled: bool) -> Self {
        self.provider_enabled.insert(provider.into(), enabled);
        self
    }
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    // NaN fails the range check too
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

/// Read and parse an optional environment variable.
///
/// Unset yields `Ok(None)`; set but unparseable is an error.
pub(crate) fn env_parse<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
