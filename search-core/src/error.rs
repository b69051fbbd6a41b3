use thiserror::Error;

/// Failure reported by a single search provider.
///
/// Providers return these for genuine failures only. "No results" is an empty
/// `Ok`, never an error. The aggregator treats every variant except
/// `Cancelled` as a provider fault; `Unavailable` and `ParseError` are for
/// network-backed providers that only learn mid-call that they can't answer.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Search cancelled")]
    Cancelled,
}

/// Invalid search or rate-limit configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },

    #[error("Threshold {name} must be within 0..=1, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("min_generated ({min}) exceeds max_generated ({max})")]
    GeneratedBounds { min: usize, max: usize },

    #[error("max_results must be greater than zero")]
    ZeroMaxResults,

    #[error("provider_timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Provider name must not be empty")]
    EmptyProviderName,

    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),
}

/// Error returned from an aggregated search.
///
/// Per-provider faults never surface here; they are absorbed into the
/// result's diagnostics. Only the caller's own cancellation aborts a search.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search cancelled by caller")]
    Cancelled,
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}
