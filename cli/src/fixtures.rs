//! Provider fixture files.
//!
//! A fixture file lists the providers to register for a search, each backed by
//! an in-memory catalogue:
//!
//! ```json
//! {
//!   "providers": [
//!     { "name": "catalog", "priority": 0, "recipes": [ ... ] },
//!     { "name": "ai", "priority": 100, "latency_ms": 1500, "recipes": [ ... ] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use recipe_search_core::{CandidateRecipe, CatalogProvider, ProviderHandle};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FixtureFile {
    pub providers: Vec<ProviderFixture>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderFixture {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub recipes: Vec<CandidateRecipe>,
}

fn default_available() -> bool {
    true
}

impl FixtureFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid fixture file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(content)?;
        if file.providers.is_empty() {
            bail!("fixture file lists no providers");
        }
        Ok(file)
    }

    pub fn into_providers(self) -> Vec<ProviderHandle> {
        self.providers
            .into_iter()
            .map(|fixture| {
                let mut provider =
                    CatalogProvider::new(fixture.name, fixture.priority, fixture.recipes)
                        .with_available(fixture.available);
                if let Some(ms) = fixture.latency_ms {
                    provider = provider.with_latency(Duration::from_millis(ms));
                }
                Arc::new(provider) as ProviderHandle
            })
            .collect()
    }
}
