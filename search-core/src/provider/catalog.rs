//! In-memory recipe catalogue provider.

use std::cmp::Reverse;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::SearchProvider;
use crate::error::ProviderError;
use crate::normalize::{ingredient_names, normalize_ingredient_name};
use crate::types::{CandidateRecipe, ProviderOutcome, SearchCriteria};

/// Serves recipes from a fixed in-memory list.
///
/// Recipes are filtered by the hard constraints in `SearchCriteria` (cuisine,
/// budget, diet, allergies, time, difficulty, meal type) and ranked by how many
/// of the requested ingredients they use. Servings are not used for filtering.
#[derive(Debug)]
pub struct CatalogProvider {
    name: String,
    priority: i32,
    available: bool,
    /// Simulated lookup latency
    latency: Option<Duration>,
    recipes: Vec<CandidateRecipe>,
}

impl CatalogProvider {
    pub fn new(name: impl Into<String>, priority: i32, recipes: Vec<CandidateRecipe>) -> Self {
        Self {
            name: name.into(),
            priority,
            available: true,
            latency: None,
            recipes,
        }
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Delay every lookup, e.g. to stand in for a remote catalogue.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[async_trait]
impl SearchProvider for CatalogProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
        max_results: usize,
        cancel: CancellationToken,
    ) -> Result<ProviderOutcome, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        let wanted: Vec<String> = criteria
            .ingredients
            .iter()
            .map(|i| normalize_ingredient_name(i))
            .filter(|i| !i.is_empty())
            .collect();
        let allergies: Vec<String> = criteria
            .allergies
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();

        let mut scored: Vec<(usize, &CandidateRecipe)> = self
            .recipes
            .iter()
            .filter(|recipe| passes_filters(recipe, criteria, &allergies))
            .filter_map(|recipe| {
                let names = ingredient_names(&recipe.ingredients);
                let matched = wanted.iter().filter(|w| names.contains(*w)).count();
                if wanted.is_empty() || matched > 0 {
                    Some((matched, recipe))
                } else {
                    None
                }
            })
            .collect();

        // Stable, so equal scores keep catalogue order
        scored.sort_by_key(|(matched, _)| Reverse(*matched));

        let recipes = scored
            .into_iter()
            .take(max_results)
            .map(|(matched, recipe)| {
                let mut recipe = recipe.clone();
                recipe.source = self.name.clone();
                if !wanted.is_empty() {
                    recipe.confidence = matched as f32 / wanted.len() as f32;
                }
                recipe
            })
            .collect();

        Ok(ProviderOutcome::new(self.name.clone(), recipes))
    }
}

fn passes_filters(
    recipe: &CandidateRecipe,
    criteria: &SearchCriteria,
    allergies: &[String],
) -> bool {
    if let Some(cuisine) = &criteria.cuisine {
        match &recipe.cuisine {
            Some(c) if c.eq_ignore_ascii_case(cuisine) => {}
            _ => return false,
        }
    }

    if let (Some(max), Some(cost)) = (criteria.max_cost, recipe.estimated_cost) {
        if cost > max {
            return false;
        }
    }

    if !criteria
        .dietary_tags
        .iter()
        .all(|tag| has_tag(recipe, tag))
    {
        return false;
    }

    if !criteria.meal_types.is_empty()
        && !criteria.meal_types.iter().any(|meal| has_tag(recipe, meal))
    {
        return false;
    }

    if !allergies.is_empty() {
        let names = ingredient_names(&recipe.ingredients);
        let mentions_allergen = allergies.iter().any(|allergen| {
            names.iter().any(|n| n.contains(allergen.as_str()))
                || recipe
                    .allergen_notes
                    .iter()
                    .any(|note| note.to_lowercase().contains(allergen.as_str()))
        });
        if mentions_allergen {
            return false;
        }
    }

    if let Some(total) = recipe.total_minutes() {
        if criteria.max_total_minutes.is_some_and(|max| total > max)
            || criteria.min_total_minutes.is_some_and(|min| total < min)
        {
            return false;
        }
    }

    if let (Some(wanted), Some(actual)) = (criteria.difficulty, recipe.difficulty) {
        if actual > wanted {
            return false;
        }
    }

    true
}

fn has_tag(recipe: &CandidateRecipe, tag: &str) -> bool {
    recipe.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
}
