//! Near-duplicate detection across providers.
//!
//! Two recipes are duplicates when they share a content hash, or when their
//! titles are similar by normalized edit distance AND their ingredient lists
//! overlap. Either signal alone is too noisy: "Chicken Soup" and "Chicken
//! Stew" have close titles, and unrelated dishes share staples.

use std::collections::BTreeSet;

use crate::config::SearchConfig;
use crate::normalize::{ingredient_names, normalize_title};
use crate::types::CandidateRecipe;

/// Result of a dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Surviving recipes, in order of first occurrence.
    pub recipes: Vec<CandidateRecipe>,
    pub duplicates_removed: usize,
}

/// Precomputed comparison keys for one candidate.
#[derive(Debug)]
struct Fingerprint {
    title: String,
    ingredients: BTreeSet<String>,
    hash: Option<String>,
}

impl Fingerprint {
    fn of(recipe: &CandidateRecipe) -> Self {
        Self {
            title: normalize_title(&recipe.title),
            ingredients: ingredient_names(&recipe.ingredients),
            hash: recipe.content_hash.clone(),
        }
    }
}

struct Kept {
    recipe: CandidateRecipe,
    fingerprint: Fingerprint,
    priority: i32,
}

/// Merges near-duplicate recipes, keeping the copy from the more trusted source.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    title_threshold: f64,
    ingredient_threshold: f64,
}

impl Deduplicator {
    pub fn new(title_threshold: f64, ingredient_threshold: f64) -> Self {
        Self {
            title_threshold,
            ingredient_threshold,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.title_threshold, config.ingredient_overlap_threshold)
    }

    /// Whether two recipes describe the same dish.
    pub fn is_duplicate(&self, a: &CandidateRecipe, b: &CandidateRecipe) -> bool {
        self.fingerprints_match(&Fingerprint::of(a), &Fingerprint::of(b))
    }

    /// Collapse duplicates in `candidates`.
    ///
    /// `priority_of` maps a recipe's source to its provider priority; when two
    /// recipes collide the one with the lower value survives (ties keep the
    /// earlier one). No field-level merging happens. The output is pairwise
    /// duplicate-free, so reducing it again removes nothing.
    pub fn reduce<F>(&self, candidates: Vec<CandidateRecipe>, priority_of: F) -> DedupOutcome
    where
        F: Fn(&str) -> i32,
    {
        let mut kept: Vec<Kept> = Vec::with_capacity(candidates.len());
        let mut duplicates_removed = 0;

        for recipe in candidates {
            let fingerprint = Fingerprint::of(&recipe);
            let priority = priority_of(&recipe.source);

            let matches: Vec<usize> = kept
                .iter()
                .enumerate()
                .filter(|(_, k)| self.fingerprints_match(&k.fingerprint, &fingerprint))
                .map(|(i, _)| i)
                .collect();

            let Some(&first) = matches.first() else {
                kept.push(Kept {
                    recipe,
                    fingerprint,
                    priority,
                });
                continue;
            };

            if matches.iter().any(|&i| kept[i].priority <= priority) {
                tracing::debug!(
                    dropped = %recipe.title,
                    dropped_source = %recipe.source,
                    kept = %kept[first].recipe.title,
                    kept_source = %kept[first].recipe.source,
                    "Dropping duplicate recipe"
                );
                duplicates_removed += 1;
                continue;
            }

            // The newcomer outranks every copy it collides with: it takes the
            // first copy's slot and the rest are removed.
            for &i in matches.iter().skip(1).rev() {
                kept.remove(i);
            }
            let replaced = std::mem::replace(
                &mut kept[first],
                Kept {
                    recipe,
                    fingerprint,
                    priority,
                },
            );
            tracing::debug!(
                dropped = %replaced.recipe.title,
                dropped_source = %replaced.recipe.source,
                kept_source = %kept[first].recipe.source,
                "Replacing duplicate recipe with more trusted source"
            );
            duplicates_removed += matches.len();
        }

        DedupOutcome {
            recipes: kept.into_iter().map(|k| k.recipe).collect(),
            duplicates_removed,
        }
    }

    fn fingerprints_match(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        if let (Some(ha), Some(hb)) = (&a.hash, &b.hash) {
            if ha == hb {
                return true;
            }
        }

        ingredient_overlap(&a.ingredients, &b.ingredients) >= self.ingredient_threshold
            && title_similarity(&a.title, &b.title) >= self.title_threshold
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len` on lower-cased titles. Two empty titles are identical.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// `|a ∩ b| / max(|a|, |b|)`. Zero when either side has no ingredients.
pub fn ingredient_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let max_len = a.len().max(b.len());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    a.intersection(b).count() as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(title: &str, source: &str, ingredients: &[&str]) -> CandidateRecipe {
        CandidateRecipe::new(title, source).with_ingredient_names(ingredients.iter().copied())
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn equal_priority(_: &str) -> i32 {
        0
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("crème", "creme"), 1);
    }

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity("Chicken Soup", "chicken soup"), 1.0);
        assert_eq!(title_similarity("", ""), 1.0);
        let sim = title_similarity("Chicken Soup", "Chicken Stew");
        assert!(sim > 0.6 && sim < 0.85, "got {}", sim);
    }

    #[test]
    fn test_ingredient_overlap() {
        assert_eq!(
            ingredient_overlap(&set(&["a", "b", "c", "d"]), &set(&["a", "b"])),
            0.5
        );
        assert_eq!(ingredient_overlap(&set(&[]), &set(&[])), 0.0);
        assert_eq!(ingredient_overlap(&set(&["a"]), &set(&["a"])), 1.0);
    }

    #[test]
    fn test_similar_title_low_overlap_not_merged() {
        let dedup = Deduplicator::default();
        // 0.95 title similarity, 0.10 ingredient overlap
        let a = recipe(
            "Spaghetti Bolognese!!",
            "catalog",
            &["beef", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"],
        );
        let b = recipe(
            "Spaghetti Bolognese!?",
            "api",
            &["beef", "b1", "b2", "b3", "b4", "b5", "b6", "b7", "b8", "b9"],
        );
        assert!(title_similarity(&a.title, &b.title) >= 0.95);
        assert!(!dedup.is_duplicate(&a, &b));
    }

    #[test]
    fn test_overlap_without_title_not_merged() {
        let dedup = Deduplicator::default();
        let a = recipe("Pancakes", "catalog", &["flour", "egg", "milk"]);
        let b = recipe("Crepes Suzette", "api", &["flour", "eggs", "milk"]);
        assert!(!dedup.is_duplicate(&a, &b));
    }

    #[test]
    fn test_near_duplicate_merged() {
        let dedup = Deduplicator::default();
        let a = recipe(
            "Classic Banana Bread",
            "catalog",
            &["bananas", "flour", "sugar", "butter", "egg"],
        );
        let b = recipe(
            "Classic Banana Bread.",
            "api",
            &["2 ripe bananas", "flour", "sugar", "butter", "eggs"],
        );
        assert!(dedup.is_duplicate(&a, &b));
    }

    #[test]
    fn test_hash_fast_path() {
        let dedup = Deduplicator::default();
        let mut a = recipe("Totally different", "catalog", &["x"]);
        let mut b = recipe("Nothing alike", "api", &["y"]);
        a.content_hash = Some("same".to_string());
        b.content_hash = Some("same".to_string());
        assert!(dedup.is_duplicate(&a, &b));
    }

    #[test]
    fn test_reduce_keeps_more_trusted_source() {
        let dedup = Deduplicator::default();
        let candidates = vec![
            recipe("Tomato Soup", "api", &["tomato", "onion", "stock"]),
            recipe("Risotto", "api", &["rice", "stock", "parmesan"]),
            recipe("Tomato soup", "catalog", &["tomatoes", "onion", "stock"]),
        ];
        let priority = |source: &str| if source == "catalog" { 0 } else { 5 };
        let outcome = dedup.reduce(candidates, priority);

        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.recipes.len(), 2);
        // Catalog copy takes the slot of the first occurrence
        assert_eq!(outcome.recipes[0].source, "catalog");
        assert_eq!(outcome.recipes[0].title, "Tomato soup");
        assert_eq!(outcome.recipes[1].title, "Risotto");
    }

    #[test]
    fn test_reduce_tie_keeps_first() {
        let dedup = Deduplicator::default();
        let candidates = vec![
            recipe("Tomato Soup", "one", &["tomato", "onion"]),
            recipe("Tomato Soup", "two", &["tomato", "onion"]),
        ];
        let outcome = dedup.reduce(candidates, equal_priority);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.recipes[0].source, "one");
    }

    #[test]
    fn test_reduce_replacement_collapses_all_matches() {
        let dedup = Deduplicator::new(0.5, 0.5);
        // a and b are not duplicates of each other, c duplicates both
        let candidates = vec![
            recipe("abcdef", "low", &["x", "y"]),
            recipe("ghijkl", "low", &["y", "z"]),
            recipe("abcjkl", "high", &["x", "y", "z"]),
        ];
        assert!(!dedup.is_duplicate(&candidates[0], &candidates[1]));
        let priority = |source: &str| if source == "high" { 0 } else { 1 };
        let outcome = dedup.reduce(candidates, priority);

        assert_eq!(outcome.recipes.len(), 1);
        assert_eq!(outcome.recipes[0].source, "high");
        assert_eq!(outcome.duplicates_removed, 2);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let dedup = Deduplicator::new(0.5, 0.5);
        let candidates = vec![
            recipe("abcdef", "low", &["x", "y"]),
            recipe("ghijkl", "low", &["y", "z"]),
            recipe("abcjkl", "high", &["x", "y", "z"]),
            recipe("Tomato Soup", "low", &["tomato", "onion"]),
            recipe("Tomato Soups", "high", &["tomato", "onion"]),
            recipe("Risotto", "low", &["rice"]),
        ];
        let priority = |source: &str| if source == "high" { 0 } else { 1 };
        let first = dedup.reduce(candidates, priority);
        let count = first.recipes.len();
        let second = dedup.reduce(first.recipes, priority);
        assert_eq!(second.duplicates_removed, 0);
        assert_eq!(second.recipes.len(), count);
    }

    #[test]
    fn test_reduce_empty() {
        let outcome = Deduplicator::default().reduce(Vec::new(), equal_priority);
        assert!(outcome.recipes.is_empty());
        assert_eq!(outcome.duplicates_removed, 0);
    }
}
