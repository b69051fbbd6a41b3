//! Text normalization for recipe comparison.
//!
//! Reduces ingredient lines like "2 cups Tomatoes, diced" to a comparable
//! name ("tomato") and builds the content hash used by the dedup fast path.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use crate::types::RecipeIngredient;

/// Cooking units (lowercase), sorted longest first at runtime so that
/// "tablespoons" is tried before "tb".
static UNITS_SORTED: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut units = UNITS_RAW.to_vec();
    units.sort_by(|a, b| b.len().cmp(&a.len()));
    units
});

const UNITS_RAW: &[&str] = &[
    "fluid ounces",
    "fluid ounce",
    "tablespoons",
    "tablespoon",
    "teaspoons",
    "teaspoon",
    "milliliters",
    "milliliter",
    "kilograms",
    "kilogram",
    "packages",
    "package",
    "handfuls",
    "handful",
    "gallons",
    "gallon",
    "quarts",
    "quart",
    "pints",
    "pint",
    "liters",
    "liter",
    "litres",
    "litre",
    "ounces",
    "ounce",
    "pounds",
    "pound",
    "grams",
    "gram",
    "cups",
    "cup",
    "tbsp",
    "tsp",
    "fl oz",
    "lbs",
    "lb",
    "oz",
    "kg",
    "ml",
    "g",
    "l",
    "bunches",
    "bunch",
    "pinches",
    "pinch",
    "slices",
    "slice",
    "sprigs",
    "sprig",
    "stalks",
    "stalk",
    "pieces",
    "piece",
    "cloves",
    "clove",
    "dashes",
    "dash",
    "heads",
    "head",
    "sticks",
    "stick",
    "cans",
    "can",
    "jars",
    "jar",
    "bags",
    "bag",
];

/// Descriptors that don't change what the ingredient is.
const NOISE_WORDS: &[&str] = &[
    "of",
    "fresh",
    "freshly",
    "dried",
    "chopped",
    "finely",
    "roughly",
    "coarsely",
    "thinly",
    "minced",
    "sliced",
    "diced",
    "cubed",
    "grated",
    "shredded",
    "crushed",
    "ground",
    "peeled",
    "softened",
    "melted",
    "large",
    "medium",
    "small",
    "extra-large",
    "whole",
    "raw",
    "cooked",
    "frozen",
    "optional",
];

/// Preparation notes that may trail an ingredient after a comma.
const PREP_NOTES: &[&str] = &[
    "to taste",
    "as needed",
    "for garnish",
    "for serving",
    "room temperature",
    "divided",
    "drained",
    "rinsed",
    "softened",
    "melted",
    "chopped",
    "minced",
    "sliced",
    "diced",
    "peeled",
    "crumbled",
    "grated",
    "shredded",
    "sifted",
    "toasted",
    "thawed",
    "beaten",
    "halved",
    "optional",
];

/// Lower-case a title and collapse internal whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce an ingredient line to its bare, singular name.
///
/// Best effort: if stripping would leave nothing, the lower-cased input is
/// returned instead.
pub fn normalize_ingredient_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return lowered;
    }

    let mut remaining = strip_parentheticals(&lowered);

    if let Some(comma_idx) = remaining.find(',') {
        let tail = remaining[comma_idx + 1..].trim();
        if is_prep_note(tail) {
            remaining.truncate(comma_idx);
        } else {
            remaining = remaining.replace(',', " ");
        }
    }

    let after_amount = strip_amount(&remaining);
    let after_unit = strip_unit(after_amount);

    let name = after_unit
        .split_whitespace()
        .filter(|word| !NOISE_WORDS.contains(word))
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        lowered.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        name
    }
}

/// Normalized, de-duplicated ingredient names of a recipe.
///
/// Uses the structured name when present, otherwise the free-text line.
pub fn ingredient_names(ingredients: &[RecipeIngredient]) -> BTreeSet<String> {
    ingredients
        .iter()
        .map(|ing| {
            if ing.name.trim().is_empty() {
                ing.text.as_deref().unwrap_or_default()
            } else {
                ing.name.as_str()
            }
        })
        .map(normalize_ingredient_name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// SHA-256 hex digest of the normalized title and sorted ingredient names.
pub fn content_hash(title: &str, ingredients: &[RecipeIngredient]) -> String {
    let names = ingredient_names(ingredients)
        .into_iter()
        .collect::<Vec<_>>()
        .join(",");

    let mut hasher = Sha256::new();
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"|");
    hasher.update(names.as_bytes());
    hex::encode(hasher.finalize())
}

fn strip_parentheticals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Drop a leading quantity: "2", "1.5", "1/2", "1 1/2", "2-3", "½".
fn strip_amount(s: &str) -> &str {
    let mut rest = s.trim_start();
    loop {
        let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..token_end];
        if !token.is_empty() && is_quantity(token) {
            rest = rest[token_end..].trim_start();
        } else {
            return rest;
        }
    }
}

fn is_quantity(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit() || is_vulgar_fraction(c))
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '/' | '-') || is_vulgar_fraction(c))
}

fn is_vulgar_fraction(c: char) -> bool {
    matches!(c, '½' | '⅓' | '⅔' | '¼' | '¾' | '⅛')
}

fn strip_unit(s: &str) -> &str {
    for &unit in UNITS_SORTED.iter() {
        if let Some(after) = s.strip_prefix(unit) {
            if after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '.') {
                return after.trim_start_matches('.').trim_start();
            }
        }
    }
    s
}

fn is_prep_note(s: &str) -> bool {
    PREP_NOTES.iter().any(|note| s.contains(note))
}

/// Singularize common English plural endings.
fn singularize(word: &str) -> String {
    if word.len() <= 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{}o", stem);
    }
    for suffix in ["ches", "shes", "xes", "sses"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
