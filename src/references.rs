//! Pattern scanning for references embedded in free text
//!
//! Variables are referenced as `$name` or interpolated as `{{name}}`, assets
//! as `asset://<id>`. Nothing here parses scripts: text that does not match
//! simply contributes no reference.

use crate::story::{Story, VariableType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static VARIABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

static ASSET_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"asset://([A-Za-z0-9_\-.]+)").unwrap());

/// Names of all variables referenced in the given text, in order of first
/// appearance, without duplicates
pub fn variable_references(text: &str) -> Vec<String> {
    let mut names: Vec<(usize, String)> = VARIABLE_REF
        .captures_iter(text)
        .chain(INTERPOLATION.captures_iter(text))
        .filter_map(|c| c.get(1))
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect();
    names.sort();

    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .filter(|(_, name)| seen.insert(name.clone()))
        .map(|(_, name)| name)
        .collect()
}

/// Ids of all assets referenced in the given text, without duplicates
pub fn asset_references(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ASSET_REF
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Every variable name referenced anywhere in the story
pub fn referenced_variables(story: &Story) -> BTreeSet<String> {
    story
        .passages
        .values()
        .flat_map(|p| p.texts())
        .flat_map(variable_references)
        .collect()
}

/// Every asset id referenced anywhere in the story
pub fn referenced_assets(story: &Story) -> BTreeSet<String> {
    story
        .passages
        .values()
        .flat_map(|p| p.texts())
        .flat_map(asset_references)
        .collect()
}

/// Guesses the type of a variable from the way the story uses it
///
/// The first usage that gives a hint wins. Falls back to a string.
pub fn infer_variable_type(story: &Story, name: &str) -> VariableType {
    let escaped = regex::escape(name);
    let patterns = [
        (
            format!(r"\${}\s*(==|~=|!=)\s*(true|false)\b", escaped),
            VariableType::Boolean,
        ),
        (format!(r"\bnot\s+\${}\b", escaped), VariableType::Boolean),
        (
            format!(r"\${}\s*(==|~=|!=|<=|>=|<|>|\+|-|\*|/|%)\s*-?\d", escaped),
            VariableType::Number,
        ),
        (
            format!(r"\${}\s*(\+=|-=|=)\s*-?\d", escaped),
            VariableType::Number,
        ),
        (
            format!(r#"\${}\s*(==|~=|!=|=)\s*["']"#, escaped),
            VariableType::String,
        ),
        (format!(r"\${}\s*\.\.", escaped), VariableType::String),
        (format!(r"\${}\s*=\s*(true|false)\b", escaped), VariableType::Boolean),
    ];

    let compiled: Vec<(Regex, VariableType)> = patterns
        .iter()
        .filter_map(|(pattern, var_type)| Regex::new(pattern).ok().map(|re| (re, *var_type)))
        .collect();

    for text in story.passages.values().flat_map(|p| p.texts()) {
        for (re, var_type) in &compiled {
            if re.is_match(text) {
                return *var_type;
            }
        }
    }

    VariableType::String
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Choice, Passage};

    #[test]
    fn finds_sigils_and_interpolations_once() {
        let refs = variable_references("Hi {{name}}, you have $gold gold. $gold! {{ name }}");
        assert_eq!(refs, vec!["name".to_string(), "gold".to_string()]);
    }

    #[test]
    fn finds_asset_ids() {
        let refs = asset_references("![bg](asset://bg-1) and asset://music.ogg and asset://bg-1.");
        assert_eq!(refs, vec!["bg-1".to_string(), "music.ogg".to_string()]);
    }

    fn story_using(condition: &str) -> Story {
        let mut story = Story::new();
        story.insert_passage(
            Passage::new("a", "A", "").with_choice(Choice::new("1", "go", "END").with_condition(condition)),
        );
        story
    }

    #[test]
    fn infers_types_from_usage() {
        assert_eq!(
            infer_variable_type(&story_using("$gold >= 10"), "gold"),
            VariableType::Number
        );
        assert_eq!(
            infer_variable_type(&story_using("$met_king == true"), "met_king"),
            VariableType::Boolean
        );
        assert_eq!(
            infer_variable_type(&story_using("not $door_open"), "door_open"),
            VariableType::Boolean
        );
        assert_eq!(
            infer_variable_type(&story_using("$class == 'mage'"), "class"),
            VariableType::String
        );
        assert_eq!(
            infer_variable_type(&story_using("$mystery"), "mystery"),
            VariableType::String
        );
    }
}
