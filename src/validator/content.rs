//! Content rules: assets, titles and passage length
use super::Validator;
use crate::issue::{Category, Issue, Severity};
use crate::references;
use crate::Story;
use color_eyre::Result;
use std::collections::BTreeSet;

/// Checks asset integrity and the asset references made by passages
pub struct ValidateAssetsValidator {
    large_asset_bytes: u64,
}

impl ValidateAssetsValidator {
    pub fn new(large_asset_bytes: u64) -> Self {
        ValidateAssetsValidator { large_asset_bytes }
    }

    fn asset_exists(story: &Story, id: &str) -> bool {
        story.assets.contains_key(id) || story.assets.values().any(|a| a.id == id)
    }
}

impl Validator for ValidateAssetsValidator {
    fn name(&self) -> &str {
        "ValidateAssets"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for (key, asset) in &story.assets {
            let label = if asset.name.is_empty() { key } else { &asset.name };

            if asset.id.trim().is_empty() {
                issues.push(
                    Issue::new(
                        format!("asset_missing_id_{}", key),
                        Severity::Error,
                        Category::Content,
                        format!("Asset \"{}\" is missing ID", label),
                    )
                    .with_asset(key),
                );
            }

            if asset.path.trim().is_empty() {
                issues.push(
                    Issue::new(
                        format!("asset_missing_path_{}", key),
                        Severity::Error,
                        Category::Content,
                        format!("Asset \"{}\" is missing path", label),
                    )
                    .with_asset(key),
                );
            }

            if let Some(size) = asset.size.filter(|size| *size > self.large_asset_bytes) {
                issues.push(
                    Issue::new(
                        format!("large_asset_{}", key),
                        Severity::Warning,
                        Category::Content,
                        format!(
                            "Asset \"{}\" is large ({:.1} MB)",
                            label,
                            size as f64 / (1024.0 * 1024.0)
                        ),
                    )
                    .with_asset(key),
                );
            }
        }

        for passage in story.passages.values() {
            let broken: BTreeSet<String> = passage
                .texts()
                .flat_map(references::asset_references)
                .filter(|id| !Self::asset_exists(story, id))
                .collect();

            for id in broken {
                issues.push(
                    Issue::new(
                        format!("broken_asset_{}_{}", passage.id, id),
                        Severity::Error,
                        Category::Content,
                        format!("Broken asset reference: \"{}\" does not exist", id),
                    )
                    .with_passage(&passage.id)
                    .with_asset(&id)
                    .with_snippet(&format!("asset://{}", id)),
                );
            }
        }

        let referenced = references::referenced_assets(story);
        for (key, asset) in &story.assets {
            // An asset without an id can only be referenced by its key
            if referenced.contains(key) || (!asset.id.is_empty() && referenced.contains(&asset.id)) {
                continue;
            }
            let label = if asset.name.is_empty() { key } else { &asset.name };
            issues.push(
                Issue::new(
                    format!("unused_asset_{}", key),
                    Severity::Info,
                    Category::Content,
                    format!("Unused asset \"{}\"", label),
                )
                .with_asset(key)
                .fixable(),
            );
        }

        Ok(issues)
    }
}

/// Reports passages without a title
pub struct MissingTitlesValidator;

impl Validator for MissingTitlesValidator {
    fn name(&self) -> &str {
        "MissingTitles"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .passages
            .values()
            .filter(|p| p.title.trim().is_empty())
            .map(|p| {
                Issue::new(
                    format!("missing_title_{}", p.id),
                    Severity::Warning,
                    Category::Content,
                    format!("Passage \"{}\" has no title", p.id),
                )
                .with_passage(&p.id)
            })
            .collect())
    }
}

/// Reports passages whose text is longer than a reader will comfortably take
/// in at once
pub struct LongPassagesValidator {
    max_words: usize,
}

impl LongPassagesValidator {
    pub fn new(max_words: usize) -> Self {
        LongPassagesValidator { max_words }
    }
}

impl Validator for LongPassagesValidator {
    fn name(&self) -> &str {
        "LongPassages"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .passages
            .values()
            .filter_map(|p| {
                let words = p.content.split_whitespace().count();
                if words > self.max_words {
                    Some(
                        Issue::new(
                            format!("long_passage_{}", p.id),
                            Severity::Info,
                            Category::Content,
                            format!(
                                "Passage \"{}\" has {} words (more than {})",
                                p.title, words, self.max_words
                            ),
                        )
                        .with_passage(&p.id),
                    )
                } else {
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Asset, Passage};

    fn story() -> Story {
        let mut story = Story::new().with_start("start");
        story.insert_passage(Passage::new(
            "start",
            "Start",
            "![bg](asset://bg) and ![ghost](asset://ghost) asset://ghost",
        ));
        story.insert_asset(Asset::new("bg", "Background", "img/bg.png"));
        story.insert_asset(Asset::new("theme", "Theme", "audio/theme.ogg").with_size(50 * 1024 * 1024));
        story
    }

    #[test]
    fn assets() {
        let mut story = story();
        story
            .assets
            .insert("nameless".to_string(), Asset::new("", "Portrait", ""));

        let issues = ValidateAssetsValidator::new(10 * 1024 * 1024)
            .validate(&story)
            .unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "asset_missing_id_nameless",
                "asset_missing_path_nameless",
                "large_asset_theme",
                "broken_asset_start_ghost",
                "unused_asset_nameless",
                "unused_asset_theme",
            ]
        );
        assert!(issues[0].message.contains("missing ID"));
        assert!(issues[0].message.contains("Portrait"));
        assert!(!issues[2].fixable);
        assert_eq!(issues[3].passage_id.as_deref(), Some("start"));
        assert!(issues[3].message.starts_with("Broken asset reference"));
        assert!(issues[5].fixable);
        assert_eq!(issues[5].severity, Severity::Info);
    }

    #[test]
    fn nameless_assets_are_keyed_and_removable() {
        let mut story = story();
        story
            .assets
            .insert("left".to_string(), Asset::new("", "Portrait", "img/left.png"));
        story
            .assets
            .insert("right".to_string(), Asset::new("", "Portrait", "img/right.png"));

        let issues = ValidateAssetsValidator::new(10 * 1024 * 1024)
            .validate(&story)
            .unwrap();
        let missing: Vec<&str> = issues
            .iter()
            .filter(|i| i.id.starts_with("asset_missing_id_"))
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(missing, vec!["asset_missing_id_left", "asset_missing_id_right"]);

        let unused = issues
            .iter()
            .find(|i| i.id == "unused_asset_left")
            .unwrap();
        unused.fix_action().unwrap().apply(&mut story).unwrap();
        assert!(!story.assets.contains_key("left"));
        assert!(story.assets.contains_key("right"));
    }

    #[test]
    fn titles_and_length() {
        let mut story = Story::new();
        story.insert_passage(Passage::new("a", "", "one two three"));
        story.insert_passage(Passage::new("b", "B", "one two three four"));

        let missing = MissingTitlesValidator.validate(&story).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].passage_id.as_deref(), Some("a"));

        let long = LongPassagesValidator::new(3).validate(&story).unwrap();
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].id, "long_passage_b");
    }
}
