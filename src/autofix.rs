//! Automatic repair of validation issues
//!
//! Issues carry no behavior of their own. The [`AutoFixer`] recognizes an
//! issue by its id and category, turns it into a [`FixAction`] naming its
//! target, and applies that action to the story.
//!
//! [`AutoFixer`]: struct.AutoFixer.html
//! [`FixAction`]: enum.FixAction.html

use crate::issue::{Category, Issue};
use crate::references;
use crate::story::Variable;
use crate::Story;
use color_eyre::Result;
use eyre::eyre;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The kinds of issues the fixer knows how to repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FixKind {
    UnreachablePassage,
    DeadLink,
    UndefinedVariable,
    UnusedVariable,
    UnusedAsset,
}

impl FixKind {
    const PATTERNS: &'static [(&'static str, Category, FixKind)] = &[
        ("unreachable_", Category::Structure, FixKind::UnreachablePassage),
        ("dead_link_", Category::Links, FixKind::DeadLink),
        ("undefined_var_", Category::Variables, FixKind::UndefinedVariable),
        ("unused_var_", Category::Variables, FixKind::UnusedVariable),
        ("unused_asset_", Category::Content, FixKind::UnusedAsset),
    ];

    /// Recognizes an issue by its id prefix and category
    pub fn of(issue: &Issue) -> Option<FixKind> {
        Self::PATTERNS
            .iter()
            .find(|(prefix, category, _)| {
                issue.id.starts_with(prefix) && issue.category == *category
            })
            .map(|(_, _, kind)| *kind)
    }

    fn prefix(self) -> &'static str {
        Self::PATTERNS
            .iter()
            .find(|(_, _, kind)| *kind == self)
            .map(|(prefix, _, _)| *prefix)
            .unwrap_or_default()
    }

    fn describe(self, count: usize) -> String {
        let (singular, plural) = match self {
            FixKind::UnreachablePassage => ("unreachable passage", "unreachable passages"),
            FixKind::DeadLink => ("dead link", "dead links"),
            FixKind::UndefinedVariable => ("undefined variable", "undefined variables"),
            FixKind::UnusedVariable => ("unused variable", "unused variables"),
            FixKind::UnusedAsset => ("unused asset", "unused assets"),
        };
        format!("{} {}", count, if count == 1 { singular } else { plural })
    }
}

/// A single repair, identified by its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixAction {
    DeletePassage { passage_id: String },
    RemoveChoice { passage_id: String, choice_id: String },
    DeclareVariable { name: String },
    RemoveVariable { name: String },
    RemoveAsset { asset_id: String },
}

/// What applying a [`FixAction`] changed
///
/// [`FixAction`]: enum.FixAction.html
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    PassageDeleted(String),
    ChoiceDeleted(ChoiceRef),
    VariableAdded(String),
    VariableDeleted(String),
    AssetDeleted(String),
    /// The problem was already gone
    AlreadyResolved,
}

impl FixAction {
    /// Builds the action repairing the given issue, taking the target from
    /// the issue's fields and falling back to the id suffix for
    /// single-target kinds
    pub fn for_issue(issue: &Issue) -> Option<FixAction> {
        let kind = FixKind::of(issue)?;
        let suffix = || {
            let rest = &issue.id[kind.prefix().len()..];
            if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            }
        };

        match kind {
            FixKind::UnreachablePassage => issue
                .passage_id
                .clone()
                .or_else(suffix)
                .map(|passage_id| FixAction::DeletePassage { passage_id }),
            FixKind::DeadLink => match (&issue.passage_id, &issue.choice_id) {
                (Some(passage_id), Some(choice_id)) => Some(FixAction::RemoveChoice {
                    passage_id: passage_id.clone(),
                    choice_id: choice_id.clone(),
                }),
                _ => None,
            },
            FixKind::UndefinedVariable => issue
                .variable_name
                .clone()
                .or_else(suffix)
                .map(|name| FixAction::DeclareVariable { name }),
            FixKind::UnusedVariable => issue
                .variable_name
                .clone()
                .or_else(suffix)
                .map(|name| FixAction::RemoveVariable { name }),
            FixKind::UnusedAsset => issue
                .asset_id
                .clone()
                .or_else(suffix)
                .map(|asset_id| FixAction::RemoveAsset { asset_id }),
        }
    }

    /// Applies the repair to the story
    ///
    /// The start passage is never deleted.
    pub fn apply(&self, story: &mut Story) -> Result<Applied> {
        match self {
            FixAction::DeletePassage { passage_id } => {
                if story.is_start(passage_id) {
                    return Err(eyre!("Refusing to delete start passage \"{}\"", passage_id));
                }
                Ok(story
                    .passages
                    .remove(passage_id)
                    .map(|_| Applied::PassageDeleted(passage_id.clone()))
                    .unwrap_or(Applied::AlreadyResolved))
            }
            FixAction::RemoveChoice {
                passage_id,
                choice_id,
            } => {
                let position = {
                    let story: &Story = story;
                    story.passages.get(passage_id).and_then(|p| {
                        p.choices.iter().position(|c| {
                            &c.id == choice_id
                                && c.target
                                    .passage_id()
                                    .map_or(false, |t| !story.passages.contains_key(t))
                        })
                    })
                };

                match (position, story.passages.get_mut(passage_id)) {
                    (Some(index), Some(passage)) => {
                        passage.choices.remove(index);
                        Ok(Applied::ChoiceDeleted(ChoiceRef {
                            passage_id: passage_id.clone(),
                            choice_id: choice_id.clone(),
                        }))
                    }
                    _ => Ok(Applied::AlreadyResolved),
                }
            }
            FixAction::DeclareVariable { name } => {
                if story.variables.contains_key(name) {
                    return Ok(Applied::AlreadyResolved);
                }
                let var_type = references::infer_variable_type(story, name);
                story.insert_variable(Variable::with_default(name, var_type));
                Ok(Applied::VariableAdded(name.clone()))
            }
            FixAction::RemoveVariable { name } => Ok(story
                .variables
                .remove(name)
                .map(|_| Applied::VariableDeleted(name.clone()))
                .unwrap_or(Applied::AlreadyResolved)),
            FixAction::RemoveAsset { asset_id } => {
                let key = if story.assets.contains_key(asset_id) {
                    Some(asset_id.clone())
                } else {
                    story
                        .assets
                        .iter()
                        .find(|(_, asset)| &asset.id == asset_id)
                        .map(|(key, _)| key.clone())
                };
                Ok(key
                    .and_then(|key| story.assets.remove(&key))
                    .map(|_| Applied::AssetDeleted(asset_id.clone()))
                    .unwrap_or(Applied::AlreadyResolved))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRef {
    pub passage_id: String,
    pub choice_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixFailure {
    pub issue_id: String,
    pub reason: String,
}

/// Outcome of a fix pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResult {
    /// True only if every issue was fixed
    pub success: bool,
    pub issues_fixed: usize,
    pub issues_failed: usize,
    pub passages_deleted: Vec<String>,
    pub choices_deleted: Vec<ChoiceRef>,
    pub variables_added: Vec<String>,
    pub variables_deleted: Vec<String>,
    pub assets_deleted: Vec<String>,
    pub failures: Vec<FixFailure>,
}

impl FixResult {
    fn record(&mut self, applied: Applied) {
        self.issues_fixed += 1;
        match applied {
            Applied::PassageDeleted(id) => self.passages_deleted.push(id),
            Applied::ChoiceDeleted(choice) => self.choices_deleted.push(choice),
            Applied::VariableAdded(name) => self.variables_added.push(name),
            Applied::VariableDeleted(name) => self.variables_deleted.push(name),
            Applied::AssetDeleted(id) => self.assets_deleted.push(id),
            Applied::AlreadyResolved => {}
        }
    }

    fn fail(&mut self, issue: &Issue, reason: String) {
        self.issues_failed += 1;
        self.failures.push(FixFailure {
            issue_id: issue.id.clone(),
            reason,
        });
    }
}

/// Applies repairs for a list of issues to a story
///
/// Calls must not overlap; the story is mutated in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoFixer;

impl AutoFixer {
    pub fn new() -> Self {
        AutoFixer
    }

    /// Whether the issue is of a recognized kind, regardless of whether the
    /// fix would succeed on the current story
    pub fn can_fix(&self, issue: &Issue) -> bool {
        FixKind::of(issue).is_some()
    }

    /// Fixes every issue it can. Never fails as a whole: issues that cannot
    /// be fixed are counted and the rest are still applied.
    pub fn fix(&self, story: &mut Story, issues: &[Issue]) -> FixResult {
        let mut result = FixResult::default();

        for issue in issues {
            let action = match FixAction::for_issue(issue) {
                Some(action) => action,
                None => {
                    warn!("Don't know how to fix issue {}", issue.id);
                    result.fail(issue, "Unrecognized issue".to_string());
                    continue;
                }
            };

            match action.apply(story) {
                Ok(applied) => {
                    info!("Fixed {}: {:?}", issue.id, applied);
                    result.record(applied);
                }
                Err(err) => {
                    warn!("Failed to fix {}: {}", issue.id, err);
                    result.fail(issue, err.to_string());
                }
            }
        }

        result.success = result.issues_failed == 0;
        result
    }

    /// Summarizes the fixes that would be applied, grouped by kind
    pub fn get_fix_description(&self, issues: &[Issue]) -> String {
        let mut counts: BTreeMap<FixKind, usize> = BTreeMap::new();
        for kind in issues.iter().filter_map(FixKind::of) {
            *counts.entry(kind).or_default() += 1;
        }

        if counts.is_empty() {
            return "No fixable issues".to_string();
        }

        counts
            .into_iter()
            .map(|(kind, count)| kind.describe(count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use crate::story::{Asset, Choice, Passage, VariableType, VariableValue};
    use crate::validator::{Limits, ValidatorRegistry};
    use pretty_assertions::assert_eq;

    fn story() -> Story {
        let mut story = Story::new().with_start("start");
        story.insert_passage(
            Passage::new("start", "Start", "Gold: $gold")
                .with_choice(Choice::new("c1", "Walk", "road").with_condition("$gold > 3"))
                .with_choice(Choice::new("c2", "Fly", "sky")),
        );
        story.insert_passage(Passage::new("road", "Road", "A long road.").with_tag("end"));
        story.insert_passage(Passage::new("ruins", "Ruins", "Forgotten.").with_tag("end"));
        story.insert_variable(Variable::new(
            "unused",
            VariableType::Boolean,
            VariableValue::Bool(true),
        ));
        story.insert_asset(Asset::new("music", "Music", "a.ogg"));
        story
    }

    fn issue(id: &str, category: Category) -> Issue {
        Issue::new(id.to_string(), Severity::Warning, category, String::new()).fixable()
    }

    #[test]
    fn fixes_validator_findings() {
        let mut story = story();
        let registry = ValidatorRegistry::with_defaults(&Limits::default());
        let issues: Vec<Issue> = registry
            .validate(&story)
            .into_iter()
            .filter(|i| i.fixable)
            .collect();

        let result = AutoFixer::new().fix(&mut story, &issues);

        assert!(result.success, "{:?}", result.failures);
        assert_eq!(result.issues_fixed, 5);
        assert_eq!(result.passages_deleted, vec!["ruins".to_string()]);
        assert_eq!(
            result.choices_deleted,
            vec![ChoiceRef {
                passage_id: "start".to_string(),
                choice_id: "c2".to_string()
            }]
        );
        assert_eq!(result.variables_added, vec!["gold".to_string()]);
        assert_eq!(result.variables_deleted, vec!["unused".to_string()]);
        assert_eq!(result.assets_deleted, vec!["music".to_string()]);
        assert_eq!(story.variables["gold"].var_type, VariableType::Number);

        let remaining: Vec<Issue> = registry
            .validate(&story)
            .into_iter()
            .filter(|i| i.fixable)
            .collect();
        assert!(remaining.is_empty(), "{:?}", remaining);
    }

    #[test]
    fn never_deletes_start_passage() {
        let mut story = story();
        let before = story.passages.len();
        let issue = issue("unreachable_start", Category::Structure).with_passage("start");

        let result = AutoFixer::new().fix(&mut story, &[issue]);

        assert!(!result.success);
        assert_eq!(result.issues_failed, 1);
        assert_eq!(result.issues_fixed, 0);
        assert_eq!(story.passages.len(), before);
    }

    #[test]
    fn already_resolved_issues_count_as_fixed() {
        let mut story = story();
        let issues = vec![
            issue("undefined_var_unused", Category::Variables).with_variable("unused"),
            issue("unused_var_ghost", Category::Variables).with_variable("ghost"),
            issue("unreachable_gone", Category::Structure).with_passage("gone"),
        ];

        let first = AutoFixer::new().fix(&mut story, &issues);
        let second = AutoFixer::new().fix(&mut story, &issues);

        for result in &[first, second] {
            assert!(result.success);
            assert_eq!(result.issues_fixed, 3);
            assert!(result.variables_added.is_empty());
            assert!(result.variables_deleted.is_empty());
        }
    }

    #[test]
    fn unknown_issues_fail_without_stopping_the_pass() {
        let mut story = story();
        let issues = vec![
            issue("empty_passage_road", Category::Structure),
            issue("unused_var_unused", Category::Variables).with_variable("unused"),
            issue("dead_link_start", Category::Links),
        ];

        let result = AutoFixer::new().fix(&mut story, &issues);

        assert!(!result.success);
        assert_eq!(result.issues_failed, 2);
        assert_eq!(result.issues_fixed, 1);
        assert_eq!(result.variables_deleted, vec!["unused".to_string()]);
    }

    #[test]
    fn can_fix_ignores_story_state() {
        let fixer = AutoFixer::new();
        assert!(fixer.can_fix(&issue("unreachable_start", Category::Structure)));
        assert!(fixer.can_fix(&issue("dead_link_a_b", Category::Links)));
        assert!(!fixer.can_fix(&issue("dead_link_a_b", Category::Content)));
        assert!(!fixer.can_fix(&issue("missing_start", Category::Structure)));
    }

    #[test]
    fn fix_description() {
        let fixer = AutoFixer::new();
        assert_eq!(fixer.get_fix_description(&[]), "No fixable issues");

        let issues = vec![
            issue("dead_link_a_1", Category::Links),
            issue("unreachable_x", Category::Structure),
            issue("unreachable_y", Category::Structure),
            issue("missing_start", Category::Structure),
        ];
        assert_eq!(
            fixer.get_fix_description(&issues),
            "2 unreachable passages, 1 dead link"
        );
    }

    #[test]
    fn unused_asset_fix_action_removes_asset() {
        let mut story = story();
        let issue = issue("unused_asset_music", Category::Content).with_asset("music");

        let action = issue.fix_action().unwrap();
        assert_eq!(
            action.apply(&mut story).unwrap(),
            Applied::AssetDeleted("music".to_string())
        );
        assert!(story.assets.is_empty());
    }
}
