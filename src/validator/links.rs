//! Choice rules
use super::Validator;
use crate::issue::{Category, Issue, Severity};
use crate::story::ChoiceTarget;
use crate::Story;
use color_eyre::Result;
use std::collections::BTreeMap;

/// Reports choices that lead to a passage that does not exist
pub struct DeadLinksValidator;

impl Validator for DeadLinksValidator {
    fn name(&self) -> &str {
        "DeadLinks"
    }

    fn category(&self) -> Category {
        Category::Links
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for passage in story.passages.values() {
            for choice in &passage.choices {
                let target = match &choice.target {
                    ChoiceTarget::Passage(target) => target,
                    _ => continue,
                };
                if story.passages.contains_key(target) {
                    continue;
                }

                issues.push(
                    Issue::new(
                        format!("dead_link_{}_{}", passage.id, choice.id),
                        Severity::Error,
                        Category::Links,
                        format!(
                            "Choice \"{}\" in \"{}\" leads to missing passage \"{}\"",
                            choice.text, passage.title, target
                        ),
                    )
                    .with_passage(&passage.id)
                    .with_choice(&choice.id)
                    .with_snippet(target)
                    .fixable(),
                );
            }
        }

        Ok(issues)
    }
}

/// Reports choices without any text for the player to read
pub struct EmptyChoiceTextValidator;

impl Validator for EmptyChoiceTextValidator {
    fn name(&self) -> &str {
        "EmptyChoiceText"
    }

    fn category(&self) -> Category {
        Category::Links
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .passages
            .values()
            .flat_map(|passage| {
                passage
                    .choices
                    .iter()
                    .filter(|c| c.text.trim().is_empty())
                    .map(move |choice| {
                        Issue::new(
                            format!("empty_choice_text_{}_{}", passage.id, choice.id),
                            Severity::Warning,
                            Category::Links,
                            format!(
                                "Choice \"{}\" in \"{}\" has no text",
                                choice.id, passage.title
                            ),
                        )
                        .with_passage(&passage.id)
                        .with_choice(&choice.id)
                    })
            })
            .collect())
    }
}

/// Reports choices that repeat an earlier choice's target within a passage
pub struct DuplicateChoicesValidator;

impl Validator for DuplicateChoicesValidator {
    fn name(&self) -> &str {
        "DuplicateChoices"
    }

    fn category(&self) -> Category {
        Category::Links
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for passage in story.passages.values() {
            let mut first_by_target: BTreeMap<String, &str> = BTreeMap::new();
            for choice in &passage.choices {
                // Conditional choices often share a target on purpose
                if choice.condition.is_some() {
                    continue;
                }
                let target = choice.target.to_string();
                match first_by_target.get(&target) {
                    Some(first) => issues.push(
                        Issue::new(
                            format!("duplicate_choice_{}_{}", passage.id, choice.id),
                            Severity::Warning,
                            Category::Links,
                            format!(
                                "Choice \"{}\" in \"{}\" leads to \"{}\" like choice \"{}\"",
                                choice.id, passage.title, target, first
                            ),
                        )
                        .with_passage(&passage.id)
                        .with_choice(&choice.id),
                    ),
                    None => {
                        first_by_target.insert(target, choice.id.as_str());
                    }
                }
            }
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Choice, Passage};

    fn story() -> Story {
        let mut story = Story::new().with_start("start");
        story.insert_passage(
            Passage::new("start", "Start", "")
                .with_choice(Choice::new("c1", "Go", "hall"))
                .with_choice(Choice::new("c2", "Oops", "hal"))
                .with_choice(Choice::new("c3", "", "END"))
                .with_choice(Choice::new("c4", "Back", "BACK"))
                .with_choice(Choice::new("c5", "Again", "hall")),
        );
        story.insert_passage(
            Passage::new("hall", "Hall", "")
                .with_choice(Choice::new("c1", "Restart", "RESTART"))
                .with_choice(Choice::new("c2", "Lost", "cellar")),
        );
        story
    }

    #[test]
    fn one_error_per_dead_link() {
        let issues = DeadLinksValidator.validate(&story()).unwrap();
        let keys: Vec<(Option<&str>, Option<&str>)> = issues
            .iter()
            .map(|i| (i.passage_id.as_deref(), i.choice_id.as_deref()))
            .collect();
        assert_eq!(keys, vec![(Some("hall"), Some("c2")), (Some("start"), Some("c2"))]);
        assert!(issues
            .iter()
            .all(|i| i.category == Category::Links && i.severity == Severity::Error));
        assert_eq!(issues[1].id, "dead_link_start_c2");
    }

    #[test]
    fn empty_choice_text() {
        let issues = EmptyChoiceTextValidator.validate(&story()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "empty_choice_text_start_c3");
    }

    #[test]
    fn duplicate_choices() {
        let issues = DuplicateChoicesValidator.validate(&story()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].choice_id.as_deref(), Some("c5"));
    }
}
