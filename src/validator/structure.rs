//! Graph-shape rules: start passage, reachability, empty passages and dead ends
use super::Validator;
use crate::issue::{Category, Issue, Severity};
use crate::Story;
use color_eyre::Result;
use std::collections::{BTreeSet, VecDeque};

/// Tags that mark a passage as an intended ending
const ENDING_TAGS: &[&str] = &["end", "ending"];

/// Reports a start passage that is unset or does not exist
pub struct MissingStartPassageValidator;

impl Validator for MissingStartPassageValidator {
    fn name(&self) -> &str {
        "MissingStartPassage"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        if story.start_passage().is_some() {
            return Ok(Vec::new());
        }

        let message = match &story.start_passage {
            Some(id) => format!("Start passage \"{}\" does not exist", id),
            None => "Story has no start passage".to_string(),
        };
        Ok(vec![Issue::new(
            "missing_start".to_string(),
            Severity::Error,
            Category::Structure,
            message,
        )])
    }
}

/// Ids of every passage reachable from the start passage, start included
pub fn reachable_from_start(story: &Story) -> BTreeSet<&str> {
    let mut visited = BTreeSet::new();
    let start = match story.start_passage() {
        Some(start) => start,
        None => return visited,
    };

    let mut queue = VecDeque::new();
    visited.insert(start.id.as_str());
    queue.push_back(start);

    while let Some(passage) = queue.pop_front() {
        for next in story.successors(passage) {
            if visited.insert(next) {
                if let Some(next_passage) = story.passage(next) {
                    queue.push_back(next_passage);
                }
            }
        }
    }

    visited
}

/// Reports every passage that cannot be reached from the start passage
///
/// Without a resolvable start passage there is nothing to measure
/// reachability against, so nothing is reported.
pub struct UnreachablePassagesValidator;

impl Validator for UnreachablePassagesValidator {
    fn name(&self) -> &str {
        "UnreachablePassages"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        if story.start_passage().is_none() {
            return Ok(Vec::new());
        }
        let reachable = reachable_from_start(story);

        Ok(story
            .passages
            .values()
            .filter(|p| !reachable.contains(p.id.as_str()) && !story.is_start(&p.id))
            .map(|p| {
                Issue::new(
                    format!("unreachable_{}", p.id),
                    Severity::Warning,
                    Category::Structure,
                    format!("Passage \"{}\" is unreachable from the start", p.title),
                )
                .with_passage(&p.id)
                .fixable()
            })
            .collect())
    }
}

/// Reports passages with neither content nor choices
pub struct EmptyPassagesValidator;

impl Validator for EmptyPassagesValidator {
    fn name(&self) -> &str {
        "EmptyPassages"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .passages
            .values()
            .filter(|p| p.content.trim().is_empty() && p.choices.is_empty())
            .map(|p| {
                Issue::new(
                    format!("empty_passage_{}", p.id),
                    Severity::Warning,
                    Category::Structure,
                    format!("Passage \"{}\" is empty", p.title),
                )
                .with_passage(&p.id)
            })
            .collect())
    }
}

/// Reports passages without choices that are not tagged as endings
pub struct DeadEndPassagesValidator;

impl Validator for DeadEndPassagesValidator {
    fn name(&self) -> &str {
        "DeadEndPassages"
    }

    fn category(&self) -> Category {
        Category::Structure
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .passages
            .values()
            .filter(|p| p.choices.is_empty())
            .filter(|p| !ENDING_TAGS.iter().any(|tag| p.has_tag(tag)))
            // Already reported as empty
            .filter(|p| !p.content.trim().is_empty())
            .map(|p| {
                Issue::new(
                    format!("dead_end_{}", p.id),
                    Severity::Info,
                    Category::Structure,
                    format!(
                        "Passage \"{}\" has no choices and is not tagged as an ending",
                        p.title
                    ),
                )
                .with_passage(&p.id)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Choice, Passage};

    fn story() -> Story {
        let mut story = Story::new().with_start("start");
        story.insert_passage(
            Passage::new("start", "Start", "Begin")
                .with_choice(Choice::new("c1", "On", "middle"))
                .with_choice(Choice::new("c2", "Quit", "END")),
        );
        story.insert_passage(
            Passage::new("middle", "Middle", "Loop")
                .with_choice(Choice::new("c1", "Back", "start")),
        );
        story.insert_passage(
            Passage::new("island", "Island", "Alone")
                .with_choice(Choice::new("c1", "Swim", "middle")),
        );
        story.insert_passage(Passage::new("void", "Void", ""));
        story
    }

    #[test]
    fn missing_start() {
        let mut story = story();
        assert!(MissingStartPassageValidator.validate(&story).unwrap().is_empty());

        story.start_passage = Some("nope".to_string());
        let issues = MissingStartPassageValidator.validate(&story).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("nope"));

        story.start_passage = None;
        assert_eq!(MissingStartPassageValidator.validate(&story).unwrap().len(), 1);
    }

    #[test]
    fn unreachable_passages() {
        let issues = UnreachablePassagesValidator.validate(&story()).unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["unreachable_island", "unreachable_void"]);
        assert!(issues.iter().all(|i| i.fixable && i.severity == Severity::Warning));
    }

    #[test]
    fn start_without_incoming_edges_is_not_unreachable() {
        let mut story = Story::new().with_start("lonely");
        story.insert_passage(Passage::new("lonely", "Lonely", "Nobody links here"));
        story.insert_passage(Passage::new("other", "Other", "").with_choice(Choice::new(
            "c1",
            "x",
            "other",
        )));

        let issues = UnreachablePassagesValidator.validate(&story).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].passage_id.as_deref(), Some("other"));
    }

    #[test]
    fn empty_and_dead_end_passages() {
        let mut story = story();
        story.insert_passage(Passage::new("fin", "Fin", "The end.").with_tag("Ending"));
        story.insert_passage(Passage::new("stuck", "Stuck", "Nowhere to go."));

        let empty = EmptyPassagesValidator.validate(&story).unwrap();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].id, "empty_passage_void");

        let dead_ends = DeadEndPassagesValidator.validate(&story).unwrap();
        assert_eq!(dead_ends.len(), 1);
        assert_eq!(dead_ends[0].id, "dead_end_stuck");
    }
}
