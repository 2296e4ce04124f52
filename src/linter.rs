//! Handles validating a story based on the given [`Config`]
//!
//! [`Config`]: struct.Config.html

use crate::issue::{self, Issue};
use crate::validator::ValidatorRegistry;
use crate::Config;
use crate::Story;
use crate::StoryFiles;
use codespan_reporting::term;
use color_eyre::Result;
use std::io::Write;
use termcolor::StandardStream;

/// Builds the default registry, minus the validators disabled in the config
pub fn registry(config: &Config) -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::with_defaults(&config.limits);
    for name in &config.disabled {
        registry.set_enabled(name, false);
    }
    registry
}

/// Validates the given story and outputs its issues to the given stream.
///
/// Issues are ignored or promoted to errors as specified in the config. The
/// remaining issues are returned, along with whether any of them is an error.
pub fn lint(
    story: &Story,
    registry: &ValidatorRegistry,
    config: &Config,
    stdout: &mut StandardStream,
) -> Result<(Vec<Issue>, bool)> {
    let (issues, is_err) = issue::filter_and_sort_issues(registry.validate(story), config);

    if config.compact {
        for issue in &issues {
            issue::print_issue(issue, stdout)?;
        }
    } else {
        let story_files = StoryFiles::new(story);
        let term_config = term::Config::default();
        for issue in &issues {
            let diagnostic = issue.report(&story_files);
            term::emit(&mut stdout.lock(), &term_config, &story_files, &diagnostic)?;
        }
    }

    // Force reset of color
    stdout.flush()?;

    Ok((issues, is_err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Choice, Passage};

    #[test]
    fn disabled_validators_are_skipped() {
        let story = Story::new().with_start("start");
        let mut config = Config::default();
        config.disabled = vec!["MissingStartPassage".to_string()];

        let registry = registry(&config);
        assert!(!registry.is_enabled("MissingStartPassage"));
        assert!(registry
            .validate(&story)
            .iter()
            .all(|issue| issue.id != "missing_start"));
    }

    #[test]
    fn denied_rules_fail_the_run() {
        let mut story = Story::new().with_start("start");
        story.insert_passage(
            Passage::new("start", "Start", "A road.")
                .with_choice(Choice::new("c1", "Walk", "end")),
        );
        story.insert_passage(Passage::new("end", "End", "The end."));

        let mut config = Config::default();
        config.compact = true;
        let mut stdout = StandardStream::stdout(termcolor::ColorChoice::Never);

        let (issues, is_err) = lint(&story, &registry(&config), &config, &mut stdout).unwrap();
        assert!(!is_err);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "dead_end_end");

        config.denied = vec!["DeadEndPassages".to_string()];
        let (_, is_err) = lint(&story, &registry(&config), &config, &mut stdout).unwrap();
        assert!(is_err);
    }
}
