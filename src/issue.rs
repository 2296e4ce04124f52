//! Validation findings and their presentation
use crate::autofix::FixAction;
use crate::Config;
use crate::StoryFiles;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::Files;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structure,
    Links,
    Variables,
    Content,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Structure => "structure",
            Category::Links => "links",
            Category::Variables => "variables",
            Category::Content => "content",
        };
        write!(f, "{}", name)
    }
}

/// A single finding produced by a validator
///
/// The `id` is derived from the kind of finding and its target (for example
/// `dead_link_<passageId>_<choiceId>`), so the same problem keeps the same id
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub severity: Severity,
    pub category: Category,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    pub fixable: bool,

    /// Name of the validator that produced the issue. Set by the registry.
    #[serde(default)]
    pub rule: String,

    /// Text inside the passage content to point at when reporting
    #[serde(skip)]
    pub snippet: Option<String>,
}

impl Issue {
    pub fn new(id: String, severity: Severity, category: Category, message: String) -> Self {
        Issue {
            id,
            severity,
            category,
            message,
            passage_id: None,
            choice_id: None,
            variable_name: None,
            asset_id: None,
            fixable: false,
            rule: String::new(),
            snippet: None,
        }
    }

    pub fn with_passage(mut self, passage_id: &str) -> Self {
        self.passage_id = Some(passage_id.to_string());
        self
    }

    pub fn with_choice(mut self, choice_id: &str) -> Self {
        self.choice_id = Some(choice_id.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str) -> Self {
        self.variable_name = Some(name.to_string());
        self
    }

    pub fn with_asset(mut self, asset_id: &str) -> Self {
        self.asset_id = Some(asset_id.to_string());
        self
    }

    pub fn with_snippet(mut self, snippet: &str) -> Self {
        self.snippet = Some(snippet.to_string());
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    /// The repair for this issue, if it is fixable and its shape is
    /// recognized
    pub fn fix_action(&self) -> Option<FixAction> {
        if self.fixable {
            FixAction::for_issue(self)
        } else {
            None
        }
    }

    fn get_name(&self) -> &str {
        if self.rule.is_empty() {
            self.category_name()
        } else {
            self.rule.as_str()
        }
    }

    fn category_name(&self) -> &'static str {
        match self.category {
            Category::Structure => "structure",
            Category::Links => "links",
            Category::Variables => "variables",
            Category::Content => "content",
        }
    }

    fn get_file_id_and_range(
        &self,
        story_files: &StoryFiles,
    ) -> Option<(usize, std::ops::Range<usize>)> {
        let file_id = self
            .passage_id
            .as_ref()
            .and_then(|id| story_files.lookup_id(id))?;
        self.snippet
            .as_ref()
            .and_then(|snippet| story_files.find(file_id, snippet))
            .map(|range| (file_id, range))
    }

    pub fn report(&self, story_files: &StoryFiles) -> Diagnostic<<StoryFiles as Files>::FileId> {
        let diagnostic = match self.severity {
            Severity::Critical | Severity::Error => Diagnostic::error(),
            Severity::Warning => Diagnostic::warning(),
            Severity::Info => Diagnostic::note(),
        }
        .with_message(self.message.clone())
        .with_code(self.get_name());

        let mut notes = Vec::new();
        if let Some(passage_id) = &self.passage_id {
            notes.push(format!("in passage \"{}\"", passage_id));
        }
        if self.id.starts_with("dead_link_") {
            if let Some(suggestion) = self
                .snippet
                .as_ref()
                .and_then(|target| did_you_mean(target, &story_files.passage_names).pop())
            {
                notes.push(format!(
                    "Found passage with similar name: \"{}\"",
                    suggestion
                ));
            }
        }
        if self.fixable {
            notes.push("can be fixed automatically with --fix".to_string());
        }

        match self.get_file_id_and_range(story_files) {
            Some((fid, range)) => diagnostic
                .with_labels(vec![Label::primary(fid, range)])
                .with_notes(notes),
            None => diagnostic.with_notes(notes),
        }
    }
}

fn did_you_mean<T, I>(v: &str, possible_values: I) -> Vec<String>
where
    T: AsRef<str>,
    I: IntoIterator<Item = T>,
{
    let mut candidates: Vec<(f64, String)> = possible_values
        .into_iter()
        .map(|pv| (strsim::jaro_winkler(v, pv.as_ref()), pv.as_ref().to_owned()))
        .filter(|(confidence, _)| *confidence > 0.8)
        .collect();
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    candidates.into_iter().map(|(_, pv)| pv).collect()
}

/// Drops allowed issues and promotes denied ones to errors, then orders the
/// rest by descending severity.
///
/// Returns the issues along with whether any of them is an error.
pub fn filter_and_sort_issues(issues: Vec<Issue>, config: &Config) -> (Vec<Issue>, bool) {
    let all = "all".to_string();
    let allow_all = config.allowed.contains(&all);
    let deny_all = config.denied.contains(&all);

    let mut kept: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| !allow_all && !config.allowed.contains(&issue.rule))
        .map(|mut issue| {
            if (deny_all || config.denied.contains(&issue.rule)) && issue.severity < Severity::Error
            {
                issue.severity = Severity::Error;
            }
            issue
        })
        .collect();

    kept.sort_by(|left, right| right.severity.cmp(&left.severity));
    let is_err = kept.iter().any(|issue| issue.severity >= Severity::Error);

    (kept, is_err)
}

/// Prints a one-line summary of an issue
pub fn print_issue(issue: &Issue, stdout: &mut StandardStream) -> Result<()> {
    let color = match issue.severity {
        Severity::Critical | Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    };
    stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(stdout, "{}: ", issue.severity)?;
    stdout.reset()?;
    write!(stdout, "[{}] {}", issue.get_name(), issue.message)?;
    if let Some(passage_id) = &issue.passage_id {
        write!(stdout, " (passage \"{}\")", passage_id)?;
    }
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Passage, Story};

    fn issue(rule: &str, severity: Severity) -> Issue {
        let mut issue = Issue::new(
            format!("{}_x", rule),
            severity,
            Category::Structure,
            "msg".to_string(),
        );
        issue.rule = rule.to_string();
        issue
    }

    #[test]
    fn allow_and_deny() {
        let mut config = Config::default();
        config.allowed = vec!["EmptyPassages".to_string()];
        config.denied = vec!["DeadEndPassages".to_string()];

        let issues = vec![
            issue("EmptyPassages", Severity::Warning),
            issue("DeadEndPassages", Severity::Info),
            issue("MissingTitles", Severity::Warning),
        ];
        let (kept, is_err) = filter_and_sort_issues(issues, &config);

        assert!(is_err);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].rule, "DeadEndPassages");
        assert_eq!(kept[0].severity, Severity::Error);
        assert_eq!(kept[1].rule, "MissingTitles");
    }

    #[test]
    fn allow_all_drops_everything() {
        let mut config = Config::default();
        config.allowed = vec!["all".to_string()];
        let (kept, is_err) =
            filter_and_sort_issues(vec![issue("DeadLinks", Severity::Error)], &config);
        assert!(kept.is_empty());
        assert!(!is_err);
    }

    #[test]
    fn dead_link_report_suggests_similar_passage() {
        let mut story = Story::new();
        story.insert_passage(Passage::new("forest", "Forest", "Go to [[forrest]]"));
        let files = StoryFiles::new(&story);

        let issue = Issue::new(
            "dead_link_forest_c1".to_string(),
            Severity::Error,
            Category::Links,
            "Dead link".to_string(),
        )
        .with_passage("forest")
        .with_choice("c1")
        .with_snippet("forrest");

        let diagnostic = issue.report(&files);
        assert_eq!(diagnostic.labels.len(), 1);
        assert!(diagnostic
            .notes
            .iter()
            .any(|n| n.contains("similar name: \"forest\"")));
    }
}
