//! The story graph read by the validators and the simulator, and mutated by
//! the [`AutoFixer`].
//!
//! Passages, variables and assets are kept in ordered maps keyed by their id
//! (or name), so every walk over the story visits them in the same order.
//!
//! [`AutoFixer`]: ../autofix/struct.AutoFixer.html

use color_eyre::Result;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a [`Choice`] leads
///
/// Serialized as a plain string: either a passage id or one of the sentinels
/// `END`, `BACK` and `RESTART`.
///
/// [`Choice`]: struct.Choice.html
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChoiceTarget {
    Passage(String),
    End,
    Back,
    Restart,
}

impl ChoiceTarget {
    /// Parses a raw target, recognizing the sentinel values
    pub fn parse(raw: &str) -> Self {
        match raw {
            "END" => ChoiceTarget::End,
            "BACK" => ChoiceTarget::Back,
            "RESTART" => ChoiceTarget::Restart,
            other => ChoiceTarget::Passage(other.to_string()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, ChoiceTarget::Passage(_))
    }

    /// The target passage id, if this is not a sentinel
    pub fn passage_id(&self) -> Option<&str> {
        match self {
            ChoiceTarget::Passage(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

impl From<String> for ChoiceTarget {
    fn from(raw: String) -> Self {
        ChoiceTarget::parse(&raw)
    }
}

impl From<ChoiceTarget> for String {
    fn from(target: ChoiceTarget) -> Self {
        target.to_string()
    }
}

impl fmt::Display for ChoiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceTarget::Passage(id) => write!(f, "{}", id),
            ChoiceTarget::End => write!(f, "END"),
            ChoiceTarget::Back => write!(f, "BACK"),
            ChoiceTarget::Restart => write!(f, "RESTART"),
        }
    }
}

/// A directed, optionally conditional edge out of a passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Unique within the owning passage
    pub id: String,

    #[serde(default)]
    pub text: String,

    pub target: ChoiceTarget,

    /// Opaque boolean expression guarding the choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Choice {
    pub fn new(id: &str, text: &str, target: &str) -> Self {
        Choice {
            id: id.to_string(),
            text: text.to_string(),
            target: ChoiceTarget::parse(target),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }
}

/// A node of the narrative graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    /// Filled from the map key when omitted in a JSON story
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub choices: Vec<Choice>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Script source run when the passage is entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<String>,
}

impl Passage {
    pub fn new(id: &str, title: &str, content: &str) -> Self {
        Passage {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            choices: Vec::new(),
            tags: Vec::new(),
            on_enter: None,
        }
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_on_enter(mut self, script: &str) -> Self {
        self.on_enter = Some(script.to_string());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Every piece of free text in which references may appear: content,
    /// then each choice's text and condition, then the on-enter script
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.content.as_str())
            .chain(
                self.choices
                    .iter()
                    .flat_map(|c| std::iter::once(c.text.as_str()).chain(c.condition.as_deref())),
            )
            .chain(self.on_enter.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
}

impl VariableType {
    pub fn default_value(self) -> VariableValue {
        match self {
            VariableType::String => VariableValue::Text(String::new()),
            VariableType::Number => VariableValue::Number(0.0),
            VariableType::Boolean => VariableValue::Bool(false),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::String => "string",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl VariableValue {
    /// True if the value is of the given declared type
    pub fn matches(&self, var_type: VariableType) -> bool {
        matches!(
            (self, var_type),
            (VariableValue::Bool(_), VariableType::Boolean)
                | (VariableValue::Number(_), VariableType::Number)
                | (VariableValue::Text(_), VariableType::String)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Filled from the map key when omitted in a JSON story
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub var_type: VariableType,

    pub initial_value: VariableValue,
}

impl Variable {
    pub fn new(name: &str, var_type: VariableType, initial_value: VariableValue) -> Self {
        Variable {
            name: name.to_string(),
            var_type,
            initial_value,
        }
    }

    /// A variable holding the default value of its type
    pub fn with_default(name: &str, var_type: VariableType) -> Self {
        Variable::new(name, var_type, var_type.default_value())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub asset_type: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub mime_type: String,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Asset {
    pub fn new(id: &str, name: &str, path: &str) -> Self {
        Asset {
            id: id.to_string(),
            name: name.to_string(),
            asset_type: String::new(),
            path: path.to_string(),
            mime_type: String::new(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A complete branching story
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub start_passage: Option<String>,

    #[serde(default)]
    pub passages: BTreeMap<String, Passage>,

    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,

    /// Keyed by map key rather than `Asset::id`, so that an asset with an
    /// empty id can still be stored and reported
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
}

impl Story {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a story exported by the editor as JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let mut story: Story =
            serde_json::from_str(json).wrap_err_with(|| "Failed to parse story JSON")?;

        for (id, passage) in story.passages.iter_mut() {
            if passage.id.is_empty() {
                passage.id = id.clone();
            }
        }
        for (name, variable) in story.variables.iter_mut() {
            if variable.name.is_empty() {
                variable.name = name.clone();
            }
        }

        Ok(story)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).wrap_err_with(|| "Failed to serialize story")
    }

    pub fn with_start(mut self, id: &str) -> Self {
        self.start_passage = Some(id.to_string());
        self
    }

    pub fn insert_passage(&mut self, passage: Passage) {
        self.passages.insert(passage.id.clone(), passage);
    }

    pub fn insert_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn insert_asset(&mut self, asset: Asset) {
        self.assets.insert(asset.id.clone(), asset);
    }

    pub fn passage(&self, id: &str) -> Option<&Passage> {
        self.passages.get(id)
    }

    /// The start passage, if it is set and resolves
    pub fn start_passage(&self) -> Option<&Passage> {
        self.start_passage
            .as_deref()
            .and_then(|id| self.passages.get(id))
    }

    pub fn is_start(&self, id: &str) -> bool {
        self.start_passage.as_deref() == Some(id)
    }

    /// Ids of the passages a passage links to directly, skipping sentinels
    /// and dead links
    pub fn successors<'a>(&'a self, passage: &'a Passage) -> impl Iterator<Item = &'a str> {
        passage
            .choices
            .iter()
            .filter_map(|c| c.target.passage_id())
            .filter(move |id| self.passages.contains_key(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(ChoiceTarget::parse("END"), ChoiceTarget::End);
        assert_eq!(ChoiceTarget::parse("BACK"), ChoiceTarget::Back);
        assert_eq!(ChoiceTarget::parse("RESTART"), ChoiceTarget::Restart);
        assert!(!ChoiceTarget::parse("end").is_sentinel());
        assert_eq!(ChoiceTarget::parse("cave").passage_id(), Some("cave"));
    }

    #[test]
    fn json_fills_ids_from_keys() {
        let input = r#"{
            "startPassage": "start",
            "passages": {
                "start": {
                    "title": "Start",
                    "content": "Gold: $gold",
                    "choices": [ { "id": "c1", "text": "Leave", "target": "END" } ]
                }
            },
            "variables": { "gold": { "type": "number", "initialValue": 5 } },
            "assets": { "bg": { "id": "bg", "name": "Background", "type": "image", "path": "bg.png", "mimeType": "image/png", "size": 1024 } }
        }"#;
        let story = Story::from_json(input).unwrap();
        assert_eq!(story.passages["start"].id, "start");
        assert_eq!(story.passages["start"].choices[0].target, ChoiceTarget::End);
        assert_eq!(story.variables["gold"].name, "gold");
        assert!(story.variables["gold"]
            .initial_value
            .matches(VariableType::Number));
        assert_eq!(story.assets["bg"].size, Some(1024));
        assert_eq!(story.start_passage().map(|p| p.title.as_str()), Some("Start"));
    }

    #[test]
    fn successors_skip_sentinels_and_dead_links() {
        let mut story = Story::new();
        story.insert_passage(
            Passage::new("a", "A", "")
                .with_choice(Choice::new("1", "", "b"))
                .with_choice(Choice::new("2", "", "END"))
                .with_choice(Choice::new("3", "", "nowhere")),
        );
        story.insert_passage(Passage::new("b", "B", ""));
        let a = story.passage("a").unwrap();
        assert_eq!(story.successors(a).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn texts_include_choice_text() {
        let passage = Passage::new("a", "A", "Body")
            .with_choice(Choice::new("1", "Open asset://door", "b").with_condition("$key"))
            .with_on_enter("$seen = true");
        assert_eq!(
            passage.texts().collect::<Vec<_>>(),
            vec!["Body", "Open asset://door", "$key", "$seen = true"]
        );
    }
}
