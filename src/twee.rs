//! Conversion of a Twee 3 story parsed by `tweep` into a [`Story`]
//!
//! Passage names become passage ids, `[[...]]` links become choices and the
//! `<<set $x to v>>` (or `(set: $x to v)`) statements of the `StoryInit`
//! passage become declared variables.
//!
//! [`Story`]: ../story/struct.Story.html

use crate::story::{Choice, Passage, Story, Variable, VariableType, VariableValue};
use once_cell::sync::Lazy;
use regex::Regex;

/// Name of the special passage holding variable initialization
pub const STORY_INIT: &str = "StoryInit";

static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());

static SET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:<<set\s+\$([A-Za-z_]\w*)\s+(?:to|=)\s+(.+?)\s*>>)|(?:\(set:\s*\$([A-Za-z_]\w*)\s+to\s+(.+?)\s*\))",
    )
    .unwrap()
});

/// Splits the inside of a link into its text and its target
pub fn parse_link(contents: &str) -> (&str, &str) {
    let (text, target) = if contents.contains('|') {
        let mut iter = contents.splitn(2, '|');
        let text = iter.next().unwrap_or_default();
        (text, iter.next().unwrap_or_default())
    } else if contents.contains("<-") {
        let mut iter = contents.splitn(2, "<-");
        let target = iter.next().unwrap_or_default();
        (iter.next().unwrap_or_default(), target)
    } else if contents.contains("->") {
        let mut iter = contents.splitn(2, "->");
        let text = iter.next().unwrap_or_default();
        (text, iter.next().unwrap_or_default())
    } else {
        (contents, contents)
    };
    (text.trim(), target.trim())
}

/// Builds the choices of a passage from the links in its content
pub fn links_to_choices(content: &str) -> Vec<Choice> {
    LINK.captures_iter(content)
        .filter_map(|c| c.get(1))
        .enumerate()
        .map(|(index, link)| {
            let (text, target) = parse_link(link.as_str());
            Choice::new(&format!("link-{}", index + 1), text, target)
        })
        .collect()
}

fn parse_value(raw: &str) -> Variable {
    let raw = raw.trim();
    let (var_type, value) = match raw {
        "true" => (VariableType::Boolean, VariableValue::Bool(true)),
        "false" => (VariableType::Boolean, VariableValue::Bool(false)),
        _ => match raw.parse::<f64>() {
            Ok(number) => (VariableType::Number, VariableValue::Number(number)),
            Err(_) => {
                let unquoted = raw.trim_matches(|c: char| c == '"' || c == '\'');
                (VariableType::String, VariableValue::Text(unquoted.to_string()))
            }
        },
    };
    Variable::new("", var_type, value)
}

/// Variables initialized by `set` statements, in order of appearance
pub fn declared_variables(content: &str) -> Vec<Variable> {
    SET.captures_iter(content)
        .filter_map(|c| {
            let name = c.get(1).or_else(|| c.get(3))?;
            let value = c.get(2).or_else(|| c.get(4))?;
            let mut variable = parse_value(value.as_str());
            variable.name = name.as_str().to_string();
            Some(variable)
        })
        .collect()
}

/// Converts a parsed Twee story
pub fn from_twee(twee: &tweep::Story) -> Story {
    let mut story = Story::new();
    story.title = twee.title.clone();
    story.start_passage = twee.get_start_passage_name().map(|name| name.to_string());

    for (name, twine) in twee.passages.iter() {
        let content = twine.content.content.as_str();
        if name == STORY_INIT {
            for variable in declared_variables(content) {
                story.insert_variable(variable);
            }
            continue;
        }

        let mut passage = Passage::new(name, name, content);
        passage.tags = twine.header.tags.clone();
        passage.choices = links_to_choices(content);
        story.insert_passage(passage);
    }

    story
}
