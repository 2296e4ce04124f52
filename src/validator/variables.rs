//! Variable declaration and usage rules
use super::Validator;
use crate::issue::{Category, Issue, Severity};
use crate::references;
use crate::Story;
use color_eyre::Result;
use std::collections::BTreeMap;

/// Reports variables referenced without being declared, once per name
pub struct UndefinedVariablesValidator;

impl Validator for UndefinedVariablesValidator {
    fn name(&self) -> &str {
        "UndefinedVariables"
    }

    fn category(&self) -> Category {
        Category::Variables
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        // name -> passages using it, in story order
        let mut undefined: BTreeMap<String, Vec<&str>> = BTreeMap::new();

        for passage in story.passages.values() {
            for name in passage.texts().flat_map(references::variable_references) {
                if story.variables.contains_key(&name) {
                    continue;
                }
                let passages = undefined.entry(name).or_default();
                if !passages.contains(&passage.id.as_str()) {
                    passages.push(passage.id.as_str());
                }
            }
        }

        Ok(undefined
            .into_iter()
            .map(|(name, passages)| {
                let message = if passages.len() > 1 {
                    format!(
                        "Variable \"{}\" is used in {} passages but never declared",
                        name,
                        passages.len()
                    )
                } else {
                    format!("Variable \"{}\" is used but never declared", name)
                };
                let mut issue = Issue::new(
                    format!("undefined_var_{}", name),
                    Severity::Error,
                    Category::Variables,
                    message,
                )
                .with_variable(&name)
                .with_snippet(&name)
                .fixable();
                if let Some(first) = passages.first() {
                    issue = issue.with_passage(first);
                }
                issue
            })
            .collect())
    }
}

/// Reports declared variables that nothing references
pub struct UnusedVariablesValidator;

impl Validator for UnusedVariablesValidator {
    fn name(&self) -> &str {
        "UnusedVariables"
    }

    fn category(&self) -> Category {
        Category::Variables
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        let used = references::referenced_variables(story);

        Ok(story
            .variables
            .keys()
            .filter(|name| !used.contains(*name))
            .map(|name| {
                Issue::new(
                    format!("unused_var_{}", name),
                    Severity::Info,
                    Category::Variables,
                    format!("Variable \"{}\" is declared but never used", name),
                )
                .with_variable(name)
                .fixable()
            })
            .collect())
    }
}

/// Reports variables whose initial value does not match their declared type
pub struct VariableTypeMismatchValidator;

impl Validator for VariableTypeMismatchValidator {
    fn name(&self) -> &str {
        "VariableTypeMismatch"
    }

    fn category(&self) -> Category {
        Category::Variables
    }

    fn validate(&self, story: &Story) -> Result<Vec<Issue>> {
        Ok(story
            .variables
            .values()
            .filter(|v| !v.initial_value.matches(v.var_type))
            .map(|v| {
                Issue::new(
                    format!("var_type_mismatch_{}", v.name),
                    Severity::Error,
                    Category::Variables,
                    format!(
                        "Variable \"{}\" is declared as {} but starts as {:?}",
                        v.name, v.var_type, v.initial_value
                    ),
                )
                .with_variable(&v.name)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{Choice, Passage, Variable, VariableType, VariableValue};

    fn story() -> Story {
        let mut story = Story::new().with_start("start");
        story.insert_passage(
            Passage::new("start", "Start", "You have $gold coins, {{name}}.")
                .with_choice(Choice::new("c1", "Buy", "shop").with_condition("$gold >= $price")),
        );
        story.insert_passage(
            Passage::new("shop", "Shop", "Price: $price").with_on_enter("$visited_shop = true"),
        );
        story.insert_variable(Variable::new(
            "gold",
            VariableType::Number,
            VariableValue::Number(10.0),
        ));
        story.insert_variable(Variable::new(
            "hp",
            VariableType::Number,
            VariableValue::Text("full".to_string()),
        ));
        story
    }

    #[test]
    fn undefined_variables_are_deduplicated() {
        let issues = UndefinedVariablesValidator.validate(&story()).unwrap();
        let names: Vec<&str> = issues
            .iter()
            .filter_map(|i| i.variable_name.as_deref())
            .collect();
        assert_eq!(names, vec!["name", "price", "visited_shop"]);

        let price = &issues[1];
        assert_eq!(price.id, "undefined_var_price");
        assert!(price.fixable);
        assert!(price.message.contains("2 passages"));
        assert_eq!(price.passage_id.as_deref(), Some("shop"));
    }

    #[test]
    fn unused_variables() {
        let issues = UnusedVariablesValidator.validate(&story()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "unused_var_hp");
        assert_eq!(issues[0].severity, Severity::Info);
        assert!(issues[0].fixable);
    }

    #[test]
    fn choice_text_counts_as_a_use() {
        let mut story = story();
        story.insert_passage(
            Passage::new("shop", "Shop", "Price: $price")
                .with_choice(Choice::new("c1", "Wave {{mood}}ly", "start")),
        );
        story.insert_variable(Variable::with_default("mood", VariableType::String));

        let issues = UnusedVariablesValidator.validate(&story).unwrap();
        assert!(issues.iter().all(|i| i.id != "unused_var_mood"));
        assert!(UndefinedVariablesValidator
            .validate(&story)
            .unwrap()
            .iter()
            .all(|i| i.id != "undefined_var_mood"));
    }

    #[test]
    fn type_mismatch() {
        let issues = VariableTypeMismatchValidator.validate(&story()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].variable_name.as_deref(), Some("hp"));
    }
}
