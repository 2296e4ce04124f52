//! Validation rules and the registry that runs them
//!
//! A [`Validator`] inspects a read-only [`Story`] and reports [`Issue`]s. The
//! [`ValidatorRegistry`] keeps validators in registration order, skips the
//! disabled ones and isolates failing validators from the rest.
//!
//! [`Validator`]: trait.Validator.html
//! [`Story`]: ../story/struct.Story.html
//! [`Issue`]: ../issue/struct.Issue.html
//! [`ValidatorRegistry`]: struct.ValidatorRegistry.html

use crate::issue::{Category, Issue};
use crate::Story;
use color_eyre::Result;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

mod content;
mod links;
mod structure;
mod variables;

pub use content::{LongPassagesValidator, MissingTitlesValidator, ValidateAssetsValidator};
pub use links::{DeadLinksValidator, DuplicateChoicesValidator, EmptyChoiceTextValidator};
pub use structure::{
    DeadEndPassagesValidator, EmptyPassagesValidator, MissingStartPassageValidator,
    UnreachablePassagesValidator,
};
pub use variables::{
    UndefinedVariablesValidator, UnusedVariablesValidator, VariableTypeMismatchValidator,
};

/// A named, categorized rule checked against a story
pub trait Validator {
    /// Unique, stable name of the rule
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    /// Checks the story. Content that cannot be understood yields no issue
    /// rather than an error.
    fn validate(&self, story: &Story) -> Result<Vec<Issue>>;
}

/// Thresholds used by the built-in validators
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Assets larger than this many bytes are reported
    pub large_asset_bytes: u64,

    /// Passages with more words than this are reported
    pub long_passage_words: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            large_asset_bytes: 10 * 1024 * 1024,
            long_passage_words: 1000,
        }
    }
}

/// Ordered collection of validators with unique names
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: Vec<Box<dyn Validator>>,
    disabled: BTreeSet<String>,
}

impl ValidatorRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in validator
    pub fn with_defaults(limits: &Limits) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MissingStartPassageValidator));
        registry.register(Box::new(UnreachablePassagesValidator));
        registry.register(Box::new(EmptyPassagesValidator));
        registry.register(Box::new(DeadEndPassagesValidator));
        registry.register(Box::new(DeadLinksValidator));
        registry.register(Box::new(EmptyChoiceTextValidator));
        registry.register(Box::new(DuplicateChoicesValidator));
        registry.register(Box::new(UndefinedVariablesValidator));
        registry.register(Box::new(UnusedVariablesValidator));
        registry.register(Box::new(VariableTypeMismatchValidator));
        registry.register(Box::new(ValidateAssetsValidator::new(
            limits.large_asset_bytes,
        )));
        registry.register(Box::new(MissingTitlesValidator));
        registry.register(Box::new(LongPassagesValidator::new(
            limits.long_passage_words,
        )));
        registry
    }

    /// Adds a validator. A validator whose name is already registered is
    /// ignored, and `false` is returned.
    pub fn register(&mut self, validator: Box<dyn Validator>) -> bool {
        if self.get(validator.name()).is_some() {
            warn!(
                "Validator {} is already registered; ignoring duplicate",
                validator.name()
            );
            return false;
        }
        self.validators.push(validator);
        true
    }

    /// All registered validators, in registration order
    pub fn validators(&self) -> impl Iterator<Item = &dyn Validator> {
        self.validators.iter().map(|v| v.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Validator> {
        self.validators().find(|v| v.name() == name)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Enables or disables a validator by name. Unknown names are remembered,
    /// so a validator registered later is affected too.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.disabled.remove(name);
        } else {
            self.disabled.insert(name.to_string());
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    /// Runs every enabled validator against the story and concatenates their
    /// issues in registration order.
    ///
    /// A validator that fails or panics contributes nothing; the others still
    /// run.
    pub fn validate(&self, story: &Story) -> Vec<Issue> {
        let mut issues = Vec::new();

        for validator in self.validators() {
            let name = validator.name();
            if !self.is_enabled(name) {
                debug!("Skipping disabled validator {}", name);
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| validator.validate(story)));
            match outcome {
                Ok(Ok(mut found)) => {
                    debug!("Validator {} reported {} issue(s)", name, found.len());
                    for issue in found.iter_mut() {
                        issue.rule = name.to_string();
                    }
                    issues.append(&mut found);
                }
                Ok(Err(err)) => {
                    warn!("Validator {} failed, discarding its results: {}", name, err);
                }
                Err(_) => {
                    warn!("Validator {} panicked, discarding its results", name);
                }
            }
        }

        issues
    }
}
