//! Storyscope is an analysis engine for branching interactive fiction
//!
//! A story is a graph of passages joined by choices, plus the variables and
//! assets those passages use. Storyscope can:
//!
//! - validate a story with a registry of pluggable validators
//! - repair the mechanically fixable issues with the [`AutoFixer`]
//! - simulate playthroughs with the [`StorySimulator`] and report coverage
//!   and narrative-design metrics
//!
//! Stories are read from JSON documents or from Twee 3 sources.
//!
//! [`AutoFixer`]: autofix/struct.AutoFixer.html
//! [`StorySimulator`]: simulator/struct.StorySimulator.html

mod config;
pub use config::CliConfig;
pub use config::Config;
pub use config::ConfigFile;

pub mod story;
pub use story::{Asset, Choice, ChoiceTarget, Passage, Story, Variable};

pub mod references;

pub mod issue;
pub use issue::Issue;

mod story_files;
pub use story_files::StoryFiles;

pub mod validator;

pub mod autofix;

pub mod simulator;

pub mod report;

pub mod twee;

pub mod loader;

pub mod linter;

pub mod storyscope;
