use crate::simulator::{SimulationOptions, Strategy};
use crate::validator::Limits;
use clap::{crate_authors, crate_description, crate_name, crate_version};
use clap::{App, Arg, ArgMatches};
use color_eyre::Result;
use eyre::eyre;
use eyre::WrapErr;
use json_comments::StripComments;
use serde::Deserialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use termcolor::ColorChoice;

const DEFAULT_CONFIG: &str = r#"// This file defines the configuration for storyscope
// It is mostly standard JSON, but supports //, /**/, and # style comments.
{
  "validators": {
    // Validators whose issues are ignored ("allow")
    "allow": [],
    // Validators whose issues are treated as errors ("deny")
    "deny": [],
    // Validators that are not run at all
    "disable": []
  },
  "limits": {
    // Assets larger than this many bytes are reported
    "large_asset_bytes": 10485760,
    // Passages with more words than this are reported
    "long_passage_words": 1000
  },
  "simulation": {
    "max_simulations": 100,
    "max_depth": 100,
    // One of random, breadth-first, depth-first, least-visited
    "strategy": "random"
    // Uncomment to make every run reproducible
    // , "seed": 42
  }
}"#;

/// Represents a unified configuration for a run of storyscope.
///
/// Compiled from the configuration file and command-line arguments given
pub struct Config {
    /// True if this is a validation-only run
    pub linting: bool,

    /// Input file(s)/director(y/ies)
    pub inputs: Vec<String>,

    /// True if fixable issues should be repaired
    pub fix: bool,

    /// Where to write the repaired story, if given
    pub output_file: Option<String>,

    /// Whether to simulate playthroughs
    pub simulate: bool,

    /// Options for the simulation
    pub simulation: SimulationOptions,

    /// Seed for the simulation. Random if not given.
    pub seed: Option<u64>,

    /// File to write the playthrough report to (HTML, or JSON for `.json`)
    pub report_file: Option<String>,

    /// True if the report should be sent to `opener`
    pub should_open: bool,

    /// List of allowed (ignored) validator names
    pub allowed: Vec<String>,

    /// List of denied (treated as errors) validator names
    pub denied: Vec<String>,

    /// List of validators that are not run
    pub disabled: Vec<String>,

    /// Thresholds for the built-in validators
    pub limits: Limits,

    /// Whether or not to use color output
    pub use_color: ColorChoice,

    /// If true, use compact output format
    pub compact: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            linting: false,
            inputs: Vec::new(),
            fix: false,
            output_file: None,
            simulate: false,
            simulation: SimulationOptions::default(),
            seed: None,
            report_file: None,
            should_open: false,
            allowed: Vec::new(),
            denied: Vec::new(),
            disabled: Vec::new(),
            limits: Limits::default(),
            use_color: ColorChoice::Never,
            compact: false,
        }
    }
}

impl Config {
    /// Parses the [`CliConfig`], loads the [`ConfigFile`], and produces a
    /// unified `Config`
    ///
    /// [`CliConfig`]: struct.CliConfig.html
    /// [`ConfigFile`]: struct.ConfigFile.html
    pub fn build() -> Result<Self> {
        let cli_config = CliConfig::from_args()?;
        let config_file = match &cli_config.config_file {
            Some(path) => ConfigFile::load_from(Path::new(path))?,
            None => ConfigFile::load()?,
        };
        Ok(Config::layer(config_file, cli_config))
    }

    /// Creates a unified `Config` from the given [`ConfigFile`] and
    /// [`CliConfig`]. Command-line values win over the file's.
    ///
    /// [`CliConfig`]: struct.CliConfig.html
    /// [`ConfigFile`]: struct.ConfigFile.html
    pub fn layer(config_file: ConfigFile, cli_config: CliConfig) -> Self {
        let mut allowed = cli_config.allowed;
        allowed.extend(config_file.validators.allow);

        let mut denied = cli_config.denied;
        denied.extend(config_file.validators.deny);

        let mut disabled = cli_config.disabled;
        disabled.extend(config_file.validators.disable);

        let file_sim = config_file.simulation;
        let defaults = SimulationOptions::default();
        let simulation = SimulationOptions {
            max_simulations: cli_config
                .simulations
                .or(file_sim.max_simulations)
                .unwrap_or(defaults.max_simulations),
            max_depth: cli_config
                .max_depth
                .or(file_sim.max_depth)
                .unwrap_or(defaults.max_depth),
            strategy: cli_config
                .strategy
                .or(file_sim.strategy)
                .unwrap_or(defaults.strategy),
        };

        Config {
            linting: cli_config.linting,
            inputs: cli_config.inputs,
            fix: cli_config.fix,
            output_file: cli_config.output_file,
            simulate: cli_config.simulations.is_some() || cli_config.report_file.is_some(),
            simulation,
            seed: cli_config.seed.or(file_sim.seed),
            report_file: cli_config.report_file,
            should_open: cli_config.should_open,
            allowed,
            denied,
            disabled,
            limits: config_file.limits,
            use_color: cli_config.use_color,
            compact: cli_config.compact,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidatorsConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub disable: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_simulations: Option<usize>,
    pub max_depth: Option<usize>,
    pub strategy: Option<Strategy>,
    pub seed: Option<u64>,
}

/// Settings parsed from the storyscope config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub validators: ValidatorsConfig,
    pub limits: Limits,
    pub simulation: SimulationConfig,
}

impl ConfigFile {
    /// Loads the config file from the user's config directory
    ///
    /// If the config file does not exist, it will try to create a default one
    /// in the config directory.
    pub fn load() -> Result<Self> {
        let config_path =
            ConfigFile::default_path().ok_or_else(|| eyre!("Error getting config directory"))?;

        if !config_path.exists() {
            let prefix = config_path
                .parent()
                .ok_or_else(|| eyre!("Error getting parent of {:?}", config_path))?;
            std::fs::create_dir_all(prefix)
                .wrap_err_with(|| format!("Error creating config directory: {:?}", prefix))?;
            let mut config_file = File::create(&config_path)
                .wrap_err_with(|| format!("Error creating config file: {:?}", config_path))?;
            config_file.write_all(DEFAULT_CONFIG.as_bytes())?;
            return ConfigFile::parse(DEFAULT_CONFIG);
        }

        ConfigFile::load_from(&config_path)
    }

    /// Loads the config file at the given path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Error reading config file: {:?}", path))?;
        ConfigFile::parse(&contents).wrap_err_with(|| format!("Error parsing {:?}", path))
    }

    /// Parses config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        // Strip the comments from the input (use `as_bytes()` to get a `Read`).
        let stripped = StripComments::new(contents.as_bytes());
        let config_file: ConfigFile = serde_json::from_reader(stripped)?;
        Ok(config_file)
    }

    /// Path of the default config file, whether or not it exists
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("storyscope/config.json"))
    }
}

/// The command line options supplied by the user
pub struct CliConfig {
    /// If true, validate then exit
    pub linting: bool,

    /// Input files or directories to read the story from
    pub inputs: Vec<String>,

    /// Explicit config file to use instead of the default one
    pub config_file: Option<String>,

    /// If true, repair fixable issues
    pub fix: bool,

    /// Where to write the repaired story
    pub output_file: Option<String>,

    /// Number of playthroughs to simulate, if simulating
    pub simulations: Option<usize>,

    pub max_depth: Option<usize>,

    pub strategy: Option<Strategy>,

    pub seed: Option<u64>,

    /// The report file to write
    pub report_file: Option<String>,

    /// If true, send the report to `opener` for the user
    pub should_open: bool,

    /// List of allowed (ignored) validators, by name
    pub allowed: Vec<String>,

    /// List of denied (treated as errors) validators, by name
    pub denied: Vec<String>,

    /// List of validators not to run, by name
    pub disabled: Vec<String>,

    /// Controls color output
    pub use_color: ColorChoice,

    /// If true, use compact issue output
    pub compact: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            linting: false,
            inputs: Vec::new(),
            config_file: None,
            fix: false,
            output_file: None,
            simulations: None,
            max_depth: None,
            strategy: None,
            seed: None,
            report_file: None,
            should_open: false,
            allowed: Vec::new(),
            denied: Vec::new(),
            disabled: Vec::new(),
            use_color: ColorChoice::Never,
            compact: false,
        }
    }
}

fn parse_value<T>(m: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    m.value_of(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| eyre!("Invalid value \"{}\" for --{}: {}", raw, name, e))
        })
        .transpose()
}

fn values(m: &ArgMatches, name: &str) -> Vec<String> {
    m.values_of(name)
        .unwrap_or_default()
        .map(|s| s.to_string())
        .collect()
}

impl CliConfig {
    /// Parses the command line arguments
    pub fn from_args() -> Result<Self> {
        #[allow(deprecated, unknown_lints, dangerous_implicit_autorefs)]
        let m = App::new(crate_name!())
            .about(crate_description!())
            .author(crate_authors!("\n"))
            .version(crate_version!())
            .arg(
                Arg::with_name("allow")
                    .help("Specifies validators whose issues are ignored. Overrides deny.")
                    .short("a")
                    .long("allow")
                    .takes_value(true)
                    .multiple(true),
            )
            .arg(
                Arg::with_name("color")
                    .help("Turns on colored output")
                    .long("color")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("compact")
                    .help("Turns on compact issue output")
                    .long("compact"),
            )
            .arg(
                Arg::with_name("config")
                    .help("Uses the given config file instead of the default one")
                    .short("c")
                    .long("config")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("deny")
                    .help("Specifies validators whose issues are treated as errors")
                    .short("D")
                    .long("deny")
                    .takes_value(true)
                    .multiple(true),
            )
            .arg(
                Arg::with_name("disable")
                    .help("Specifies validators not to run")
                    .short("d")
                    .long("disable")
                    .takes_value(true)
                    .multiple(true),
            )
            .arg(
                Arg::with_name("fix")
                    .help("Repairs fixable issues and writes the repaired story")
                    .long("fix")
                    .conflicts_with("lint"),
            )
            .arg(
                Arg::with_name("lint")
                    .help("Runs the validators without fixing or simulating")
                    .short("L")
                    .long("lint"),
            )
            .arg(
                Arg::with_name("max-depth")
                    .help("Sets the maximum number of passages in a simulated playthrough")
                    .long("max-depth")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("open")
                    .help("Opens the report in a web browser")
                    .long("open")
                    .requires("report"),
            )
            .arg(
                Arg::with_name("output")
                    .help("Sets the file for the repaired story (default: <Story Title>.fixed.json)")
                    .short("o")
                    .long("output")
                    .takes_value(true)
                    .requires("fix"),
            )
            .arg(
                Arg::with_name("report")
                    .help("Writes a playthrough report (HTML, or JSON for .json files)")
                    .short("r")
                    .long("report")
                    .takes_value(true)
                    .conflicts_with("lint"),
            )
            .arg(
                Arg::with_name("seed")
                    .help("Sets the simulation seed for reproducible playthroughs")
                    .long("seed")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name("simulate")
                    .help("Simulates up to the given number of playthroughs")
                    .short("s")
                    .long("simulate")
                    .takes_value(true)
                    .conflicts_with("lint"),
            )
            .arg(
                Arg::with_name("strategy")
                    .help("Sets how simulated players choose")
                    .long("strategy")
                    .takes_value(true)
                    .possible_values(&["random", "breadth-first", "depth-first", "least-visited"]),
            )
            .arg(
                Arg::with_name("INPUT")
                    .help("Sets the input story (.json) or Twee file(s)/director(y/ies)")
                    .required(true)
                    .multiple(true)
                    .index(1),
            )
            .get_matches();

        let linting = m.is_present("lint");
        let inputs = values(&m, "INPUT");
        let config_file = m.value_of("config").map(|s| s.to_string());
        let fix = m.is_present("fix");
        let output_file = m.value_of("output").map(|s| s.to_string());
        let simulations = parse_value(&m, "simulate")?;
        let max_depth = parse_value(&m, "max-depth")?;
        let strategy = parse_value(&m, "strategy")?;
        let seed = parse_value(&m, "seed")?;
        let report_file = m.value_of("report").map(|s| s.to_string());
        let should_open = m.is_present("open");
        let allowed = values(&m, "allow");
        let denied = values(&m, "deny");
        let disabled = values(&m, "disable");
        let use_color = match m.value_of("color").unwrap_or("auto") {
            "always" => ColorChoice::Always,
            "ansi" => ColorChoice::AlwaysAnsi,
            "auto" => {
                if atty::is(atty::Stream::Stdout) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
            _ => ColorChoice::Never,
        };
        let compact = m.is_present("compact");

        Ok(CliConfig {
            linting,
            inputs,
            config_file,
            fix,
            output_file,
            simulations,
            max_depth,
            strategy,
            seed,
            report_file,
            should_open,
            allowed,
            denied,
            disabled,
            use_color,
            compact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config_file = ConfigFile::parse(DEFAULT_CONFIG).unwrap();
        assert!(config_file.validators.allow.is_empty());
        assert_eq!(config_file.limits, Limits::default());
        assert_eq!(config_file.simulation.strategy, Some(Strategy::Random));
        assert_eq!(config_file.simulation.seed, None);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config_file = ConfigFile::parse(r#"{ "limits": { "long_passage_words": 50 } }"#).unwrap();
        assert_eq!(config_file.limits.long_passage_words, 50);
        assert_eq!(
            config_file.limits.large_asset_bytes,
            Limits::default().large_asset_bytes
        );
    }

    #[test]
    fn command_line_wins() {
        let config_file = ConfigFile::parse(
            r#"{
                // team defaults
                "validators": { "allow": ["LongPassages"], "disable": ["MissingTitles"] },
                "simulation": { "max_simulations": 500, "strategy": "least-visited", "seed": 7 }
            }"#,
        )
        .unwrap();
        let cli_config = CliConfig {
            inputs: vec!["story.json".to_string()],
            allowed: vec!["DeadEndPassages".to_string()],
            simulations: Some(20),
            seed: Some(42),
            use_color: ColorChoice::Never,
            ..CliConfig::default()
        };

        let config = Config::layer(config_file, cli_config);
        assert_eq!(
            config.allowed,
            vec!["DeadEndPassages".to_string(), "LongPassages".to_string()]
        );
        assert_eq!(config.disabled, vec!["MissingTitles".to_string()]);
        assert!(config.simulate);
        assert_eq!(config.simulation.max_simulations, 20);
        assert_eq!(config.simulation.strategy, Strategy::LeastVisited);
        assert_eq!(config.simulation.max_depth, 100);
        assert_eq!(config.seed, Some(42));
    }
}
