//! Handles the actual running of storyscope

use crate::autofix::AutoFixer;
use crate::linter;
use crate::loader;
use crate::report;
use crate::simulator::StorySimulator;
use crate::Config;
use crate::Story;

use color_eyre::Result;
use eyre::{eyre, WrapErr};

use std::fs::File;
use std::io::Write;
use std::path::Path;

use termcolor::{Color, ColorSpec, StandardStream, WriteColor};
use tracing::info;

fn write_file(file_name: &str, contents: &str) -> Result<()> {
    let mut file = File::create(file_name)
        .wrap_err_with(|| format!("Failed to create output file {}", file_name))?;
    writeln!(file, "{}", contents)
        .wrap_err_with(|| format!("Failed to write output file {}", file_name))?;
    Ok(())
}

fn status(stdout: &mut StandardStream, label: &str, message: &str) -> Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "{}: ", label)?;
    stdout.reset()?;
    writeln!(stdout, "{}", message)?;
    Ok(())
}

/// Repairs the fixable issues and writes the repaired story. Returns whether
/// errors remain afterwards.
fn fix(story: &mut Story, config: &Config, stdout: &mut StandardStream) -> Result<bool> {
    let registry = linter::registry(config);
    let issues: Vec<_> = registry
        .validate(story)
        .into_iter()
        .filter(|issue| issue.fixable)
        .collect();

    let fixer = AutoFixer::new();
    status(stdout, "Fixing", &fixer.get_fix_description(&issues))?;
    let result = fixer.fix(story, &issues);
    status(
        stdout,
        "Fixed",
        &format!(
            "{} issue(s), {} failed",
            result.issues_fixed, result.issues_failed
        ),
    )?;
    for failure in &result.failures {
        status(stdout, "Not fixed", &format!("{}: {}", failure.issue_id, failure.reason))?;
    }

    let story_title = story.title.as_deref().unwrap_or("Untitled Story");
    let file_name = config
        .output_file
        .clone()
        .unwrap_or(format!("{}.fixed.json", story_title));
    write_file(&file_name, &story.to_json_pretty()?)?;
    info!("Wrote repaired story to {}", file_name);

    let (_, is_err) = linter::lint(story, &registry, config, stdout)?;
    Ok(is_err)
}

fn simulate(story: &Story, config: &Config, stdout: &mut StandardStream) -> Result<()> {
    let simulator = StorySimulator::new(story, config.seed);
    let result = simulator.simulate(&config.simulation);
    let data = StorySimulator::to_playthrough_data(&result, story);

    status(
        stdout,
        "Simulated",
        &format!("strategy {}, seed {}", result.strategy, result.seed),
    )?;
    report::print_summary(&data, stdout)?;

    if let Some(file_name) = &config.report_file {
        let story_title = story.title.as_deref().unwrap_or("Untitled Story");
        let is_json = Path::new(file_name)
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let contents = if is_json {
            serde_json::to_string_pretty(&serde_json::json!({
                "title": story_title,
                "simulation": result,
                "playthrough": data,
            }))?
        } else {
            report::render_html(&data, story_title)
        };
        write_file(file_name, &contents)?;

        if config.should_open {
            opener::open(file_name)
                .wrap_err_with(|| format!("Failed to open report {}", file_name))?;
        }
    }

    Ok(())
}

/// Runs storyscope
pub fn run() -> Result<()> {
    let config = Config::build()?;

    let mut stdout = StandardStream::stdout(config.use_color);

    let mut story = loader::load_story(&config.inputs)?;
    info!(
        "Loaded {} passage(s), {} variable(s), {} asset(s)",
        story.passages.len(),
        story.variables.len(),
        story.assets.len()
    );

    let registry = linter::registry(&config);
    let (_, mut is_err) = linter::lint(&story, &registry, &config, &mut stdout)?;

    if config.linting {
        return if is_err {
            Err(eyre!("Failed due to previous errors"))
        } else {
            Ok(())
        };
    }

    if config.fix {
        is_err = fix(&mut story, &config, &mut stdout)?;
    }

    if config.simulate {
        simulate(&story, &config, &mut stdout)?;
    }

    // Force reset of color
    stdout.flush()?;

    if is_err {
        Err(eyre!("Failed due to previous errors"))
    } else {
        Ok(())
    }
}
