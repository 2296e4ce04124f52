//! Loading of stories from disk
//!
//! A single `.json` input is read as a story document. Anything else is
//! handed to `tweep` as Twee 3 file(s)/director(y/ies) and converted.

use crate::twee;
use crate::Story;
use color_eyre::Result;
use eyre::{eyre, WrapErr};
use std::path::Path;
use tracing::debug;

fn is_json(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Loads the story from the given inputs
pub fn load_story(inputs: &[String]) -> Result<Story> {
    if let [single] = inputs {
        if is_json(single) {
            let json = std::fs::read_to_string(single)
                .wrap_err_with(|| format!("Failed to read story file {}", single))?;
            return Story::from_json(&json)
                .wrap_err_with(|| format!("Failed to load story file {}", single));
        }
    }

    let (story_result, warnings) = tweep::Story::from_paths(inputs).take();
    for warning in &warnings {
        debug!("tweep {}: {}", warning.get_name(), warning);
    }

    match story_result {
        Ok(twee_story) => Ok(twee::from_twee(&twee_story)),
        Err(e) => {
            let errors: Vec<String> = e.error_list.errors.iter().map(|e| e.to_string()).collect();
            Err(eyre!("Failed to parse Twee input:\n{}", errors.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_detection() {
        assert!(is_json("story.json"));
        assert!(is_json("dir/Story.JSON"));
        assert!(!is_json("story.twee"));
        assert!(!is_json("stories"));
    }

    #[test]
    fn missing_json_file() {
        let err = load_story(&["does/not/exist.json".to_string()]).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
