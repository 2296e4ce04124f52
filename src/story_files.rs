use crate::Story;
use codespan_reporting::files::Files;
use std::ops::Range;

/// Adapts a `Story` for use by codespan, treating the content of each passage
/// as a source file named after the passage
pub struct StoryFiles<'a> {
    /// Passage ids and contents, in story order. The index is the file id.
    sources: Vec<(&'a str, &'a str)>,

    /// Byte offsets at which each line of each source starts
    line_starts: Vec<Vec<usize>>,

    /// All passage ids, for suggestions
    pub passage_names: Vec<String>,
}

impl<'a> StoryFiles<'a> {
    /// Creates a new instance from the given `Story`
    pub fn new(story: &'a Story) -> Self {
        let sources: Vec<(&str, &str)> = story
            .passages
            .iter()
            .map(|(id, passage)| (id.as_str(), passage.content.as_str()))
            .collect();
        let line_starts = sources
            .iter()
            .map(|(_, source)| {
                std::iter::once(0)
                    .chain(source.match_indices('\n').map(|(i, _)| i + 1))
                    .collect()
            })
            .collect();
        let passage_names = story.passages.keys().cloned().collect();

        StoryFiles {
            sources,
            line_starts,
            passage_names,
        }
    }

    /// Looks up the file id of a passage
    pub fn lookup_id(&self, passage_id: &str) -> Option<usize> {
        self.sources.iter().position(|(id, _)| *id == passage_id)
    }

    /// Finds the byte range of the first occurrence of `needle` in a passage
    pub fn find(&self, file_id: usize, needle: &str) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        self.sources.get(file_id).and_then(|(_, source)| {
            source
                .find(needle)
                .map(|start| start..start + needle.len())
        })
    }
}

impl<'a> Files<'a> for StoryFiles<'a> {
    type FileId = usize;
    type Name = &'a str;
    type Source = &'a str;

    fn name(&'a self, id: Self::FileId) -> Option<Self::Name> {
        self.sources.get(id).map(|(name, _)| *name)
    }

    fn source(&'a self, id: Self::FileId) -> Option<Self::Source> {
        self.sources.get(id).map(|(_, source)| *source)
    }

    fn line_index(&'a self, id: Self::FileId, byte_index: usize) -> Option<usize> {
        self.line_starts.get(id).and_then(|starts| {
            starts
                .binary_search(&byte_index)
                .or_else(|idx: usize| -> Result<usize, usize> { Ok(idx - 1) })
                .ok()
        })
    }

    fn line_range(&'a self, id: Self::FileId, line_index: usize) -> Option<Range<usize>> {
        let starts = self.line_starts.get(id)?;
        let source_len = self.sources.get(id)?.1.len();
        let start = *starts.get(line_index)?;
        let end = starts.get(line_index + 1).copied().unwrap_or(source_len);
        Some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Passage;

    #[test]
    fn lines_and_lookup() {
        let mut story = Story::new();
        story.insert_passage(Passage::new("cave", "Cave", "Dark.\nYou hear $noise.\n"));
        let files = StoryFiles::new(&story);

        let id = files.lookup_id("cave").unwrap();
        assert_eq!(files.name(id), Some("cave"));
        let range = files.find(id, "$noise").unwrap();
        assert_eq!(range, 15..21);
        assert_eq!(files.line_index(id, range.start), Some(1));
        assert_eq!(files.line_range(id, 1), Some(6..23));
        assert_eq!(files.lookup_id("hall"), None);
    }
}
