use std::path::Path;

use tracing::debug;

/// Ordered keyword list used for matching and highlighting. Entries are
/// trimmed, blanks are dropped, and later duplicates are ignored so the
/// first occurrence keeps its position. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = Vec::new();
        for entry in raw {
            let trimmed = entry.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            if keywords.iter().any(|k| k == trimmed) {
                continue;
            }
            keywords.push(trimmed.to_string());
        }
        Self { keywords }
    }

    /// Reads one keyword per line; blank lines are skipped.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let set = Self::new(content.lines());
        debug!("Loaded {} keywords from {}", set.len(), path.display());
        Ok(set)
    }

    /// Appends another set, keeping this set's entries first and still
    /// ignoring duplicates.
    pub fn merge(self, other: KeywordSet) -> Self {
        Self::new(self.keywords.into_iter().chain(other.keywords))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.keywords.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }
}
