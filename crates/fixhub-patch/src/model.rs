//! Parsed diff structures

use serde::{Deserialize, Serialize};

/// Path marker git uses for the missing side of a create or delete
pub const NULL_DEVICE: &str = "/dev/null";

/// One line of a hunk body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DiffLine {
    Context(String),
    Addition(String),
    Deletion(String),
}

impl DiffLine {
    /// Classify a raw hunk line by its first character
    ///
    /// Blank lines and unknown prefixes (`\ No newline at end of file`,
    /// stray git metadata) return `None`.
    pub fn from_raw(line: &str) -> Option<Self> {
        let mut chars = line.chars();
        let marker = chars.next()?;
        let text = chars.as_str().to_string();
        match marker {
            ' ' => Some(DiffLine::Context(text)),
            '+' => Some(DiffLine::Addition(text)),
            '-' => Some(DiffLine::Deletion(text)),
            _ => None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            DiffLine::Context(text) | DiffLine::Addition(text) | DiffLine::Deletion(text) => text,
        }
    }
}

/// A contiguous block of changes to one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// 1-based line in the original file; `None` when the header was malformed
    pub original_start: Option<usize>,
    /// 1-based line in the new file; `None` when the header was malformed
    pub new_start: Option<usize>,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    pub fn new(original_start: Option<usize>, new_start: Option<usize>) -> Self {
        Self {
            original_start,
            new_start,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: DiffLine) -> Self {
        self.lines.push(line);
        self
    }
}

/// All hunks touching a single file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Old path without the `a/` prefix; absent or `/dev/null` for a new file
    pub old_path: Option<String>,
    /// New path without the `b/` prefix
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    pub fn new(new_path: impl Into<String>) -> Self {
        Self {
            old_path: None,
            new_path: new_path.into(),
            hunks: Vec::new(),
        }
    }

    pub fn with_old_path(mut self, old_path: impl Into<String>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    pub fn with_hunk(mut self, hunk: Hunk) -> Self {
        self.hunks.push(hunk);
        self
    }

    /// True when there is no prior version of the file
    pub fn is_new_file(&self) -> bool {
        match self.old_path.as_deref() {
            None => true,
            Some(path) => path.is_empty() || path.contains(NULL_DEVICE),
        }
    }

    /// False when the new path names nothing that can be written
    pub fn is_resolvable(&self) -> bool {
        let path = self.new_path.trim();
        !path.is_empty() && !path.contains(NULL_DEVICE)
    }
}

/// Per-file diffs in the order their paths were first registered
///
/// Registering a path twice replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedDiff {
    files: Vec<FileDiff>,
}

impl UnifiedDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `file.new_path`
    pub fn register(&mut self, file: FileDiff) {
        match self.files.iter_mut().find(|f| f.new_path == file.new_path) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    pub fn get(&self, new_path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.new_path == new_path)
    }

    pub fn files(&self) -> &[FileDiff] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.new_path.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IntoIterator for UnifiedDiff {
    type Item = FileDiff;
    type IntoIter = std::vec::IntoIter<FileDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a UnifiedDiff {
    type Item = &'a FileDiff;
    type IntoIter = std::slice::Iter<'a, FileDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
