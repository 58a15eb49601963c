//! File content shared with the agent on resubmission

use fixhub_github::RepositoryFile;

const TRUNCATION_MARKER: &str = "\n...\n[content truncated automatically]";
const UNAVAILABLE: &str = "[Content unavailable or binary file]";

/// Accumulates fetched files into a bounded block of prompt text
///
/// Each file is truncated to `max_file_chars` characters. Once the buffer
/// holds `max_bytes` or more, further files are skipped.
#[derive(Debug, Clone)]
pub struct ContextAppendix {
    buffer: String,
    max_bytes: usize,
    max_file_chars: usize,
}

impl ContextAppendix {
    pub fn new(max_bytes: usize, max_file_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            max_bytes,
            max_file_chars,
        }
    }

    /// Append `files` in order; returns whether anything was added
    pub fn push_files(&mut self, files: &[RepositoryFile]) -> bool {
        let before = self.buffer.len();
        for file in files {
            if self.is_full() {
                tracing::warn!("Shared file budget reached; skipping remaining files");
                break;
            }
            self.push_file(file);
            if self.is_full() {
                tracing::warn!("Shared file budget reached after {}; skipping remaining files", file.path);
                break;
            }
        }
        self.buffer.len() > before
    }

    fn push_file(&mut self, file: &RepositoryFile) {
        self.buffer
            .push_str(&format!("File requested automatically: {}", file.path));
        if !file.git_ref.trim().is_empty() {
            self.buffer.push_str(&format!(" (ref {})", file.git_ref));
        }
        self.buffer.push('\n');

        match file.content.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(content) => {
                self.buffer.push_str("```\n");
                self.buffer.push_str(&truncate(content, self.max_file_chars));
                self.buffer.push_str("\n```");
            }
            None => self.buffer.push_str(UNAVAILABLE),
        }
        self.buffer.push_str("\n\n");
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_bytes
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

/// First `max_chars` characters plus a marker when anything was cut
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}
