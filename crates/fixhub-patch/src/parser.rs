//! Best-effort unified-diff parser

use crate::model::{DiffLine, FileDiff, Hunk, UnifiedDiff};

const FILE_HEADER: &str = "diff --git";
const OLD_FILE_MARKER: &str = "--- ";
const NEW_FILE_MARKER: &str = "+++ ";
const HUNK_HEADER: &str = "@@";

/// A file section that has not been closed yet
#[derive(Debug, Default)]
struct PendingFile {
    old_path: Option<String>,
    new_path: Option<String>,
    hunks: Vec<Hunk>,
}

impl PendingFile {
    fn is_registered_with_hunks(&self) -> bool {
        self.new_path.is_some() && !self.hunks.is_empty()
    }
}

/// Lines still owed to the open hunk according to its `@@` counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkBudget {
    old: usize,
    new: usize,
}

impl HunkBudget {
    fn consume(&mut self, line: &DiffLine) {
        match line {
            DiffLine::Context(_) => {
                self.old = self.old.saturating_sub(1);
                self.new = self.new.saturating_sub(1);
            }
            DiffLine::Deletion(_) => self.old = self.old.saturating_sub(1),
            DiffLine::Addition(_) => self.new = self.new.saturating_sub(1),
        }
    }
}

#[derive(Debug, Default)]
struct Parser {
    result: UnifiedDiff,
    current: Option<PendingFile>,
    budget: Option<HunkBudget>,
    awaiting_new_path: bool,
}

impl Parser {
    fn feed(&mut self, line: &str, next: Option<&str>) {
        let awaiting_new_path = std::mem::take(&mut self.awaiting_new_path);

        if line.starts_with(FILE_HEADER) {
            self.start_file();
        } else if line.starts_with(HUNK_HEADER) {
            if let Some(file) = self.current.as_mut() {
                let (hunk, budget) = parse_hunk_header(line);
                file.hunks.push(hunk);
                self.budget = budget;
            }
        } else if self.is_hunk_content(line, next, awaiting_new_path) {
            self.push_hunk_line(line);
        } else if let Some(rest) = line.strip_prefix(OLD_FILE_MARKER) {
            // A second `---` after hunks means the author skipped the `diff --git` line
            let needs_new = self
                .current
                .as_ref()
                .map_or(true, PendingFile::is_registered_with_hunks);
            if needs_new {
                self.start_file();
            }
            if let Some(file) = self.current.as_mut() {
                file.old_path = Some(clean_path(rest, "a/"));
            }
            self.awaiting_new_path = true;
        } else if let Some(rest) = line.strip_prefix(NEW_FILE_MARKER) {
            let file = self.current.get_or_insert_with(PendingFile::default);
            file.new_path = Some(clean_path(rest, "b/"));
        } else {
            self.push_hunk_line(line);
        }
    }

    fn has_open_hunk(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|file| !file.hunks.is_empty())
    }

    /// Decide whether a `--- `/`+++ ` line inside a hunk is a removed or added line
    ///
    /// Lines such as `-- comment` turn into `--- comment` once removed. The
    /// `@@` counts settle it when they still expect lines of that kind.
    /// Otherwise `---` is a header only when `+++` follows, and `+++` is a
    /// header only right after a `---` header.
    fn is_hunk_content(&self, line: &str, next: Option<&str>, awaiting_new_path: bool) -> bool {
        if !self.has_open_hunk() {
            return false;
        }
        if line.starts_with(OLD_FILE_MARKER) {
            if self.budget.is_some_and(|budget| budget.old > 0) {
                return true;
            }
            return !next.is_some_and(|next| next.starts_with(NEW_FILE_MARKER));
        }
        if line.starts_with(NEW_FILE_MARKER) {
            return !awaiting_new_path;
        }
        false
    }

    fn push_hunk_line(&mut self, line: &str) {
        let Some(hunk) = self
            .current
            .as_mut()
            .and_then(|file| file.hunks.last_mut())
        else {
            return;
        };
        if let Some(diff_line) = DiffLine::from_raw(line) {
            if let Some(budget) = self.budget.as_mut() {
                budget.consume(&diff_line);
            }
            hunk.lines.push(diff_line);
        }
    }

    fn start_file(&mut self) {
        self.finish_file();
        self.current = Some(PendingFile::default());
        self.budget = None;
    }

    fn finish_file(&mut self) {
        let Some(pending) = self.current.take() else {
            return;
        };

        match pending.new_path {
            Some(new_path) => self.result.register(FileDiff {
                old_path: pending.old_path,
                new_path,
                hunks: pending.hunks,
            }),
            None => tracing::debug!(
                hunks = pending.hunks.len(),
                "Dropping file section without a +++ header"
            ),
        }
    }

    fn finish(mut self) -> UnifiedDiff {
        self.finish_file();
        self.result
    }
}

/// Parse unified-diff text into per-file hunks
///
/// Never fails. Lines before the first file header are discarded, empty input
/// yields an empty diff, and a hunk header whose ranges cannot be read keeps
/// the hunk with `None` starts.
pub fn parse(diff_text: &str) -> UnifiedDiff {
    let mut parser = Parser::default();
    let mut lines = diff_text.split('\n').peekable();
    while let Some(line) = lines.next() {
        parser.feed(line, lines.peek().copied());
    }
    let diff = parser.finish();
    tracing::debug!(files = diff.len(), "Parsed unified diff");
    diff
}

/// Strip git's side prefix and any tab-separated timestamp
fn clean_path(raw: &str, prefix: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

/// Read `@@ -a,b +c,d @@`, tolerating anything malformed
///
/// The budget is `None` unless both counts parse. An omitted count means one line.
fn parse_hunk_header(line: &str) -> (Hunk, Option<HunkBudget>) {
    let mut tokens = line.split_whitespace().skip(1);
    let original = tokens.next().and_then(|t| parse_range(t, '-'));
    let new = tokens.next().and_then(|t| parse_range(t, '+'));
    if original.is_none() || new.is_none() {
        tracing::debug!(header = line, "Malformed hunk header");
    }

    let budget = match (original, new) {
        (Some((_, Some(old))), Some((_, Some(new)))) => Some(HunkBudget { old, new }),
        _ => None,
    };
    let hunk = Hunk::new(original.map(|(start, _)| start), new.map(|(start, _)| start));
    (hunk, budget)
}

fn parse_range(token: &str, sign: char) -> Option<(usize, Option<usize>)> {
    let mut parts = token.strip_prefix(sign)?.split(',');
    let start = parts.next()?.parse().ok()?;
    let count = match parts.next() {
        Some(count) => count.parse().ok(),
        None => Some(1),
    };
    Some((start, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/parser.ts b/src/parser.ts
index 83db48f..bf269f4 100644
--- a/src/parser.ts
+++ b/src/parser.ts
@@ -10,3 +10,3 @@ export function parse() {
   const start = 0;
-  for (let i = 0; i <= items.length; i++) {
+  for (let i = 0; i < items.length; i++) {
     visit(items[i]);
diff --git a/docs/NOTES.md b/docs/NOTES.md
new file mode 100644
--- /dev/null
+++ b/docs/NOTES.md
@@ -0,0 +1,2 @@
+# Notes
+Loop bounds fixed.
";

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
    }

    #[test]
    fn test_parse_two_files() {
        let diff = parse(TWO_FILES);
        assert_eq!(
            diff.paths().collect::<Vec<_>>(),
            vec!["src/parser.ts", "docs/NOTES.md"]
        );

        let parser = diff.get("src/parser.ts").unwrap();
        assert_eq!(parser.old_path.as_deref(), Some("src/parser.ts"));
        assert!(!parser.is_new_file());
        assert_eq!(parser.hunks.len(), 1);
        assert_eq!(parser.hunks[0].original_start, Some(10));
        assert_eq!(parser.hunks[0].new_start, Some(10));
        assert_eq!(parser.hunks[0].lines.len(), 4);
        assert_eq!(
            parser.hunks[0].lines[1],
            DiffLine::Deletion("  for (let i = 0; i <= items.length; i++) {".to_string())
        );

        let notes = diff.get("docs/NOTES.md").unwrap();
        assert!(notes.is_new_file());
        assert_eq!(notes.hunks[0].original_start, Some(0));
        assert_eq!(notes.hunks[0].lines.len(), 2);
    }

    #[test]
    fn test_preamble_is_discarded() {
        let diff = parse(
            "Here is the fix:\n+not a hunk line\n--- a/x.txt\n+++ b/x.txt\n@@ -1 +1 @@\n-a\n+b\n",
        );
        assert_eq!(diff.len(), 1);
        let file = diff.get("x.txt").unwrap();
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].original_start, Some(1));
    }

    #[test]
    fn test_malformed_hunk_header_keeps_hunk() {
        let diff = parse("diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -abc +1,2 @@\n+line\n@@\n+other\n");
        let file = diff.get("x").unwrap();
        assert_eq!(file.hunks.len(), 2);
        assert_eq!(file.hunks[0].original_start, None);
        assert_eq!(file.hunks[0].new_start, Some(1));
        assert_eq!(file.hunks[1].original_start, None);
        assert_eq!(file.hunks[1].new_start, None);
        assert_eq!(file.hunks[1].lines, vec![DiffLine::Addition("other".to_string())]);
    }

    #[test]
    fn test_missing_file_header_starts_new_file() {
        let diff = parse(
            "--- a/one.txt\n+++ b/one.txt\n@@ -1 +1 @@\n-1\n+one\n--- a/two.txt\n+++ b/two.txt\n@@ -1 +1 @@\n-2\n+two\n",
        );
        assert_eq!(diff.paths().collect::<Vec<_>>(), vec!["one.txt", "two.txt"]);
        assert_eq!(diff.get("one.txt").unwrap().hunks.len(), 1);
        assert_eq!(diff.get("two.txt").unwrap().hunks.len(), 1);
    }

    #[test]
    fn test_paths_drop_timestamps() {
        let diff = parse("--- a/x.txt\t2024-01-01 00:00:00\n+++ b/x.txt\t2024-01-02 00:00:00\n@@ -1 +1 @@\n+y\n");
        let file = diff.get("x.txt").unwrap();
        assert_eq!(file.old_path.as_deref(), Some("x.txt"));
    }

    #[test]
    fn test_unknown_and_blank_lines_are_dropped() {
        let diff = parse(
            "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n a\n\n-b\n\\ No newline at end of file\n+c\n",
        );
        let lines = &diff.get("x").unwrap().hunks[0].lines;
        assert_eq!(
            lines,
            &vec![
                DiffLine::Context("a".to_string()),
                DiffLine::Deletion("b".to_string()),
                DiffLine::Addition("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_file_section_without_new_path_is_dropped() {
        let diff = parse("diff --git a/x b/x\n--- a/x\n@@ -1 +1 @@\n+y\n");
        assert!(diff.is_empty());
    }

    #[test]
    fn test_removed_sql_comment_stays_in_hunk() {
        let diff = parse(
            "--- a/q.sql\n+++ b/q.sql\n@@ -1,3 +1,3 @@\n keep\n--- old comment\n+-- new comment\n tail\n",
        );
        let file = diff.get("q.sql").unwrap();
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(
            file.hunks[0].lines,
            vec![
                DiffLine::Context("keep".to_string()),
                DiffLine::Deletion("-- old comment".to_string()),
                DiffLine::Addition("-- new comment".to_string()),
                DiffLine::Context("tail".to_string()),
            ]
        );
        assert_eq!(
            crate::apply(Some("keep\n-- old comment\ntail\n"), file),
            "keep\n-- new comment\ntail\n"
        );
    }

    #[test]
    fn test_added_plus_prefixed_line_stays_in_hunk() {
        let diff = parse("--- a/notes.md\n+++ b/notes.md\n@@ -1 +1,2 @@\n intro\n+++ counter\n");
        let file = diff.get("notes.md").unwrap();
        assert_eq!(
            file.hunks[0].lines,
            vec![
                DiffLine::Context("intro".to_string()),
                DiffLine::Addition("++ counter".to_string()),
            ]
        );
    }

    #[test]
    fn test_marker_lines_without_counts_use_lookahead() {
        let diff = parse(
            "--- a/init.lua\n+++ b/init.lua\n@@ -x +y @@\n--- stale\n+-- fresh\n--- a/next.lua\n+++ b/next.lua\n@@ -1 +1 @@\n-a\n+b\n",
        );
        assert_eq!(diff.paths().collect::<Vec<_>>(), vec!["init.lua", "next.lua"]);
        assert_eq!(
            diff.get("init.lua").unwrap().hunks[0].lines,
            vec![
                DiffLine::Deletion("-- stale".to_string()),
                DiffLine::Addition("-- fresh".to_string()),
            ]
        );
        assert_eq!(diff.get("next.lua").unwrap().hunks[0].lines.len(), 2);
    }

    #[test]
    fn test_repeated_path_replaces_entry() {
        let diff = parse(
            "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n+first\ndiff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n+second\n",
        );
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff.get("x").unwrap().hunks[0].lines,
            vec![DiffLine::Addition("second".to_string())]
        );
    }
}
