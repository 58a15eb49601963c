//! Positional hunk application

use crate::model::{DiffLine, FileDiff};

/// Apply `file`'s hunks to `original` and return the new text
///
/// `None` (or empty) means the file does not exist yet. Hunks are replayed in
/// the order given: untouched lines are copied up to each hunk's
/// `original_start`, context lines consume and emit the original line (or
/// their own text once the original is exhausted), deletions consume, and
/// additions emit. Hunks are not re-sorted, so out-of-order hunks give
/// deterministic but possibly unexpected output. The result always ends with
/// exactly one `\n`.
pub fn apply(original: Option<&str>, file: &FileDiff) -> String {
    let original_lines = split_lines(original.unwrap_or_default());
    let mut output: Vec<&str> = Vec::with_capacity(original_lines.len());
    let mut cursor = 0;

    for hunk in &file.hunks {
        let target = hunk.original_start.map_or(0, |start| start.saturating_sub(1));
        while cursor < target && cursor < original_lines.len() {
            output.push(original_lines[cursor]);
            cursor += 1;
        }

        for line in &hunk.lines {
            match line {
                DiffLine::Context(text) => match original_lines.get(cursor) {
                    Some(existing) => {
                        output.push(existing);
                        cursor += 1;
                    }
                    None => output.push(text),
                },
                DiffLine::Deletion(_) => {
                    if cursor < original_lines.len() {
                        cursor += 1;
                    }
                }
                DiffLine::Addition(text) => output.push(text),
            }
        }
    }

    if cursor < original_lines.len() {
        output.extend_from_slice(&original_lines[cursor..]);
    }

    let joined = output.join("\n");
    let mut result = joined.trim_end_matches('\n').to_string();
    result.push('\n');
    result
}

/// Split on `\n`, ignoring the empty tail after a final newline
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hunk;
    use crate::parse;

    fn replace_line_two(with: &str) -> FileDiff {
        let diff = parse(&format!(
            "diff --git a/f.txt b/f.txt\n--- a/f.txt\n+++ b/f.txt\n@@ -1,2 +1,2 @@\n line1\n-line2\n+{}\n",
            with
        ));
        diff.get("f.txt").cloned().unwrap()
    }

    fn additions_only(count: usize) -> FileDiff {
        let mut hunk = Hunk::new(Some(0), Some(1));
        for i in 0..count {
            hunk.lines.push(DiffLine::Addition(format!("line {}", i)));
        }
        FileDiff::new("new.txt")
            .with_old_path("/dev/null")
            .with_hunk(hunk)
    }

    #[test]
    fn test_replace_line_two_in_two_lines() {
        let file = replace_line_two("X");
        assert_eq!(apply(Some("line1\nline2\n"), &file), "line1\nX\n");
        assert_eq!(apply(Some("line1\nline2"), &file), "line1\nX\n");
    }

    #[test]
    fn test_replace_line_two_in_one_line() {
        // deletion past the end is a no-op
        let file = replace_line_two("X");
        assert_eq!(apply(Some("line1\n"), &file), "line1\nX\n");
    }

    #[test]
    fn test_replace_line_two_in_ten_lines() {
        let original: String = (1..=10).map(|i| format!("line{}\n", i)).collect();
        let expected: String = (1..=10)
            .map(|i| if i == 2 { "X\n".to_string() } else { format!("line{}\n", i) })
            .collect();
        assert_eq!(apply(Some(&original), &replace_line_two("X")), expected);
    }

    #[test]
    fn test_replace_line_two_in_new_file() {
        // exhausted context falls back to the diff's own text
        let file = replace_line_two("X");
        assert_eq!(apply(None, &file), "line1\nX\n");
        assert_eq!(apply(Some(""), &file), "line1\nX\n");
    }

    #[test]
    fn test_new_file_additions() {
        for count in [0, 1, 50] {
            let file = additions_only(count);
            let expected: String = (0..count).map(|i| format!("line {}\n", i)).collect();
            let expected = if count == 0 { "\n".to_string() } else { expected };
            assert_eq!(apply(None, &file), expected, "count = {}", count);
        }
    }

    #[test]
    fn test_hunk_in_middle_of_file() {
        let diff = parse(
            "--- a/f\n+++ b/f\n@@ -4,3 +4,4 @@\n d\n+inserted\n e\n-f\n+F\n",
        );
        let file = diff.get("f").unwrap();
        let result = apply(Some("a\nb\nc\nd\ne\nf\ng\n"), file);
        assert_eq!(result, "a\nb\nc\nd\ninserted\ne\nF\ng\n");
    }

    #[test]
    fn test_two_hunks_in_order() {
        let diff = parse(
            "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n-a\n+A\n b\n@@ -5,2 +5,2 @@\n e\n-f\n+F\n",
        );
        let file = diff.get("f").unwrap();
        assert_eq!(
            apply(Some("a\nb\nc\nd\ne\nf\ng\n"), file),
            "A\nb\nc\nd\ne\nF\ng\n"
        );
    }

    #[test]
    fn test_out_of_order_hunks_are_deterministic() {
        let diff = parse(
            "--- a/f\n+++ b/f\n@@ -5,2 +5,2 @@\n e\n-f\n+F\n@@ -1,2 +1,2 @@\n-a\n+A\n b\n",
        );
        let file = diff.get("f").unwrap();
        let original = "a\nb\nc\nd\ne\nf\ng\n";

        let first = apply(Some(original), file);
        // the second hunk replays from where the first stopped instead of line 1
        assert_eq!(first, "a\nb\nc\nd\ne\nF\nA\nb\n");
        for _ in 0..5 {
            assert_eq!(apply(Some(original), file), first);
        }
    }

    #[test]
    fn test_delete_everything() {
        let diff = parse("--- a/f\n+++ b/f\n@@ -1,2 +0,0 @@\n-a\n-b\n");
        assert_eq!(apply(Some("a\nb\n"), diff.get("f").unwrap()), "\n");
    }

    #[test]
    fn test_trailing_newlines_collapse_to_one() {
        let file = FileDiff::new("f").with_hunk(
            Hunk::new(Some(1), Some(1)).with_line(DiffLine::Addition(String::new())),
        );
        assert_eq!(apply(Some("a\n"), &file), "\na\n");
        assert_eq!(apply(Some("a\n\n\n"), &FileDiff::new("f")), "a\n");
    }

    #[test]
    fn test_malformed_header_applies_at_cursor() {
        let file = FileDiff::new("f").with_hunk(
            Hunk::new(None, None)
                .with_line(DiffLine::Deletion("a".to_string()))
                .with_line(DiffLine::Addition("z".to_string())),
        );
        assert_eq!(apply(Some("a\nb\n"), &file), "z\nb\n");
    }

    #[test]
    fn test_unicode_is_opaque() {
        let diff = parse("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-héllo\n+h\u{e9}llo w\u{f6}rld \u{1f600}\n");
        assert_eq!(
            apply(Some("héllo\n"), diff.get("f").unwrap()),
            "h\u{e9}llo w\u{f6}rld \u{1f600}\n"
        );
    }
}
