//! # fixhub-patch
//!
//! Unified-diff handling for agent-authored patches.
//!
//! Diffs come from a non-deterministic author, so both halves are tolerant:
//! [`parse`] never fails (malformed hunk headers keep the hunk with no range
//! information, stray lines are dropped) and [`apply`] replays hunks
//! positionally against the original text without validating context.
//!
//! ## Usage
//!
//! ```
//! let diff = fixhub_patch::parse(
//!     "diff --git a/greet.txt b/greet.txt\n--- a/greet.txt\n+++ b/greet.txt\n@@ -1,2 +1,2 @@\n hello\n-world\n+there\n",
//! );
//! let file = diff.get("greet.txt").unwrap();
//! assert_eq!(fixhub_patch::apply(Some("hello\nworld\n"), file), "hello\nthere\n");
//! ```

mod apply;
mod model;
mod parser;

pub use apply::apply;
pub use model::{DiffLine, FileDiff, Hunk, UnifiedDiff, NULL_DEVICE};
pub use parser::parse;
