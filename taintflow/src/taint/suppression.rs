//! Finding suppression driven by source comments.
//!
//! A comment whose trimmed text begins with the literal `levee.DoNotReport`
//! suppresses findings at the call it annotates: the same line for a
//! trailing comment, the next code line for a comment on its own line.
//! Suppression never extends into arguments or neighbouring calls.

use crate::ssa::{Pos, Program};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;

/// The literal marker recognized in comments.
pub const MARKER: &str = "levee.DoNotReport";

/// Maps file/line pairs covered by a suppression comment.
#[derive(Debug, Default)]
pub struct SuppressionMap {
    suppressed: FxHashMap<u32, FxHashSet<u32>>,
}

impl SuppressionMap {
    /// An empty map (nothing suppressed).
    #[must_use]
    pub fn new() -> SuppressionMap {
        SuppressionMap::default()
    }

    /// Scans one file's source text; `file` is its program file-table index.
    pub fn add_file(&mut self, file: u32, source: &str) {
        let lines = self.suppressed.entry(file).or_default();
        let mut pending = false;
        for (i, line) in source.lines().enumerate() {
            let lineno = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let Some((before, comment)) = split_comment(line) else {
                // A plain code line consumes a pending own-line suppression.
                if pending && !line.trim().is_empty() {
                    lines.insert(lineno);
                    pending = false;
                }
                continue;
            };
            let marked = comment.trim_start().starts_with(MARKER);
            if before.trim().is_empty() {
                // Comment-only line: marks the next code line.
                if marked {
                    pending = true;
                }
            } else {
                // Trailing comment: marks this line.
                if marked {
                    lines.insert(lineno);
                }
                if pending {
                    lines.insert(lineno);
                    pending = false;
                }
            }
        }
    }

    /// Loads every program file found under `root`, silently skipping files
    /// that are not present (they simply carry no suppressions).
    pub fn load_files(&mut self, program: &Program, root: &Path) {
        for (i, name) in program.files.iter().enumerate() {
            let path = root.join(name.as_str());
            match std::fs::read_to_string(&path) {
                Ok(text) => self.add_file(u32::try_from(i).unwrap_or(u32::MAX), &text),
                Err(e) => {
                    log::debug!("no suppression scan for {}: {e}", path.display());
                }
            }
        }
    }

    /// True when findings at this position are suppressed.
    #[must_use]
    pub fn is_suppressed(&self, pos: Pos) -> bool {
        !pos.is_none()
            && self
                .suppressed
                .get(&pos.file)
                .is_some_and(|lines| lines.contains(&pos.line))
    }
}

/// Splits a line at its comment delimiter, returning the code before it and
/// the comment text after it.
fn split_comment(line: &str) -> Option<(&str, &str)> {
    for delim in ["//", "/*", "#"] {
        if let Some(idx) = line.find(delim) {
            return Some((&line[..idx], &line[idx + delim.len()..]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_comment_marks_its_own_line() {
        let mut map = SuppressionMap::new();
        map.add_file(0, "a()\nSink(s) // levee.DoNotReport\nb()\n");
        assert!(map.is_suppressed(Pos { file: 0, line: 2, col: 1 }));
        assert!(!map.is_suppressed(Pos { file: 0, line: 1, col: 1 }));
        assert!(!map.is_suppressed(Pos { file: 0, line: 3, col: 1 }));
    }

    #[test]
    fn own_line_comment_marks_next_code_line() {
        let mut map = SuppressionMap::new();
        map.add_file(0, "// levee.DoNotReport\nSink(s)\nSink(t)\n");
        assert!(map.is_suppressed(Pos { file: 0, line: 2, col: 1 }));
        assert!(!map.is_suppressed(Pos { file: 0, line: 3, col: 1 }));
    }

    #[test]
    fn unrelated_comments_do_not_suppress() {
        let mut map = SuppressionMap::new();
        map.add_file(0, "// see levee.DoNotReport docs\nSink(s)\n# note\nSink(t)\n");
        // The marker must begin the comment text, not merely appear in it.
        assert!(!map.is_suppressed(Pos { file: 0, line: 2, col: 1 }));
        assert!(!map.is_suppressed(Pos { file: 0, line: 4, col: 1 }));
    }
}
