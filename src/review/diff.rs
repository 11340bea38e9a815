//! Minimal parser of unified diffs, as returned by Gitea's `.diff` endpoint.
use std::collections::BTreeSet;

use crate::review::{FileChange, FileStatus, LineComment};

/// Changes of a single file in a unified diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub status: FileStatus,
    /// New-side line numbers of added lines.
    pub added_lines: BTreeSet<u64>,
    /// New-side line numbers of unchanged lines shown as context.
    pub context_lines: BTreeSet<u64>,
    pub deletions: u64,
}

impl FileDiff {
    fn new(path: String) -> Self {
        Self {
            path,
            status: FileStatus::Modified,
            added_lines: BTreeSet::new(),
            context_lines: BTreeSet::new(),
            deletions: 0,
        }
    }

    /// Can a review comment be anchored to this line?
    pub fn contains_line(&self, line: u64) -> bool {
        self.added_lines.contains(&line) || self.context_lines.contains(&line)
    }

    pub fn to_file_change(&self) -> FileChange {
        let additions = self.added_lines.len() as u64;
        FileChange {
            filename: self.path.clone(),
            status: self.status,
            additions,
            deletions: self.deletions,
            changes: additions + self.deletions,
        }
    }
}

/// Splits a unified diff into per-file changes.
pub fn parse_unified_diff(diff: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    // New-side line number of the next hunk line, `None` outside of hunks.
    let mut new_line: Option<u64> = None;

    for line in diff.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            files.push(FileDiff::new(new_path_from_header(header)));
            new_line = None;
            continue;
        }
        let Some(file) = files.last_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            new_line = parse_hunk_start(line);
            continue;
        }

        match new_line {
            None => {
                if line.starts_with("new file mode") {
                    file.status = FileStatus::Added;
                } else if line.starts_with("deleted file mode") {
                    file.status = FileStatus::Removed;
                } else if let Some(path) = line.strip_prefix("+++ ") {
                    if let Some(path) = path.strip_prefix("b/") {
                        file.path = path.to_string();
                    }
                }
            }
            Some(ref mut current) => {
                if line.starts_with('+') {
                    file.added_lines.insert(*current);
                    *current += 1;
                } else if line.starts_with('-') {
                    file.deletions += 1;
                } else if line.starts_with('\\') {
                    // "\ No newline at end of file"
                } else {
                    // Context lines, including empty lines whose leading space got stripped
                    file.context_lines.insert(*current);
                    *current += 1;
                }
            }
        }
    }
    files
}

/// `a/src/lib.rs b/src/lib.rs` -> `src/lib.rs`
fn new_path_from_header(header: &str) -> String {
    match header.rsplit_once(" b/") {
        Some((_, path)) => path.to_string(),
        None => header.to_string(),
    }
}

/// `@@ -1,5 +1,9 @@ fn main()` -> `1`
fn parse_hunk_start(line: &str) -> Option<u64> {
    let new_range = line.split_whitespace().nth(2)?.strip_prefix('+')?;
    let start = new_range.split(',').next()?;
    start.parse().ok()
}

/// Drops comments that do not point to a file and line that is part of the diff. Gitea
/// rejects review comments anchored outside of the diff.
pub fn retain_anchored_comments(
    files: &[FileDiff],
    comments: Vec<LineComment>,
) -> (Vec<LineComment>, usize) {
    let (anchored, dropped): (Vec<_>, Vec<_>) = comments.into_iter().partition(|comment| {
        files
            .iter()
            .any(|file| file.path == comment.path && file.contains_line(comment.line))
    });
    (anchored, dropped.len())
}
