//! The AI review backend and the data it exchanges with the bot.
use axum::async_trait;
use serde::Serialize;

use crate::gitea::{CommitSha, PullRequestNumber, RepoName};

pub mod client;
pub mod diff;
mod prompt;

/// A review comment anchored to a line of a file (on the new side of the diff).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineComment {
    pub path: String,
    pub line: u64,
    pub comment: String,
}

/// Outcome of a single review.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReviewResult {
    pub summary: String,
    /// In the order returned by the backend.
    pub line_comments: Vec<LineComment>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
}

/// A changed file together with its line statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

impl FileChange {
    /// A change whose line statistics are not known.
    pub fn without_stats(filename: &str, status: FileStatus) -> Self {
        Self {
            filename: filename.to_string(),
            status,
            additions: 0,
            deletions: 0,
            changes: 0,
        }
    }
}

/// Produces reviews of code changes.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// Review the unified `diff` of a pull request whose head is at `head_sha`.
    async fn review_pull_request(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        diff: &str,
        head_sha: &CommitSha,
    ) -> anyhow::Result<ReviewResult>;

    /// Review a single commit described by the list of files it has changed.
    async fn review_commit(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult>;
}
