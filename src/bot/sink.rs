use std::sync::Arc;

use axum::async_trait;

use crate::bot::{Comment, ReviewSink, SourceControl};
use crate::gitea::{CommitSha, PullRequestNumber, RepoName};
use crate::review::LineComment;
use crate::utils::text::{pluralize, preview};

/// Writes reviews back to the source-control platform.
pub struct GiteaReviewSink {
    api: Arc<dyn SourceControl>,
}

impl GiteaReviewSink {
    pub fn new(api: Arc<dyn SourceControl>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ReviewSink for GiteaReviewSink {
    async fn post_pull_request_summary(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        comment: &Comment,
    ) -> anyhow::Result<()> {
        self.api
            .post_pull_request_comment(repo, pr, comment.text())
            .await
    }

    async fn post_line_comments(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        sha: &CommitSha,
        comments: &[LineComment],
    ) -> anyhow::Result<()> {
        self.api.post_line_comments(repo, pr, sha, comments).await
    }

    async fn post_commit_summary(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        comment: &Comment,
    ) -> anyhow::Result<()> {
        self.api
            .post_commit_comment(repo, sha, comment.text())
            .await
    }
}

/// Only logs what would have been written.
pub struct LoggingReviewSink;

#[async_trait]
impl ReviewSink for LoggingReviewSink {
    async fn post_pull_request_summary(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        comment: &Comment,
    ) -> anyhow::Result<()> {
        tracing::info!(
            "Simulated summary comment on {repo}#{pr}: {}",
            preview(comment.text())
        );
        Ok(())
    }

    async fn post_line_comments(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        sha: &CommitSha,
        comments: &[LineComment],
    ) -> anyhow::Result<()> {
        tracing::info!(
            "Simulated {} {} on {repo}#{pr} at {sha}",
            comments.len(),
            pluralize("line comment", comments.len())
        );
        for comment in comments {
            tracing::debug!("{}:{}: {}", comment.path, comment.line, comment.comment);
        }
        Ok(())
    }

    async fn post_commit_summary(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        comment: &Comment,
    ) -> anyhow::Result<()> {
        tracing::info!(
            "Simulated summary comment on {repo}@{sha}: {}",
            preview(comment.text())
        );
        Ok(())
    }
}
