use std::sync::Arc;

use axum::async_trait;

use crate::config::Mode;
use crate::gitea::{CommitSha, PullRequest, PullRequestNumber, RepoName};
use crate::notify::Notifier;
use crate::review::{LineComment, ReviewBackend};

mod comment;
pub mod handlers;
mod sink;
mod source;
mod task;

pub use comment::Comment;
pub use handlers::{handle_webhook, WebhookOutcome};
pub use sink::{GiteaReviewSink, LoggingReviewSink};
pub use source::{
    GiteaPullRequestSource, SimulatedPullRequestSource, SIMULATED_DIFF, SIMULATED_HEAD_SHA,
};
pub use task::{spawn_review, ReviewHandle};

/// Provides access to the source-control platform hosting the repositories.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Load a pull request (including its head commit and base repository).
    async fn get_pull_request(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<PullRequest>;

    /// Load the unified diff of a pull request.
    async fn get_pull_request_diff(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<String>;

    /// Find the pull request that contains the given commit.
    /// Returns `Ok(None)` if the platform knows of no such pull request.
    async fn find_related_pull_request(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
    ) -> anyhow::Result<Option<PullRequestNumber>>;

    /// Post a comment to the conversation of a pull request.
    async fn post_pull_request_comment(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        text: &str,
    ) -> anyhow::Result<()>;

    /// Post a batch of comments anchored to lines of the pull request diff at `sha`.
    async fn post_line_comments(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        sha: &CommitSha,
        comments: &[LineComment],
    ) -> anyhow::Result<()>;

    async fn post_commit_comment(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        text: &str,
    ) -> anyhow::Result<()>;
}

/// The data needed to review a pull request.
#[derive(Clone, Debug)]
pub struct PullRequestSnapshot {
    pub head_sha: CommitSha,
    pub diff: String,
}

/// Where the code of a pull request under review comes from.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn load(&self, repo: &RepoName, pr: PullRequestNumber)
        -> anyhow::Result<PullRequestSnapshot>;
}

/// Where review results are written to.
#[async_trait]
pub trait ReviewSink: Send + Sync {
    async fn post_pull_request_summary(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        comment: &Comment,
    ) -> anyhow::Result<()>;

    async fn post_line_comments(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        sha: &CommitSha,
        comments: &[LineComment],
    ) -> anyhow::Result<()>;

    async fn post_commit_summary(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        comment: &Comment,
    ) -> anyhow::Result<()>;
}

/// What happens with commits whose checks have passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitReviewMode {
    /// Review the commit and write the results back.
    Run,
    /// Only log that the commit would be reviewed.
    LogOnly,
}

/// Everything the webhook handlers need to do their job.
pub struct BotContext {
    /// Used for lookups that happen while the webhook is being handled.
    pub api: Arc<dyn SourceControl>,
    pub source: Arc<dyn PullRequestSource>,
    pub sink: Arc<dyn ReviewSink>,
    pub backend: Arc<dyn ReviewBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub commit_reviews: CommitReviewMode,
}

impl BotContext {
    /// Reads pull requests from and writes reviews to Gitea.
    pub fn production(
        api: Arc<dyn SourceControl>,
        backend: Arc<dyn ReviewBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source: Arc::new(GiteaPullRequestSource::new(api.clone())),
            sink: Arc::new(GiteaReviewSink::new(api.clone())),
            api,
            backend,
            notifier,
            commit_reviews: CommitReviewMode::Run,
        }
    }

    /// Reviews simulated pull requests and only logs the results, so the whole pipeline can
    /// run without write access to Gitea.
    pub fn development(
        api: Arc<dyn SourceControl>,
        backend: Arc<dyn ReviewBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            source: Arc::new(SimulatedPullRequestSource),
            sink: Arc::new(LoggingReviewSink),
            backend,
            notifier,
            commit_reviews: CommitReviewMode::LogOnly,
        }
    }

    pub fn for_mode(
        mode: Mode,
        api: Arc<dyn SourceControl>,
        backend: Arc<dyn ReviewBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        match mode {
            Mode::Development => Self::development(api, backend, notifier),
            Mode::Production => Self::production(api, backend, notifier),
        }
    }
}
