use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;

use crate::bot::comment::review_summary_comment;
use crate::bot::handlers::{malformed, WebhookOutcome};
use crate::bot::{spawn_review, BotContext, CommitReviewMode, ReviewHandle};
use crate::gitea::event::StatusEvent;
use crate::gitea::{CommitSha, PullRequestNumber, RepoName};
use crate::review::LineComment;
use crate::utils::text::{pluralize, preview};

pub(super) async fn handle_status_event(
    ctx: &Arc<BotContext>,
    body: &Value,
) -> anyhow::Result<WebhookOutcome> {
    let state = match StatusEvent::state_of(body) {
        Ok(state) => state,
        Err(error) => return Ok(malformed(error)),
    };
    if !state.is_success() {
        return Ok(WebhookOutcome::Ignored(format!(
            "Ignoring commit with state `{state}`"
        )));
    }
    let event = match StatusEvent::parse(body) {
        Ok(event) => event,
        Err(error) => return Ok(malformed(error)),
    };

    let repo = &event.repository;
    let sha = &event.sha;
    let related = match ctx.api.find_related_pull_request(repo, sha).await {
        Ok(Some(pr)) => {
            tracing::info!("Commit {repo}@{sha} belongs to pull request #{pr}");
            Some(pr)
        }
        Ok(None) => {
            tracing::info!("Commit {repo}@{sha} does not belong to any pull request");
            return Ok(WebhookOutcome::Ignored(
                "Commit does not belong to any pull request".to_string(),
            ));
        }
        Err(error) => {
            // The commit still deserves a review, the pull request is looked up again later
            tracing::warn!("Cannot find pull request of commit {repo}@{sha}: {error:?}");
            None
        }
    };

    tracing::info!(
        repo = %repo,
        sha = %sha,
        pr = %related.map(|pr| pr.to_string()).unwrap_or_else(|| "unknown".to_string()),
        added = event.changes.added.len(),
        modified = event.changes.modified.len(),
        removed = event.changes.removed.len(),
        "Received successful commit status"
    );

    if event.changes.is_empty() {
        tracing::warn!("Commit {repo}@{sha} has no file changes, skipping review");
        return Ok(WebhookOutcome::Ignored(
            "Commit has no file changes".to_string(),
        ));
    }

    let review = spawn_commit_review(ctx.clone(), event, related);
    Ok(WebhookOutcome::Accepted {
        message: "Commit review request accepted".to_string(),
        review,
    })
}

/// Reviews the commit in the background, or only logs it if commit reviews are disabled.
pub fn spawn_commit_review(
    ctx: Arc<BotContext>,
    event: StatusEvent,
    related: Option<PullRequestNumber>,
) -> ReviewHandle {
    let span = tracing::info_span!(
        "Commit review",
        commit = format!("{}@{}", event.repository, event.sha)
    );
    spawn_review(span, async move {
        match ctx.commit_reviews {
            CommitReviewMode::LogOnly => {
                tracing::info!(
                    added = ?event.changes.added,
                    modified = ?event.changes.modified,
                    removed = ?event.changes.removed,
                    "Simulating review of commit {}@{}",
                    event.repository,
                    event.sha
                );
                Ok(())
            }
            CommitReviewMode::Run => review_commit(&ctx, &event, related)
                .await
                .with_context(|| {
                    format!("Review of commit {}@{} has failed", event.repository, event.sha)
                }),
        }
    })
}

/// Reviews the files changed by a commit. The summary goes to the commit and the line comments
/// to the pull request containing it. Each of the two is posted even if the other one fails.
pub async fn review_commit(
    ctx: &BotContext,
    event: &StatusEvent,
    related: Option<PullRequestNumber>,
) -> anyhow::Result<()> {
    let repo = &event.repository;
    let sha = &event.sha;
    tracing::info!(
        message = %preview(&event.message),
        "Starting review of commit {repo}@{sha}"
    );

    let files = event.changes.file_changes();
    let result = ctx.backend.review_commit(repo, sha, &files).await?;
    tracing::info!(
        comments = result.line_comments.len(),
        "Review result: {}",
        preview(&result.summary)
    );

    if let Err(error) = ctx
        .sink
        .post_commit_summary(repo, sha, &review_summary_comment(&result.summary))
        .await
    {
        tracing::error!("Cannot post review summary to commit {repo}@{sha}: {error:?}");
    }

    if let Err(error) =
        post_line_comments(ctx, repo, sha, related, &result.line_comments).await
    {
        tracing::warn!("Skipping line comments of commit {repo}@{sha}: {error:?}");
    }

    tracing::info!("Review of commit {repo}@{sha} finished");
    Ok(())
}

/// Line comments can only be anchored in a pull request. The pull request found when the
/// webhook arrived is preferred; without one, it is looked up once more.
async fn post_line_comments(
    ctx: &BotContext,
    repo: &RepoName,
    sha: &CommitSha,
    related: Option<PullRequestNumber>,
    comments: &[LineComment],
) -> anyhow::Result<()> {
    let pr = match related {
        Some(pr) => pr,
        None => match ctx.api.find_related_pull_request(repo, sha).await? {
            Some(pr) => {
                tracing::info!("Found pull request #{pr} for commit {repo}@{sha}");
                pr
            }
            None => {
                tracing::info!("No pull request contains commit {repo}@{sha}, line comments have no target");
                return Ok(());
            }
        },
    };

    if !comments.is_empty() {
        tracing::info!(
            "Posting {} {} to {repo}#{pr}",
            comments.len(),
            pluralize("line comment", comments.len())
        );
        ctx.sink.post_line_comments(repo, pr, sha, comments).await?;
    }
    Ok(())
}
