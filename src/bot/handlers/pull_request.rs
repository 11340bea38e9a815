use std::sync::Arc;

use anyhow::Context;
use itertools::Itertools;
use serde_json::Value;

use crate::bot::comment::review_summary_comment;
use crate::bot::handlers::{malformed, WebhookOutcome};
use crate::bot::{spawn_review, BotContext, ReviewHandle};
use crate::gitea::event::{PullRequestAction, PullRequestEvent};
use crate::gitea::{PullRequestNumber, RepoName};
use crate::notify::{Notification, Notifier};
use crate::utils::text::preview;

pub(super) async fn handle_pull_request_event(
    ctx: &Arc<BotContext>,
    body: &Value,
) -> anyhow::Result<WebhookOutcome> {
    let action = PullRequestAction::from_payload(body);
    if !action.triggers_review() {
        return Ok(WebhookOutcome::Ignored(format!(
            "Pull request action `{action}` is not handled"
        )));
    }

    let event = match PullRequestEvent::parse(action, body) {
        Ok(event) => event,
        Err(error) => return Ok(malformed(error)),
    };

    tracing::info!(
        repo = %event.repository,
        pr = %event.number,
        action = %event.action,
        "Received pull request event: {}",
        event.title
    );
    if !event.requested_reviewers.is_empty() {
        tracing::info!(
            "Requested reviewers: {}",
            event.requested_reviewers.iter().join(", ")
        );
    }

    notify_pull_request(ctx.notifier.as_ref(), &event).await;

    let review = spawn_pull_request_review(ctx.clone(), event.repository, event.number);
    Ok(WebhookOutcome::Accepted {
        message: "Code review request accepted".to_string(),
        review,
    })
}

/// Notification failures never stop the review.
async fn notify_pull_request(notifier: &dyn Notifier, event: &PullRequestEvent) {
    let Some(notification) = Notification::for_pull_request(event) else {
        return;
    };
    if let Err(error) = notification.send(notifier).await {
        tracing::error!(
            "Cannot send {} notification for {}#{}: {error:?}",
            notification.kind(),
            event.repository,
            event.number
        );
    }
}

/// Reviews the pull request in the background.
pub fn spawn_pull_request_review(
    ctx: Arc<BotContext>,
    repo: RepoName,
    pr: PullRequestNumber,
) -> ReviewHandle {
    let span = tracing::info_span!("Pull request review", pr = format!("{repo}#{pr}"));
    spawn_review(span, async move {
        review_pull_request(&ctx, &repo, pr)
            .await
            .with_context(|| format!("Review of pull request {repo}#{pr} has failed"))
    })
}

/// Reviews the current diff of a pull request and posts the summary and line comments.
pub async fn review_pull_request(
    ctx: &BotContext,
    repo: &RepoName,
    pr: PullRequestNumber,
) -> anyhow::Result<()> {
    tracing::info!("Starting review of {repo}#{pr}");

    let snapshot = ctx.source.load(repo, pr).await?;
    let result = ctx
        .backend
        .review_pull_request(repo, pr, &snapshot.diff, &snapshot.head_sha)
        .await?;
    tracing::info!(
        comments = result.line_comments.len(),
        "Review result: {}",
        preview(&result.summary)
    );

    ctx.sink
        .post_pull_request_summary(repo, pr, &review_summary_comment(&result.summary))
        .await?;
    if !result.line_comments.is_empty() {
        ctx.sink
            .post_line_comments(repo, pr, &snapshot.head_sha, &result.line_comments)
            .await?;
    }

    tracing::info!("Review of {repo}#{pr} finished");
    Ok(())
}
