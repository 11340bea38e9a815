use std::sync::Arc;

use serde_json::Value;

use crate::bot::handlers::{malformed, WebhookOutcome};
use crate::bot::BotContext;
use crate::gitea::event::IssueEvent;
use crate::notify::Notification;

/// Issues are only announced in chat. Unlike for pull requests, a failed notification is
/// reported back to Gitea.
pub(super) async fn handle_issue_event(ctx: &Arc<BotContext>, body: &Value) -> WebhookOutcome {
    let event = match IssueEvent::parse(body) {
        Ok(event) => event,
        Err(error) => return malformed(error),
    };

    tracing::info!(
        action = %event.action,
        creator = event.creator.as_deref().unwrap_or_default(),
        assignees = %event.assignees.join(","),
        "Received issue event: {}",
        event.title
    );

    if let Some(notification) = Notification::for_issue(&event) {
        if let Err(error) = notification.send(ctx.notifier.as_ref()).await {
            tracing::error!(
                "Cannot send {} notification: {error:?}",
                notification.kind()
            );
            return WebhookOutcome::Failed("Failed to handle issue event".to_string());
        }
    }

    WebhookOutcome::Handled("Issue event handled".to_string())
}
