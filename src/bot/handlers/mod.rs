use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::bot::{BotContext, ReviewHandle};
use crate::gitea::event::{classify, EventKind, MalformedPayload};
use crate::gitea::webhook::{SignatureVerifier, WebhookEnvelope};

mod issue;
mod pull_request;
mod status;

pub use pull_request::{review_pull_request, spawn_pull_request_review};
pub use status::{review_commit, spawn_commit_review};

/// How a single webhook delivery was dealt with.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// The signature is missing or wrong.
    Unauthorized,
    /// The body lacks what the event family requires.
    Malformed(String),
    /// Nothing to do for this delivery.
    Ignored(String),
    /// A review has been started in the background.
    Accepted {
        message: String,
        review: ReviewHandle,
    },
    /// The delivery was fully handled while the request was open.
    Handled(String),
    Failed(String),
}

impl WebhookOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookOutcome::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookOutcome::Malformed(_) => StatusCode::BAD_REQUEST,
            WebhookOutcome::Ignored(_) | WebhookOutcome::Handled(_) => StatusCode::OK,
            WebhookOutcome::Accepted { .. } => StatusCode::ACCEPTED,
            WebhookOutcome::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Takes the handle of the started review, if there is one.
    pub fn into_review(self) -> Option<ReviewHandle> {
        match self {
            WebhookOutcome::Accepted { review, .. } => Some(review),
            _ => None,
        }
    }

    fn body(&self) -> Value {
        match self {
            WebhookOutcome::Unauthorized => {
                json!({ "error": "Webhook signature verification failed" })
            }
            WebhookOutcome::Malformed(message) | WebhookOutcome::Failed(message) => {
                json!({ "error": message })
            }
            WebhookOutcome::Ignored(message) => json!({ "status": "ignored", "message": message }),
            WebhookOutcome::Accepted { message, .. } => {
                json!({ "status": "accepted", "message": message })
            }
            WebhookOutcome::Handled(message) => json!({ "status": "success", "message": message }),
        }
    }
}

/// The review keeps running after the response has been sent.
impl IntoResponse for WebhookOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

fn malformed(error: MalformedPayload) -> WebhookOutcome {
    tracing::warn!("{error}");
    WebhookOutcome::Malformed("Invalid webhook payload".to_string())
}

/// Verifies, classifies and routes a single webhook delivery.
///
/// Returns as soon as the delivery is dealt with; reviews continue in the background.
pub async fn handle_webhook(
    verifier: &SignatureVerifier,
    ctx: &Arc<BotContext>,
    envelope: WebhookEnvelope,
) -> anyhow::Result<WebhookOutcome> {
    if !verifier.verify(&envelope.body, envelope.signature.as_deref()) {
        tracing::error!("Webhook signature verification failed");
        return Ok(WebhookOutcome::Unauthorized);
    }

    let body: Value = match serde_json::from_slice(&envelope.body) {
        Ok(body) => body,
        Err(error) => {
            tracing::warn!("Webhook body is not valid JSON: {error}");
            return Ok(WebhookOutcome::Malformed(
                "Webhook body is not valid JSON".to_string(),
            ));
        }
    };

    let kind = classify(envelope.event_type.as_deref(), &body);
    tracing::info!(event = %kind, "Received Gitea webhook");

    match kind {
        EventKind::PullRequest => pull_request::handle_pull_request_event(ctx, &body).await,
        EventKind::Status => status::handle_status_event(ctx, &body).await,
        EventKind::Issue => Ok(issue::handle_issue_event(ctx, &body).await),
        EventKind::Unknown => {
            tracing::warn!(
                "Unsupported webhook event {}",
                envelope.event_type.as_deref().unwrap_or("<no event header>")
            );
            Ok(WebhookOutcome::Ignored(
                "Unsupported webhook event".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::bot::handlers::WebhookOutcome;
    use crate::config::Mode;
    use crate::tests::payload::{issue, pull_request, status};
    use crate::tests::{FakeSourceControl, RelatedLookup, TestContext};

    #[tokio::test]
    async fn unsigned_delivery_in_production() {
        let test = TestContext::production();
        let outcome = test
            .deliver_unsigned(Some("pull_request"), &pull_request("opened").create())
            .await;
        assert!(matches!(outcome, WebhookOutcome::Unauthorized));
        assert!(test.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn wrong_signature() {
        let test = TestContext::production();
        let outcome = test
            .deliver_with_signature(
                Some("pull_request"),
                &pull_request("opened").create(),
                "0000",
            )
            .await;
        assert_eq!(outcome.status_code(), 401);
    }

    #[tokio::test]
    async fn unsigned_delivery_in_development() {
        let test = TestContext::new(Mode::Development, FakeSourceControl::default());
        let outcome = test
            .deliver_unsigned(Some("issues"), &issue("opened").assignees(&["erin"]).create())
            .await;
        assert!(matches!(outcome, WebhookOutcome::Handled(_)));
    }

    #[tokio::test]
    async fn invalid_json() {
        let test = TestContext::production();
        let outcome = test.deliver_raw(Some("pull_request"), b"{not json").await;
        assert!(matches!(outcome, WebhookOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let test = TestContext::production();
        let outcome = test
            .deliver(Some("push"), &json!({ "ref": "refs/heads/main" }))
            .await;
        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert_eq!(outcome.status_code(), 200);
    }

    #[tokio::test]
    async fn event_without_header_is_classified_by_body() {
        let test = TestContext::production();
        let outcome = test
            .deliver(None, &pull_request("closed").create())
            .await;
        // Classified as a pull request, whose `closed` action is not reviewed
        assert!(matches!(
            outcome,
            WebhookOutcome::Ignored(ref message) if message.contains("closed")
        ));
    }

    #[tokio::test]
    async fn header_wins_over_body() {
        let test = TestContext::production();
        let mut body = pull_request("opened").create();
        body["state"] = json!("pending");
        body["sha"] = json!("abc");
        let outcome = test.deliver(Some("pull_request"), &body).await;
        test.finish(outcome).await;
        assert_eq!(test.backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn status_routed_by_body_shape() {
        let test = TestContext::new(
            Mode::Production,
            FakeSourceControl::with_related(vec![RelatedLookup::Found(5)]),
        );
        let outcome = test
            .deliver(None, &status("success").modified(&["src/lib.rs"]).create())
            .await;
        assert_eq!(outcome.status_code(), 202);
        test.finish(outcome).await;
        assert_eq!(test.backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn response_bodies() {
        let test = TestContext::production();
        let outcome = test.deliver(Some("push"), &json!({})).await;
        let response = axum::response::IntoResponse::into_response(outcome);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ignored");
    }
}
