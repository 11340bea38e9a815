use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use hmac::{Hmac, Mac};
use http::Request;
use serde_json::Value;
use sha2::Sha256;

use crate::bot::{handle_webhook, BotContext, WebhookOutcome};
use crate::config::Mode;
use crate::gitea::webhook::{SignatureVerifier, WebhookEnvelope, WebhookSecret};
use crate::review::LineComment;


pub use fakes::{FakeBackend, FakeNotifier, FakeSourceControl, PostedComment, RelatedLookup};

pub const TEST_WEBHOOK_SECRET: &str = "ABCDEF";

/// How long should we wait for a background review before we fail the test.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Signs `body` the way Gitea does.
pub fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn create_webhook_request(event: &str, body: &str) -> Request<Body> {
    Request::post("/webhook/gitea")
        .header("x-gitea-event", event)
        .header("x-gitea-signature", sign(body.as_bytes()))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn line_comment(path: &str, line: u64) -> LineComment {
    LineComment {
        path: path.to_string(),
        line,
        comment: format!("Comment on {path}:{line}"),
    }
}

/// A bot wired to fakes, which delivers webhooks directly to the handlers.
pub struct TestContext {
    pub api: Arc<FakeSourceControl>,
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<FakeNotifier>,
    pub ctx: Arc<BotContext>,
    mode: Mode,
}

impl TestContext {
    pub fn production() -> Self {
        Self::new(Mode::Production, FakeSourceControl::default())
    }

    pub fn new(mode: Mode, api: FakeSourceControl) -> Self {
        Self::build(mode, api, FakeBackend::default(), FakeNotifier::default())
    }

    pub fn build(
        mode: Mode,
        api: FakeSourceControl,
        backend: FakeBackend,
        notifier: FakeNotifier,
    ) -> Self {
        let api = Arc::new(api);
        let backend = Arc::new(backend);
        let notifier = Arc::new(notifier);
        let ctx = BotContext::for_mode(mode, api.clone(), backend.clone(), notifier.clone());
        Self {
            api,
            backend,
            notifier,
            ctx: Arc::new(ctx),
            mode,
        }
    }

    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(
            self.mode,
            Some(WebhookSecret::new(TEST_WEBHOOK_SECRET.to_string())),
        )
    }

    /// Delivers a correctly signed webhook.
    pub async fn deliver(&self, event: Option<&str>, body: &Value) -> WebhookOutcome {
        self.deliver_raw(event, body.to_string().as_bytes()).await
    }

    pub async fn deliver_raw(&self, event: Option<&str>, body: &[u8]) -> WebhookOutcome {
        self.deliver_envelope(event, body, Some(sign(body))).await
    }

    pub async fn deliver_unsigned(&self, event: Option<&str>, body: &Value) -> WebhookOutcome {
        self.deliver_envelope(event, body.to_string().as_bytes(), None)
            .await
    }

    pub async fn deliver_with_signature(
        &self,
        event: Option<&str>,
        body: &Value,
        signature: &str,
    ) -> WebhookOutcome {
        self.deliver_envelope(
            event,
            body.to_string().as_bytes(),
            Some(signature.to_string()),
        )
        .await
    }

    async fn deliver_envelope(
        &self,
        event: Option<&str>,
        body: &[u8],
        signature: Option<String>,
    ) -> WebhookOutcome {
        let envelope = WebhookEnvelope {
            body: Bytes::copy_from_slice(body),
            signature,
            event_type: event.map(|event| event.to_string()),
        };
        handle_webhook(&self.verifier(), &self.ctx, envelope)
            .await
            .unwrap()
    }

    /// Waits until the review started by the webhook (if any) finishes.
    pub async fn finish(&self, outcome: WebhookOutcome) {
        if let Some(review) = outcome.into_review() {
            tokio::time::timeout(TEST_TIMEOUT, review.join())
                .await
                .expect("Review has timed out")
                .expect("Review task has panicked");
        }
    }
}
