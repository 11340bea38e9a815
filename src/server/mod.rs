use std::any::Any;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::bot::{handle_webhook, BotContext, WebhookOutcome};
use crate::gitea::webhook::{GiteaWebhook, SignatureVerifier};

/// Shared server state for all axum handlers.
pub struct ServerState {
    verifier: SignatureVerifier,
    ctx: Arc<BotContext>,
}

impl ServerState {
    pub fn new(verifier: SignatureVerifier, ctx: Arc<BotContext>) -> Self {
        Self { verifier, ctx }
    }
}

#[derive(Clone)]
pub struct ServerStateRef(pub Arc<ServerState>);

pub fn create_app(state: ServerState) -> Router {
    Router::new()
        .route("/webhook/gitea", post(gitea_webhook_handler))
        .route("/health", get(health_handler))
        .layer(ConcurrencyLimitLayer::new(100))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(ServerStateRef(Arc::new(state)))
        .fallback(not_found_handler)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Router panicked: {err:?}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Axum handler that receives a Gitea webhook and answers before any review finishes.
pub async fn gitea_webhook_handler(
    State(ServerStateRef(state)): State<ServerStateRef>,
    GiteaWebhook(envelope): GiteaWebhook,
) -> WebhookOutcome {
    match handle_webhook(&state.verifier, &state.ctx, envelope).await {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!("Cannot handle Gitea webhook: {error:?}");
            WebhookOutcome::Failed("Failed to handle Gitea webhook".to_string())
        }
    }
}
