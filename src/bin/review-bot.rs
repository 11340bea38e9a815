use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use url::Url;

use review_bot::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_REVIEW_TIMEOUT};
use review_bot::gitea::api::GiteaClient;
use review_bot::notify::{FeishuClient, LogNotifier, Notifier};
use review_bot::review::client::{AiReviewClient, ReviewClientConfig};
use review_bot::{create_app, BotContext, Mode, ServerState, SignatureVerifier, WebhookSecret};

#[derive(clap::Parser)]
struct Opts {
    /// Development mode accepts unsigned webhooks and does not write anything to Gitea.
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Mode::Development)]
    mode: Mode,

    /// Address on which the webhook server listens.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Secret used to authenticate webhooks.
    #[arg(long, env = "WEBHOOK_SECRET")]
    webhook_secret: Option<String>,

    /// Base URL of the Gitea instance.
    #[arg(long, env = "GITEA_URL", default_value = "http://localhost:3000")]
    gitea_url: Url,

    /// Access token of the bot's Gitea account.
    #[arg(long, env = "GITEA_TOKEN")]
    gitea_token: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "AI_REVIEW_API_URL", default_value = "https://api.openai.com/v1")]
    review_api_url: Url,

    #[arg(long, env = "AI_REVIEW_API_KEY")]
    review_api_key: Option<String>,

    #[arg(long, env = "AI_REVIEW_MODEL", default_value = "gpt-4o-mini")]
    review_model: String,

    /// Diffs longer than this are truncated before being reviewed.
    #[arg(long, env = "AI_REVIEW_MAX_DIFF_CHARS", default_value_t = 60_000)]
    review_max_diff_chars: usize,

    #[arg(long, env = "AI_REVIEW_TIMEOUT_SECS", default_value_t = DEFAULT_REVIEW_TIMEOUT.as_secs())]
    review_timeout_secs: u64,

    /// Feishu custom bot webhook. Without it, notifications are only logged.
    #[arg(long, env = "FEISHU_WEBHOOK_URL")]
    feishu_webhook_url: Option<Url>,

    /// Signing secret of the Feishu custom bot.
    #[arg(long, env = "FEISHU_SECRET")]
    feishu_secret: Option<String>,
}

async fn server(addr: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;
    tracing::info!("Listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_notifier(opts: &Opts) -> anyhow::Result<Arc<dyn Notifier>> {
    match &opts.feishu_webhook_url {
        Some(url) => Ok(Arc::new(FeishuClient::new(
            url.clone(),
            opts.feishu_secret.clone().map(SecretString::new),
            DEFAULT_REQUEST_TIMEOUT,
        )?)),
        None => {
            tracing::warn!("FEISHU_WEBHOOK_URL is not set, notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn try_main(opts: Opts) -> anyhow::Result<()> {
    tracing::info!("Starting review bot in {} mode", opts.mode);
    if opts.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET is not set, signed webhooks cannot be verified");
    }

    let api = Arc::new(GiteaClient::new(
        opts.gitea_url.clone(),
        opts.gitea_token.clone().map(SecretString::new),
        DEFAULT_REQUEST_TIMEOUT,
    )?);
    let backend = Arc::new(AiReviewClient::new(ReviewClientConfig {
        api_url: opts.review_api_url.clone(),
        api_key: opts.review_api_key.clone().map(SecretString::new),
        model: opts.review_model.clone(),
        max_diff_chars: opts.review_max_diff_chars,
        timeout: Duration::from_secs(opts.review_timeout_secs),
    })?);
    let notifier = build_notifier(&opts)?;

    let ctx = BotContext::for_mode(opts.mode, api, backend, notifier);
    let verifier = SignatureVerifier::new(opts.mode, opts.webhook_secret.map(WebhookSecret::new));
    let state = ServerState::new(verifier, Arc::new(ctx));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Cannot build tokio runtime")?;
    runtime.block_on(server(opts.bind, state))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = Opts::parse();
    if let Err(error) = try_main(opts) {
        eprintln!("Error: {error:?}");
        std::process::exit(1);
    }
}
