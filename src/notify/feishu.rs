//! Notifications sent through a Feishu custom bot webhook.
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use base64::prelude::{Engine, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use url::Url;

use crate::notify::{Notification, Notifier};
use crate::utils::http::error_body;

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Feishu responded with {status}: {body}")]
    Unsuccessful { status: StatusCode, body: String },
    #[error("Feishu rejected the message (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("Cannot sign the message")]
    Signature,
}

pub struct FeishuClient {
    client: reqwest::Client,
    webhook_url: Url,
    /// Set when the bot has signature verification enabled.
    secret: Option<SecretString>,
}

impl FeishuClient {
    pub fn new(
        webhook_url: Url,
        secret: Option<SecretString>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Cannot build Feishu HTTP client")?;
        Ok(Self {
            client,
            webhook_url,
            secret,
        })
    }

    pub async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let (timestamp, sign) = match &self.secret {
            Some(secret) => {
                let timestamp = chrono::Utc::now().timestamp();
                let sign = sign(timestamp, secret.expose_secret())?;
                (Some(timestamp.to_string()), Some(sign))
            }
            None => (None, None),
        };
        let message = TextMessage {
            timestamp,
            sign,
            msg_type: "text",
            content: TextContent { text },
        };

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Unsuccessful {
                status,
                body: error_body(response).await,
            });
        }

        let answer: BotResponse = response.json().await?;
        match answer.code.or(answer.status_code).unwrap_or(0) {
            0 => Ok(()),
            code => Err(NotifyError::Rejected {
                code,
                message: answer.msg.or(answer.status_message).unwrap_or_default(),
            }),
        }
    }

    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        tracing::debug!(kind = notification.kind(), "Sending Feishu notification");
        self.send_text(&notification.to_string())
            .await
            .with_context(|| format!("Cannot send {} notification", notification.kind()))
    }
}

/// Feishu signs with an empty message and the timestamp and secret as the key.
fn sign(timestamp: i64, secret: &str) -> Result<String, NotifyError> {
    let key = format!("{timestamp}\n{secret}");
    let mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).map_err(|_| NotifyError::Signature)?;
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl Notifier for FeishuClient {
    async fn send_pull_request_created(
        &self,
        title: &str,
        url: &str,
        reviewers: &[String],
    ) -> anyhow::Result<()> {
        self.deliver(Notification::PullRequestCreated {
            title: title.to_string(),
            url: url.to_string(),
            reviewers: reviewers.to_vec(),
        })
        .await
    }

    async fn send_reviewer_assigned(
        &self,
        title: &str,
        url: &str,
        reviewer: &str,
    ) -> anyhow::Result<()> {
        self.deliver(Notification::ReviewerAssigned {
            title: title.to_string(),
            url: url.to_string(),
            reviewer: reviewer.to_string(),
        })
        .await
    }

    async fn send_issue_created(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()> {
        self.deliver(Notification::IssueCreated {
            title: title.to_string(),
            url: url.to_string(),
            assignees: assignees.to_vec(),
        })
        .await
    }

    async fn send_issue_closed(
        &self,
        title: &str,
        url: &str,
        creator: &str,
    ) -> anyhow::Result<()> {
        self.deliver(Notification::IssueClosed {
            title: title.to_string(),
            url: url.to_string(),
            creator: creator.to_string(),
        })
        .await
    }

    async fn send_issue_assigned(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()> {
        self.deliver(Notification::IssueAssigned {
            title: title.to_string(),
            url: url.to_string(),
            assignees: assignees.to_vec(),
        })
        .await
    }
}

#[derive(serde::Serialize)]
struct TextMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sign: Option<String>,
    msg_type: &'static str,
    content: TextContent<'a>,
}

#[derive(serde::Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

/// Older bot versions answer with `StatusCode`/`StatusMessage`, newer ones with `code`/`msg`.
#[derive(serde::Deserialize)]
struct BotResponse {
    code: Option<i64>,
    msg: Option<String>,
    #[serde(rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(rename = "StatusMessage")]
    status_message: Option<String>,
}
