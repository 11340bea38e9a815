//! Review backend that talks to an OpenAI-compatible chat completions API.
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::gitea::{CommitSha, PullRequestNumber, RepoName};
use crate::review::diff::{parse_unified_diff, retain_anchored_comments};
use crate::review::prompt::{commit_prompt, pull_request_prompt, SYSTEM_PROMPT};
use crate::review::{FileChange, LineComment, ReviewBackend, ReviewResult};
use crate::utils::http::{endpoint, error_body};

const EMPTY_CHANGES_SUMMARY: &str = "There are no code changes to review.";

#[derive(thiserror::Error, Debug)]
pub enum ReviewError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Review backend responded with {status}: {body}")]
    Unsuccessful { status: StatusCode, body: String },
    #[error("Review backend returned no answer")]
    EmptyAnswer,
    #[error("Cannot parse review: {0}")]
    InvalidReview(#[from] serde_json::Error),
}

pub struct ReviewClientConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub api_url: Url,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Longer diffs are truncated before they are sent to the model.
    pub max_diff_chars: usize,
    pub timeout: Duration,
}

pub struct AiReviewClient {
    client: reqwest::Client,
    config: ReviewClientConfig,
}

impl AiReviewClient {
    pub fn new(config: ReviewClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Cannot build review backend HTTP client")?;
        Ok(Self { client, config })
    }

    async fn request_review(&self, prompt: String) -> anyhow::Result<ReviewResult> {
        let url = endpoint(&self.config.api_url, ["chat", "completions"])?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut builder = self.client.post(url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let answer = send_chat_request(builder).await?;
        Ok(parse_review(&answer)?)
    }
}

async fn send_chat_request(builder: reqwest::RequestBuilder) -> Result<String, ReviewError> {
    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ReviewError::Unsuccessful {
            status,
            body: error_body(response).await,
        });
    }

    let response: ChatResponse = response.json().await?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ReviewError::EmptyAnswer)
}

/// Parses the JSON review written by the model. Models like to wrap JSON in Markdown code
/// fences even when asked not to.
fn parse_review(answer: &str) -> Result<ReviewResult, serde_json::Error> {
    let answer = answer.trim();
    let json = answer
        .strip_prefix("```json")
        .or_else(|| answer.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(answer);

    let review: RawReview = serde_json::from_str(json.trim())?;
    Ok(ReviewResult {
        summary: review.summary,
        line_comments: review
            .comments
            .into_iter()
            .map(|comment| LineComment {
                path: comment.path,
                line: comment.line,
                comment: comment.comment,
            })
            .collect(),
    })
}

#[async_trait]
impl ReviewBackend for AiReviewClient {
    async fn review_pull_request(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        diff: &str,
        head_sha: &CommitSha,
    ) -> anyhow::Result<ReviewResult> {
        if diff.trim().is_empty() {
            tracing::info!("Pull request {repo}#{pr} has an empty diff, skipping review");
            return Ok(empty_review());
        }

        let files = parse_unified_diff(diff);
        let changes = files
            .iter()
            .map(|file| file.to_file_change())
            .collect::<Vec<_>>();
        let prompt = pull_request_prompt(
            repo,
            pr,
            head_sha,
            &changes,
            diff,
            self.config.max_diff_chars,
        );

        let mut review = self
            .request_review(prompt)
            .await
            .with_context(|| format!("Cannot review pull request {repo}#{pr}"))?;

        let (anchored, dropped) = retain_anchored_comments(&files, review.line_comments);
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} review comment(s) pointing outside of the diff");
        }
        review.line_comments = anchored;
        Ok(review)
    }

    async fn review_commit(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult> {
        if files.is_empty() {
            tracing::info!("Commit {repo}@{sha} has no changed files, skipping review");
            return Ok(empty_review());
        }

        self.request_review(commit_prompt(repo, sha, files))
            .await
            .with_context(|| format!("Cannot review commit {repo}@{sha}"))
    }
}

fn empty_review() -> ReviewResult {
    ReviewResult {
        summary: EMPTY_CHANGES_SUMMARY.to_string(),
        line_comments: vec![],
    }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(serde::Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatAnswer,
}

#[derive(serde::Deserialize)]
struct ChatAnswer {
    content: Option<String>,
}

#[derive(serde::Deserialize)]
struct RawReview {
    summary: String,
    #[serde(default)]
    comments: Vec<RawLineComment>,
}

#[derive(serde::Deserialize)]
struct RawLineComment {
    #[serde(alias = "file")]
    path: String,
    line: u64,
    #[serde(alias = "body")]
    comment: String,
}
