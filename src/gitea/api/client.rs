use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::bot::SourceControl;
use crate::gitea::api::GiteaError;
use crate::gitea::{CommitSha, GiteaUser, PullRequest, PullRequestNumber, RepoName};
use crate::review::LineComment;
use crate::utils::http::{endpoint, error_body};

/// Talks to the REST API (v1) of a single Gitea instance.
pub struct GiteaClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl GiteaClient {
    pub fn new(
        base_url: Url,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Cannot build Gitea HTTP client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `/api/v1/repos/{owner}/{repo}/{path...}`
    fn repo_url(&self, repo: &RepoName, path: &[&str]) -> anyhow::Result<Url> {
        let segments = ["api", "v1", "repos", repo.owner(), repo.name()]
            .into_iter()
            .chain(path.iter().copied());
        endpoint(&self.base_url, segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", token.expose_secret()),
            ),
            None => builder,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> anyhow::Result<T> {
        let response = send(self.request(Method::GET, url)).await?;
        Ok(response.json().await.map_err(GiteaError::from)?)
    }

    async fn post_json<T: serde::Serialize>(&self, url: Url, body: &T) -> anyhow::Result<()> {
        send(self.request(Method::POST, url).json(body)).await?;
        Ok(())
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, GiteaError> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GiteaError::Status {
            status,
            body: error_body(response).await,
        })
    }
}

#[async_trait]
impl SourceControl for GiteaClient {
    async fn get_pull_request(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<PullRequest> {
        let url = self.repo_url(repo, &["pulls", &pr.to_string()])?;
        let payload: PullRequestResponse = self
            .get_json(url)
            .await
            .with_context(|| format!("Cannot load pull request {repo}#{pr}"))?;
        Ok(payload.into())
    }

    async fn get_pull_request_diff(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<String> {
        let url = self.repo_url(repo, &["pulls", &format!("{pr}.diff")])?;
        let response = send(self.request(Method::GET, url))
            .await
            .with_context(|| format!("Cannot load diff of pull request {repo}#{pr}"))?;
        Ok(response.text().await.map_err(GiteaError::from)?)
    }

    async fn find_related_pull_request(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
    ) -> anyhow::Result<Option<PullRequestNumber>> {
        let url = self.repo_url(repo, &["commits", sha.as_ref(), "pull"])?;
        match send(self.request(Method::GET, url)).await {
            Ok(response) => {
                let payload: RelatedPullRequestResponse =
                    response.json().await.map_err(GiteaError::from)?;
                Ok(Some(PullRequestNumber(payload.number)))
            }
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(anyhow::Error::from(error)
                .context(format!("Cannot find pull request of commit {repo}@{sha}"))),
        }
    }

    async fn post_pull_request_comment(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        text: &str,
    ) -> anyhow::Result<()> {
        let url = self.repo_url(repo, &["issues", &pr.to_string(), "comments"])?;
        self.post_json(url, &CommentRequest { body: text })
            .await
            .with_context(|| format!("Cannot post comment to {repo}#{pr}"))
    }

    /// All comments are sent as a single review, so Gitea notifies the author only once.
    async fn post_line_comments(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
        sha: &CommitSha,
        comments: &[LineComment],
    ) -> anyhow::Result<()> {
        if comments.is_empty() {
            return Ok(());
        }

        let url = self.repo_url(repo, &["pulls", &pr.to_string(), "reviews"])?;
        let review = ReviewRequest {
            commit_id: sha.as_ref(),
            event: "COMMENT",
            body: "",
            comments: comments
                .iter()
                .map(|comment| ReviewCommentRequest {
                    path: &comment.path,
                    new_position: comment.line,
                    body: &comment.comment,
                })
                .collect(),
        };
        self.post_json(url, &review)
            .await
            .with_context(|| format!("Cannot post line comments to {repo}#{pr}"))
    }

    async fn post_commit_comment(
        &self,
        repo: &RepoName,
        sha: &CommitSha,
        text: &str,
    ) -> anyhow::Result<()> {
        let url = self.repo_url(repo, &["commits", sha.as_ref(), "comments"])?;
        self.post_json(url, &CommentRequest { body: text })
            .await
            .with_context(|| format!("Cannot post comment to commit {repo}@{sha}"))
    }
}

#[derive(Deserialize)]
struct PullRequestResponse {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    head: HeadResponse,
    base: BaseResponse,
}

/// The head repository is `null` once a fork has been deleted, so only its commit is read.
#[derive(Deserialize)]
struct HeadResponse {
    sha: String,
}

#[derive(Deserialize)]
struct BaseResponse {
    repo: RepositoryResponse,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    name: String,
    owner: GiteaUser,
}

impl From<PullRequestResponse> for PullRequest {
    fn from(pr: PullRequestResponse) -> Self {
        PullRequest {
            number: pr.number.into(),
            title: pr.title,
            html_url: pr.html_url,
            head_sha: CommitSha(pr.head.sha),
            base_repository: RepoName::new(&pr.base.repo.owner.login, &pr.base.repo.name),
        }
    }
}

#[derive(Deserialize)]
struct RelatedPullRequestResponse {
    number: u64,
}

#[derive(serde::Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(serde::Serialize)]
struct ReviewRequest<'a> {
    commit_id: &'a str,
    event: &'static str,
    body: &'static str,
    comments: Vec<ReviewCommentRequest<'a>>,
}

#[derive(serde::Serialize)]
struct ReviewCommentRequest<'a> {
    path: &'a str,
    new_position: u64,
    body: &'a str,
}
