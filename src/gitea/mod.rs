//! Contains definitions of common types (pull request, user, repository name) needed
//! for working with Gitea repositories.
use std::fmt::{Debug, Display, Formatter};

pub mod api;
pub mod event;
pub mod webhook;

pub use webhook::WebhookSecret;

/// Unique identifier of a Gitea repository
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct RepoName {
    owner: String,
    name: String,
}

impl RepoName {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for RepoName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}/{}", self.owner, self.name))
    }
}

/// A Gitea user as it appears in webhook payloads and API responses.
#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct GiteaUser {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub login: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl GiteaUser {
    /// The name shown to humans: the full name if the user has set one, the login otherwise.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(full_name) if !full_name.is_empty() => full_name,
            _ => &self.login,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommitSha(pub String);

impl From<String> for CommitSha {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl AsRef<str> for CommitSha {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
impl Display for CommitSha {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PullRequestNumber(pub u64);

impl From<u64> for PullRequestNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for PullRequestNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        <u64 as Display>::fmt(&self.0, f)
    }
}

/// Pull request details loaded from the Gitea API.
#[derive(Clone, Debug)]
pub struct PullRequest {
    pub number: PullRequestNumber,
    pub title: String,
    pub html_url: String,
    pub head_sha: CommitSha,
    /// Repository that the pull request targets.
    pub base_repository: RepoName,
}
