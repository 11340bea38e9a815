//! Classification and parsing of the webhook events the bot reacts to.
use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::Value;

use crate::gitea::{CommitSha, GiteaUser, PullRequestNumber, RepoName};
use crate::review::{FileChange, FileStatus};

/// The family of a webhook event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    PullRequest,
    Status,
    Issue,
    Unknown,
}

impl EventKind {
    fn from_header(value: &str) -> Option<Self> {
        match value {
            "pull_request" => Some(EventKind::PullRequest),
            "status" => Some(EventKind::Status),
            "issues" => Some(EventKind::Issue),
            _ => None,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::PullRequest => f.write_str("pull_request"),
            EventKind::Status => f.write_str("status"),
            EventKind::Issue => f.write_str("issues"),
            EventKind::Unknown => f.write_str("unknown"),
        }
    }
}

/// Decides which event family a webhook belongs to.
///
/// A recognized event header always wins. Otherwise the shape of the body decides, checking
/// for a pull request, then for a commit status, then for an issue.
pub fn classify(event_type: Option<&str>, body: &Value) -> EventKind {
    if let Some(kind) = event_type.and_then(EventKind::from_header) {
        return kind;
    }

    if is_present(body.get("pull_request")) {
        EventKind::PullRequest
    } else if is_present(body.get("state"))
        && (is_present(body.get("sha")) || is_present(body.get("commit")))
    {
        EventKind::Status
    } else if is_present(body.get("issue")) {
        EventKind::Issue
    } else {
        EventKind::Unknown
    }
}

/// Null, `false`, zero and empty strings count as absent.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|number| number != 0.0),
        Some(Value::String(value)) => !value.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid webhook payload: {0}")]
pub struct MalformedPayload(String);

impl From<serde_json::Error> for MalformedPayload {
    fn from(error: serde_json::Error) -> Self {
        Self(error.to_string())
    }
}

fn action_of(body: &Value) -> &str {
    body.get("action").and_then(Value::as_str).unwrap_or_default()
}

#[derive(Deserialize, Debug)]
struct RepositoryPayload {
    owner: GiteaUser,
    name: String,
}

impl From<RepositoryPayload> for RepoName {
    fn from(value: RepositoryPayload) -> Self {
        RepoName::new(&value.owner.login, &value.name)
    }
}

fn display_names(users: Option<Vec<GiteaUser>>) -> Vec<String> {
    users
        .unwrap_or_default()
        .iter()
        .map(|user| user.display_name().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronize,
    Edited,
    ReviewRequested,
    Other(String),
}

impl PullRequestAction {
    pub fn from_payload(body: &Value) -> Self {
        match action_of(body) {
            "opened" => Self::Opened,
            "reopened" => Self::Reopened,
            // Gitea reports new pushes as `synchronized`
            "synchronize" | "synchronized" => Self::Synchronize,
            "edited" => Self::Edited,
            "review_requested" => Self::ReviewRequested,
            other => Self::Other(other.to_string()),
        }
    }

    /// Does this action change the code (or the reviewers) of the pull request?
    pub fn triggers_review(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Display for PullRequestAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => f.write_str("opened"),
            Self::Reopened => f.write_str("reopened"),
            Self::Synchronize => f.write_str("synchronize"),
            Self::Edited => f.write_str("edited"),
            Self::ReviewRequested => f.write_str("review_requested"),
            Self::Other(action) => f.write_str(action),
        }
    }
}

#[derive(Deserialize, Debug)]
struct PullRequestPayload {
    pull_request: Option<PullRequestInfo>,
    repository: Option<RepositoryPayload>,
    requested_reviewer: Option<GiteaUser>,
}

#[derive(Deserialize, Debug)]
struct PullRequestInfo {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    requested_reviewers: Option<Vec<GiteaUser>>,
}

#[derive(Clone, Debug)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub repository: RepoName,
    pub number: PullRequestNumber,
    pub title: String,
    pub url: String,
    /// Display names of all reviewers requested on the pull request.
    pub requested_reviewers: Vec<String>,
    /// The reviewer whose request has triggered a `review_requested` event.
    pub requested_reviewer: Option<String>,
}

impl PullRequestEvent {
    pub fn parse(action: PullRequestAction, body: &Value) -> Result<Self, MalformedPayload> {
        let payload = PullRequestPayload::deserialize(body)?;
        let (Some(pull_request), Some(repository)) = (payload.pull_request, payload.repository)
        else {
            return Err(MalformedPayload(
                "pull request event without a pull request or repository".to_string(),
            ));
        };

        Ok(Self {
            action,
            repository: repository.into(),
            number: pull_request.number.into(),
            title: pull_request.title,
            url: pull_request.html_url,
            requested_reviewers: display_names(pull_request.requested_reviewers),
            requested_reviewer: payload
                .requested_reviewer
                .map(|user| user.display_name().to_string())
                .filter(|name| !name.is_empty()),
        })
    }
}

#[derive(Deserialize, Debug)]
struct StatusPayload {
    #[serde(default)]
    sha: Option<String>,
    commit: CommitPayload,
    repository: RepositoryPayload,
}

#[derive(Deserialize, Debug)]
struct CommitPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    added: Option<Vec<String>>,
    #[serde(default)]
    modified: Option<Vec<String>>,
    #[serde(default)]
    removed: Option<Vec<String>>,
}

/// Files touched by a commit, as reported by the status webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl CommitChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// The webhook only carries file names, so the line statistics are left at zero.
    pub fn file_changes(&self) -> Vec<FileChange> {
        let with_status = |files: &[String], status: FileStatus| {
            files
                .iter()
                .map(move |file| FileChange::without_stats(file, status))
                .collect::<Vec<_>>()
        };
        itertools::concat([
            with_status(&self.added, FileStatus::Added),
            with_status(&self.modified, FileStatus::Modified),
            with_status(&self.removed, FileStatus::Removed),
        ])
    }
}

#[derive(Clone, Debug)]
pub struct StatusEvent {
    pub repository: RepoName,
    pub sha: CommitSha,
    pub state: StatusState,
    pub message: String,
    pub changes: CommitChanges,
}

impl StatusEvent {
    /// Reads the state of a status payload, checking only that the commit, repository and
    /// state are present. The rest of the payload is not validated.
    pub fn state_of(body: &Value) -> Result<StatusState, MalformedPayload> {
        if !(is_present(body.get("commit"))
            && is_present(body.get("repository"))
            && is_present(body.get("state")))
        {
            return Err(MalformedPayload(
                "status event without a commit, repository or state".to_string(),
            ));
        }
        Ok(match &body["state"] {
            Value::String(state) => StatusState(state.clone()),
            other => StatusState(other.to_string()),
        })
    }

    pub fn parse(body: &Value) -> Result<Self, MalformedPayload> {
        let state = Self::state_of(body)?;
        let payload = StatusPayload::deserialize(body)?;
        // Older Gitea versions only send the commit id
        let Some(sha) = payload
            .sha
            .filter(|sha| !sha.is_empty())
            .or(payload.commit.id.filter(|id| !id.is_empty()))
        else {
            return Err(MalformedPayload("status event without a commit SHA".to_string()));
        };

        Ok(Self {
            repository: payload.repository.into(),
            sha: CommitSha(sha),
            state,
            message: payload.commit.message.unwrap_or_default(),
            changes: CommitChanges {
                added: payload.commit.added.unwrap_or_default(),
                modified: payload.commit.modified.unwrap_or_default(),
                removed: payload.commit.removed.unwrap_or_default(),
            },
        })
    }
}

/// State of a commit status (`pending`, `success`, `failure`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusState(pub String);

impl StatusState {
    /// Only commits whose checks have passed are worth reviewing.
    pub fn is_success(&self) -> bool {
        self.0 == "success"
    }
}

impl Display for StatusState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueAction {
    Opened,
    Closed,
    Assigned,
    Other(String),
}

impl IssueAction {
    fn from_payload(body: &Value) -> Self {
        match action_of(body) {
            "opened" => Self::Opened,
            "closed" => Self::Closed,
            "assigned" => Self::Assigned,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for IssueAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => f.write_str("opened"),
            Self::Closed => f.write_str("closed"),
            Self::Assigned => f.write_str("assigned"),
            Self::Other(action) => f.write_str(action),
        }
    }
}

#[derive(Deserialize, Debug)]
struct IssuePayload {
    issue: IssueInfo,
}

#[derive(Deserialize, Debug)]
struct IssueInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: Option<GiteaUser>,
    #[serde(default)]
    assignees: Option<Vec<GiteaUser>>,
}

#[derive(Clone, Debug)]
pub struct IssueEvent {
    pub action: IssueAction,
    pub title: String,
    pub url: String,
    pub creator: Option<String>,
    pub assignees: Vec<String>,
}

impl IssueEvent {
    pub fn parse(body: &Value) -> Result<Self, MalformedPayload> {
        if !(is_present(body.get("issue")) && is_present(body.get("repository"))) {
            return Err(MalformedPayload(
                "issue event without an issue or repository".to_string(),
            ));
        }

        let IssuePayload { issue } = IssuePayload::deserialize(body)?;
        Ok(Self {
            action: IssueAction::from_payload(body),
            title: issue.title,
            url: issue.html_url,
            creator: issue
                .user
                .map(|user| user.display_name().to_string())
                .filter(|name| !name.is_empty()),
            assignees: display_names(issue.assignees),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tests::payload::{issue, pull_request, status};

    #[test]
    fn header_takes_priority() {
        let body = json!({ "pull_request": { "number": 1 }, "state": "success", "sha": "abc" });
        assert_eq!(classify(Some("pull_request"), &body), EventKind::PullRequest);
        assert_eq!(classify(Some("status"), &body), EventKind::Status);
        assert_eq!(classify(Some("issues"), &json!({})), EventKind::Issue);
    }

    #[test]
    fn pull_request_body_without_header() {
        let body = pull_request("opened").create();
        assert_eq!(classify(None, &body), EventKind::PullRequest);
    }

    #[test]
    fn pull_request_body_with_state_and_explicit_header() {
        let mut body = pull_request("opened").create();
        body["state"] = json!("success");
        body["sha"] = json!("abc");
        assert_eq!(classify(Some("pull_request"), &body), EventKind::PullRequest);
        // Without the header the pull request sub-object still wins
        assert_eq!(classify(None, &body), EventKind::PullRequest);
    }

    #[test]
    fn unrecognized_header_falls_back_to_body() {
        let body = status("success").create();
        assert_eq!(classify(Some("push"), &body), EventKind::Status);
    }

    #[test]
    fn status_body_needs_state_and_commit() {
        assert_eq!(
            classify(None, &json!({ "state": "success", "sha": "abc" })),
            EventKind::Status
        );
        assert_eq!(
            classify(None, &json!({ "state": "success", "commit": { "id": "abc" } })),
            EventKind::Status
        );
        assert_eq!(classify(None, &json!({ "state": "success" })), EventKind::Unknown);
        assert_eq!(
            classify(None, &json!({ "state": "", "sha": "abc" })),
            EventKind::Unknown
        );
    }

    #[test]
    fn issue_body_without_header() {
        assert_eq!(classify(None, &issue("opened").create()), EventKind::Issue);
    }

    #[test]
    fn unknown_body() {
        assert_eq!(classify(None, &json!({ "ref": "refs/heads/main" })), EventKind::Unknown);
        assert_eq!(classify(None, &json!({ "pull_request": null })), EventKind::Unknown);
        assert_eq!(classify(None, &json!([])), EventKind::Unknown);
    }

    #[test]
    fn parse_pull_request_event() {
        let body = pull_request("review_requested")
            .number(12)
            .reviewers(&["alice", "bob"])
            .requested_reviewer("carol")
            .create();
        let event = PullRequestEvent::parse(PullRequestAction::from_payload(&body), &body).unwrap();
        assert_eq!(event.action, PullRequestAction::ReviewRequested);
        assert_eq!(event.number, PullRequestNumber(12));
        assert_eq!(event.repository, RepoName::new("acme", "widgets"));
        assert_eq!(event.requested_reviewers, vec!["Alice", "Bob"]);
        assert_eq!(event.requested_reviewer.as_deref(), Some("Carol"));
    }

    #[test]
    fn parse_pull_request_without_repository() {
        let mut body = pull_request("opened").create();
        body["repository"] = Value::Null;
        assert!(PullRequestEvent::parse(PullRequestAction::Opened, &body).is_err());
    }

    #[test]
    fn synchronized_action() {
        assert_eq!(
            PullRequestAction::from_payload(&json!({ "action": "synchronized" })),
            PullRequestAction::Synchronize
        );
        assert!(!PullRequestAction::from_payload(&json!({ "action": "closed" })).triggers_review());
        assert!(!PullRequestAction::from_payload(&json!({})).triggers_review());
    }

    #[test]
    fn parse_status_event() {
        let body = status("success")
            .added(&["a.rs"])
            .modified(&["b.rs", "c.rs"])
            .removed(&["d.rs"])
            .create();
        let event = StatusEvent::parse(&body).unwrap();
        assert!(event.state.is_success());
        assert_eq!(event.repository, RepoName::new("acme", "widgets"));
        assert_eq!(event.changes.modified, vec!["b.rs", "c.rs"]);

        let statuses = event
            .changes
            .file_changes()
            .into_iter()
            .map(|change| (change.filename, change.status, change.changes))
            .collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![
                ("a.rs".to_string(), FileStatus::Added, 0),
                ("b.rs".to_string(), FileStatus::Modified, 0),
                ("c.rs".to_string(), FileStatus::Modified, 0),
                ("d.rs".to_string(), FileStatus::Removed, 0),
            ]
        );
    }

    #[test]
    fn status_sha_falls_back_to_commit_id() {
        let mut body = status("success").create();
        body["sha"] = Value::Null;
        body["commit"]["id"] = json!("0123abcd");
        let event = StatusEvent::parse(&body).unwrap();
        assert_eq!(event.sha, CommitSha("0123abcd".to_string()));
    }

    #[test]
    fn status_without_commit_is_malformed() {
        let mut body = status("success").create();
        body["commit"] = Value::Null;
        assert!(StatusEvent::parse(&body).is_err());
    }

    #[test]
    fn missing_change_lists_are_empty() {
        let body = json!({
            "state": "pending",
            "sha": "abc",
            "commit": { "id": "abc" },
            "repository": { "name": "widgets", "owner": { "login": "acme" } }
        });
        let event = StatusEvent::parse(&body).unwrap();
        assert!(event.changes.is_empty());
        assert!(!event.state.is_success());
    }

    #[test]
    fn pending_state_without_sha() {
        let mut body = status("pending").create();
        body["sha"] = Value::Null;
        body["commit"]["id"] = Value::Null;
        let state = StatusEvent::state_of(&body).unwrap();
        assert_eq!(state, StatusState("pending".to_string()));
        assert!(StatusEvent::parse(&body).is_err());
    }

    #[test]
    fn non_string_state_is_not_success() {
        let mut body = status("success").create();
        body["state"] = json!(1);
        let state = StatusEvent::state_of(&body).unwrap();
        assert!(!state.is_success());
    }

    #[test]
    fn state_needs_repository() {
        let mut body = status("pending").create();
        body["repository"] = Value::Null;
        assert!(StatusEvent::state_of(&body).is_err());
    }

    #[test]
    fn parse_issue_event() {
        let body = issue("assigned").assignees(&["alice"]).create();
        let event = IssueEvent::parse(&body).unwrap();
        assert_eq!(event.action, IssueAction::Assigned);
        assert_eq!(event.assignees, vec!["Alice"]);
        assert_eq!(event.creator.as_deref(), Some("Dave"));
    }

    #[test]
    fn issue_without_repository_is_malformed() {
        let mut body = issue("opened").create();
        body.as_object_mut().unwrap().remove("repository");
        assert!(IssueEvent::parse(&body).is_err());
    }
}
