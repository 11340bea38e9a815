//! Chat notifications about pull request and issue activity.
use std::fmt::{Display, Formatter};

use axum::async_trait;

use crate::gitea::event::{IssueAction, IssueEvent, PullRequestAction, PullRequestEvent};

pub mod feishu;

pub use feishu::FeishuClient;

/// Delivers notifications to humans. Every method returns an error when the message could not
/// be delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_pull_request_created(
        &self,
        title: &str,
        url: &str,
        reviewers: &[String],
    ) -> anyhow::Result<()>;

    async fn send_reviewer_assigned(
        &self,
        title: &str,
        url: &str,
        reviewer: &str,
    ) -> anyhow::Result<()>;

    async fn send_issue_created(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()>;

    async fn send_issue_closed(&self, title: &str, url: &str, creator: &str)
        -> anyhow::Result<()>;

    async fn send_issue_assigned(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    PullRequestCreated {
        title: String,
        url: String,
        reviewers: Vec<String>,
    },
    ReviewerAssigned {
        title: String,
        url: String,
        reviewer: String,
    },
    IssueCreated {
        title: String,
        url: String,
        assignees: Vec<String>,
    },
    IssueClosed {
        title: String,
        url: String,
        creator: String,
    },
    IssueAssigned {
        title: String,
        url: String,
        assignees: Vec<String>,
    },
}

impl Notification {
    /// Picks the notification for a pull request event, if it deserves one.
    pub fn for_pull_request(event: &PullRequestEvent) -> Option<Self> {
        match (&event.action, &event.requested_reviewer) {
            (PullRequestAction::Opened, _) if !event.requested_reviewers.is_empty() => {
                Some(Notification::PullRequestCreated {
                    title: event.title.clone(),
                    url: event.url.clone(),
                    reviewers: event.requested_reviewers.clone(),
                })
            }
            (PullRequestAction::ReviewRequested, Some(reviewer)) => {
                Some(Notification::ReviewerAssigned {
                    title: event.title.clone(),
                    url: event.url.clone(),
                    reviewer: reviewer.clone(),
                })
            }
            _ => None,
        }
    }

    /// Picks the notification for an issue event, if it deserves one.
    pub fn for_issue(event: &IssueEvent) -> Option<Self> {
        let title = event.title.clone();
        let url = event.url.clone();
        match (&event.action, &event.creator) {
            (IssueAction::Opened, _) if !event.assignees.is_empty() => {
                Some(Notification::IssueCreated {
                    title,
                    url,
                    assignees: event.assignees.clone(),
                })
            }
            (IssueAction::Closed, Some(creator)) => Some(Notification::IssueClosed {
                title,
                url,
                creator: creator.clone(),
            }),
            (IssueAction::Assigned, _) if !event.assignees.is_empty() => {
                Some(Notification::IssueAssigned {
                    title,
                    url,
                    assignees: event.assignees.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PullRequestCreated { .. } => "pull_request_created",
            Notification::ReviewerAssigned { .. } => "reviewer_assigned",
            Notification::IssueCreated { .. } => "issue_created",
            Notification::IssueClosed { .. } => "issue_closed",
            Notification::IssueAssigned { .. } => "issue_assigned",
        }
    }

    pub async fn send(&self, notifier: &dyn Notifier) -> anyhow::Result<()> {
        match self {
            Notification::PullRequestCreated {
                title,
                url,
                reviewers,
            } => notifier.send_pull_request_created(title, url, reviewers).await,
            Notification::ReviewerAssigned {
                title,
                url,
                reviewer,
            } => notifier.send_reviewer_assigned(title, url, reviewer).await,
            Notification::IssueCreated {
                title,
                url,
                assignees,
            } => notifier.send_issue_created(title, url, assignees).await,
            Notification::IssueClosed {
                title,
                url,
                creator,
            } => notifier.send_issue_closed(title, url, creator).await,
            Notification::IssueAssigned {
                title,
                url,
                assignees,
            } => notifier.send_issue_assigned(title, url, assignees).await,
        }
    }
}

/// The chat message text.
impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::PullRequestCreated {
                title,
                url,
                reviewers,
            } => write!(
                f,
                "New pull request: {title}\nReviewers: {}\n{url}",
                reviewers.join(", ")
            ),
            Notification::ReviewerAssigned {
                title,
                url,
                reviewer,
            } => write!(
                f,
                "{reviewer}, your review was requested on: {title}\n{url}"
            ),
            Notification::IssueCreated {
                title,
                url,
                assignees,
            } => write!(
                f,
                "New issue: {title}\nAssignees: {}\n{url}",
                assignees.join(", ")
            ),
            Notification::IssueClosed {
                title,
                url,
                creator,
            } => write!(f, "{creator}, your issue was closed: {title}\n{url}"),
            Notification::IssueAssigned {
                title,
                url,
                assignees,
            } => write!(
                f,
                "Issue assigned to {}: {title}\n{url}",
                assignees.join(", ")
            ),
        }
    }
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

impl LogNotifier {
    fn log(&self, notification: Notification) -> anyhow::Result<()> {
        tracing::info!(
            kind = notification.kind(),
            "Notification (not delivered): {notification}"
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_pull_request_created(
        &self,
        title: &str,
        url: &str,
        reviewers: &[String],
    ) -> anyhow::Result<()> {
        self.log(Notification::PullRequestCreated {
            title: title.to_string(),
            url: url.to_string(),
            reviewers: reviewers.to_vec(),
        })
    }

    async fn send_reviewer_assigned(
        &self,
        title: &str,
        url: &str,
        reviewer: &str,
    ) -> anyhow::Result<()> {
        self.log(Notification::ReviewerAssigned {
            title: title.to_string(),
            url: url.to_string(),
            reviewer: reviewer.to_string(),
        })
    }

    async fn send_issue_created(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()> {
        self.log(Notification::IssueCreated {
            title: title.to_string(),
            url: url.to_string(),
            assignees: assignees.to_vec(),
        })
    }

    async fn send_issue_closed(
        &self,
        title: &str,
        url: &str,
        creator: &str,
    ) -> anyhow::Result<()> {
        self.log(Notification::IssueClosed {
            title: title.to_string(),
            url: url.to_string(),
            creator: creator.to_string(),
        })
    }

    async fn send_issue_assigned(
        &self,
        title: &str,
        url: &str,
        assignees: &[String],
    ) -> anyhow::Result<()> {
        self.log(Notification::IssueAssigned {
            title: title.to_string(),
            url: url.to_string(),
            assignees: assignees.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::payload::{issue, pull_request, PullRequestPayloadBuilder};

    fn pr_event(
        action: &str,
        build: impl FnOnce(PullRequestPayloadBuilder) -> PullRequestPayloadBuilder,
    ) -> PullRequestEvent {
        let body = build(pull_request(action)).create();
        PullRequestEvent::parse(PullRequestAction::from_payload(&body), &body).unwrap()
    }

    fn issue_event(action: &str, assignees: &[&str]) -> IssueEvent {
        IssueEvent::parse(&issue(action).assignees(assignees).create()).unwrap()
    }

    #[test]
    fn opened_pull_request_with_reviewers() {
        let event = pr_event("opened", |pr| pr.reviewers(&["alice", "bob"]));
        assert_eq!(
            Notification::for_pull_request(&event),
            Some(Notification::PullRequestCreated {
                title: event.title.clone(),
                url: event.url.clone(),
                reviewers: vec!["Alice".to_string(), "Bob".to_string()],
            })
        );
    }

    #[test]
    fn opened_pull_request_without_reviewers() {
        let event = pr_event("opened", |pr| pr);
        assert_eq!(Notification::for_pull_request(&event), None);
    }

    #[test]
    fn synchronized_pull_request_is_not_announced() {
        let event = pr_event("synchronize", |pr| pr.reviewers(&["alice", "bob"]));
        assert_eq!(Notification::for_pull_request(&event), None);
    }

    #[test]
    fn review_requested() {
        let event = pr_event("review_requested", |pr| pr.requested_reviewer("carol"));
        assert_eq!(
            Notification::for_pull_request(&event).map(|n| n.kind()),
            Some("reviewer_assigned")
        );
    }

    #[test]
    fn review_requested_without_reviewer() {
        let event = pr_event("review_requested", |pr| pr);
        assert_eq!(Notification::for_pull_request(&event), None);
    }

    #[test]
    fn issue_notifications() {
        let kind = |action: &str, assignees: &[&str]| {
            Notification::for_issue(&issue_event(action, assignees)).map(|n| n.kind())
        };
        assert_eq!(kind("opened", &["erin"]), Some("issue_created"));
        assert_eq!(kind("opened", &[]), None);
        assert_eq!(kind("closed", &[]), Some("issue_closed"));
        assert_eq!(kind("assigned", &["erin"]), Some("issue_assigned"));
        assert_eq!(kind("assigned", &[]), None);
        assert_eq!(kind("reopened", &["erin"]), None);
    }

    #[test]
    fn closed_issue_notifies_creator() {
        let notification = Notification::for_issue(&issue_event("closed", &[])).unwrap();
        assert!(matches!(
            notification,
            Notification::IssueClosed { ref creator, .. } if creator == "Dave"
        ));
    }

    #[test]
    fn render_pull_request_created() {
        let notification = Notification::PullRequestCreated {
            title: "Add gadgets".to_string(),
            url: "https://git.example.com/acme/widgets/pulls/1".to_string(),
            reviewers: vec!["Alice".to_string(), "Bob".to_string()],
        };
        insta::assert_snapshot!(notification.to_string(), @r"
        New pull request: Add gadgets
        Reviewers: Alice, Bob
        https://git.example.com/acme/widgets/pulls/1
        ");
    }

    #[test]
    fn render_issue_closed() {
        let notification = Notification::IssueClosed {
            title: "Crash on start".to_string(),
            url: "https://git.example.com/acme/widgets/issues/3".to_string(),
            creator: "Dave".to_string(),
        };
        insta::assert_snapshot!(notification.to_string(), @r"
        Dave, your issue was closed: Crash on start
        https://git.example.com/acme/widgets/issues/3
        ");
    }

    #[test]
    fn render_issue_assigned() {
        let notification = Notification::IssueAssigned {
            title: "Crash on start".to_string(),
            url: "https://git.example.com/acme/widgets/issues/3".to_string(),
            assignees: vec!["Erin".to_string()],
        };
        insta::assert_snapshot!(notification.to_string(), @r"
        Issue assigned to Erin: Crash on start
        https://git.example.com/acme/widgets/issues/3
        ");
    }
}
