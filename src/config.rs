use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default timeout of requests sent to the Gitea API and to the chat webhook.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout of a single review backend request. Reviews of large diffs are slow.
pub const DEFAULT_REVIEW_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime mode of the bot.
///
/// In development mode, unsigned webhooks are accepted, pull request data is simulated,
/// review results are only logged and commit reviews are not executed at all. This makes it
/// possible to exercise the whole pipeline without live credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool {
        matches!(self, Mode::Development)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}
