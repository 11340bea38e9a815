use std::sync::Arc;

use axum::async_trait;

use crate::bot::{PullRequestSnapshot, PullRequestSource, SourceControl};
use crate::gitea::{CommitSha, PullRequestNumber, RepoName};

/// Head commit of the simulated pull request.
pub const SIMULATED_HEAD_SHA: &str = "abcd1234abcd1234abcd1234abcd1234abcd1234";

/// Diff of the simulated pull request. It contains an obvious security problem, so that the
/// review backend has something to comment on.
pub const SIMULATED_DIFF: &str = "\
diff --git a/test.js b/test.js
index 1234567..abcdefg 100644
--- a/test.js
+++ b/test.js
@@ -1,5 +1,9 @@
 function add(a, b) {
-  return a + b;
+  return a + b; // adds two numbers
 }

-console.log(add(1, 2));
+// unsafe handling of user data
+function processUserData(data) {
+  eval(data); // security problem
+}
+console.log(add(1, 2));";

/// Loads pull request details and diffs from the source-control platform.
pub struct GiteaPullRequestSource {
    api: Arc<dyn SourceControl>,
}

impl GiteaPullRequestSource {
    pub fn new(api: Arc<dyn SourceControl>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PullRequestSource for GiteaPullRequestSource {
    async fn load(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<PullRequestSnapshot> {
        let (details, diff) = tokio::try_join!(
            self.api.get_pull_request(repo, pr),
            self.api.get_pull_request_diff(repo, pr)
        )?;
        tracing::info!(
            url = %details.html_url,
            "Loaded pull request {repo}#{pr} at {}: {}",
            details.head_sha,
            details.title
        );
        Ok(PullRequestSnapshot {
            head_sha: details.head_sha,
            diff,
        })
    }
}

/// Pretends that every pull request consists of [`SIMULATED_DIFF`].
pub struct SimulatedPullRequestSource;

#[async_trait]
impl PullRequestSource for SimulatedPullRequestSource {
    async fn load(
        &self,
        repo: &RepoName,
        pr: PullRequestNumber,
    ) -> anyhow::Result<PullRequestSnapshot> {
        tracing::info!("Using simulated data for pull request {repo}#{pr}");
        Ok(PullRequestSnapshot {
            head_sha: CommitSha(SIMULATED_HEAD_SHA.to_string()),
            diff: SIMULATED_DIFF.to_string(),
        })
    }
}
