use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, Span};

use crate::utils::logging::LogError;

/// A review running in the background, detached from the webhook that started it.
#[derive(Debug)]
pub struct ReviewHandle(JoinHandle<()>);

impl ReviewHandle {
    pub fn abort(&self) {
        self.0.abort();
    }

    /// Waits until the review finishes. Review errors are logged by the task itself, so this
    /// only fails if the task panicked or was aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.0.await
    }
}

/// Starts `review` on the runtime inside `span`. A failure is logged within the span and goes
/// nowhere else.
pub fn spawn_review<F>(span: Span, review: F) -> ReviewHandle
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let task_span = span.clone();
    let handle = tokio::spawn(
        async move {
            if let Err(error) = review.await {
                span.log_error(error);
            }
        }
        .instrument(task_span),
    );
    ReviewHandle(handle)
}
