use anyhow::Error;
use tracing::span::Span;

/// Reports errors of work that has nobody to return them to, such as detached reviews.
pub trait LogError {
    fn log_error(&self, error: Error);
}

impl LogError for Span {
    fn log_error(&self, error: Error) {
        self.in_scope(|| {
            tracing::error!("Background task has failed: {error:?}");
        });
    }
}
