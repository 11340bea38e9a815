use reqwest::StatusCode;

pub mod client;

pub use client::GiteaClient;

#[derive(thiserror::Error, Debug)]
pub enum GiteaError {
    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gitea responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl GiteaError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GiteaError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }
        )
    }
}
