//! This is the library of the review bot.
//!
//! It receives Gitea webhooks, sends chat notifications for pull request and issue
//! activity and runs AI code reviews whose results are written back to Gitea.
pub mod bot;
pub mod config;
pub mod gitea;
pub mod notify;
pub mod review;
pub mod server;
pub mod utils;

pub use bot::{BotContext, CommitReviewMode, SourceControl};
pub use config::Mode;
pub use gitea::webhook::{SignatureVerifier, WebhookSecret};
pub use server::{create_app, ServerState};

#[cfg(test)]
mod tests;
