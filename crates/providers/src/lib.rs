//! Completion client implementations for Agentry.
//!
//! All clients implement the `agentry_core::CompletionClient` trait.
//! [`build_client`] assembles the configured client with its retry layer.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use router::build_client;
