//! Client construction from configuration.
//!
//! Picks the endpoint from the resolved config and layers the retry policy
//! on top of the HTTP client.

use std::sync::Arc;
use std::time::Duration;

use agentry_config::{AppConfig, BRAINTRUST_PROXY_URL, OPENAI_BASE_URL};
use agentry_core::error::CompletionError;
use agentry_core::provider::CompletionClient;

use crate::openai_compat::OpenAiCompatClient;
use crate::retry::{RetryPolicy, RetryingClient};

/// Build the completion client described by `config`.
///
/// Fails with `NotConfigured` when no API key is available.
pub fn build_client(config: &AppConfig) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        CompletionError::NotConfigured(
            "no API key; set OPENAI_API_KEY, BRAINTRUST_API_KEY or AGENTRY_API_KEY".into(),
        )
    })?;

    let base_url = config.endpoint();
    let http = OpenAiCompatClient::new(
        client_label(base_url),
        base_url,
        api_key,
        Duration::from_secs(config.connection.request_timeout_secs),
    )?;

    tracing::debug!(client = %http.name(), base_url = %http.base_url(), "Built completion client");

    let policy = RetryPolicy::from(&config.retry);
    if policy.max_retries == 0 {
        return Ok(Arc::new(http));
    }
    Ok(Arc::new(RetryingClient::new(Arc::new(http), policy)))
}

/// Name a client after its well-known endpoint.
fn client_label(base_url: &str) -> &'static str {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed == OPENAI_BASE_URL {
        "openai"
    } else if trimmed == BRAINTRUST_PROXY_URL {
        "braintrust"
    } else if trimmed.contains("localhost") || trimmed.contains("127.0.0.1") {
        "local"
    } else {
        "custom"
    }
}
