//! OpenAI-compatible client configuration for the supported providers.

use crate::config::LlmProvider;
use crate::error::{AifaqError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for provider API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client for `provider` with the default timeout.
pub fn create_client(provider: LlmProvider) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(provider, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for `provider` with a custom timeout.
///
/// Fails when none of the provider's API key variables is set.
pub fn create_client_with_timeout(
    provider: LlmProvider,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let api_key = provider.api_key().ok_or_else(|| {
        AifaqError::Config(format!(
            "No API key for provider '{}'. Set {}.",
            provider,
            provider.api_key_vars().join(" or ")
        ))
    })?;

    let http_client = reqwest::Client::builder().timeout(timeout).build()?;
    let config = OpenAIConfig::new()
        .with_api_base(provider.api_base())
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}
