//! Connection settings for an OpenAI-compatible chat completions endpoint.

use secrecy::SecretString;

use foundry_types::llm::ProviderConfig;

/// Everything [`super::OpenAiCompatibleProvider`] needs to talk to one endpoint.
pub struct OpenAiCompatConfig {
    /// Name the gateway routes by (e.g. "groq", "deepseek").
    pub provider_name: String,
    /// Base URL including the version segment (e.g. "https://api.groq.com/openai/v1").
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    /// Used when the request carries no temperature of its own.
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl OpenAiCompatConfig {
    pub fn from_provider(config: &ProviderConfig, api_key: SecretString, model: String) -> Self {
        Self {
            provider_name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        }
    }
}
