//! LLM provider implementations.
//!
//! Concrete [`LlmProvider`](foundry_core::llm::provider::LlmProvider)
//! backends plus the factory that turns the `[[providers]]` config table
//! into the list handed to the gateway.

pub mod ollama;
pub mod openai_compat;

use secrecy::SecretString;

use foundry_core::llm::box_provider::BoxLlmProvider;
use foundry_types::llm::{LlmError, ProviderConfig, ProviderKind};

use self::ollama::OllamaProvider;
use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] from one config entry.
///
/// `api_key` is the already-resolved secret; remote providers fail with
/// `AuthenticationFailed` without one. `model` overrides `config.model`.
pub fn create_provider(
    config: &ProviderConfig,
    api_key: Option<SecretString>,
    model: Option<String>,
) -> Result<BoxLlmProvider, LlmError> {
    let model = model.unwrap_or_else(|| config.model.clone());
    match config.kind {
        ProviderKind::OpenAiCompatible => {
            let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
            let provider =
                OpenAiCompatibleProvider::new(OpenAiCompatConfig::from_provider(config, key, model));
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderKind::Ollama => Ok(BoxLlmProvider::new(OllamaProvider::new(config, model))),
    }
}

/// Build every usable provider, reading keys and model overrides from the
/// process environment.
pub fn build_providers(configs: &[ProviderConfig]) -> Vec<BoxLlmProvider> {
    build_providers_with(configs, |var| std::env::var(var).ok())
}

/// Like [`build_providers`] with an injectable variable lookup.
///
/// Disabled entries are skipped silently. Entries whose key variable is
/// unset or empty are skipped with a warning; the gateway then never sees
/// them and routes past them.
pub fn build_providers_with(
    configs: &[ProviderConfig],
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<BoxLlmProvider> {
    let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    let mut providers = Vec::new();
    for config in configs.iter().filter(|c| c.enabled) {
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(non_empty)
            .map(SecretString::from);
        let model = config.model_env.as_deref().and_then(non_empty);

        if config.kind == ProviderKind::OpenAiCompatible && api_key.is_none() {
            tracing::warn!(
                provider = %config.name,
                key_var = config.api_key_env.as_deref().unwrap_or("<none>"),
                "API key not set, provider unavailable"
            );
            continue;
        }

        match create_provider(config, api_key, model) {
            Ok(provider) => {
                tracing::debug!(provider = %provider.name(), model = %provider.model(), "Provider configured");
                providers.push(provider);
            }
            Err(e) => {
                tracing::warn!(provider = %config.name, error = %e, "Provider could not be created");
            }
        }
    }
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_types::llm::default_providers;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_keys_leave_only_ollama() {
        let vars = env(&[]);
        let providers = build_providers_with(&default_providers(), |k| vars.get(k).cloned());
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ollama"]);
    }

    #[test]
    fn test_keys_enable_remote_providers() {
        let vars = env(&[("GROQ_API_KEY", "gsk-1"), ("GEMINI_API_KEY", "g-2"), ("DEEPSEEK_API_KEY", "  ")]);
        let providers = build_providers_with(&default_providers(), |k| vars.get(k).cloned());
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert!(names.contains(&"groq"));
        assert!(names.contains(&"gemini"));
        assert!(!names.contains(&"deepseek"));
    }

    #[test]
    fn test_model_override_and_disabled() {
        let mut configs = default_providers();
        for c in configs.iter_mut() {
            if c.name == "groq" {
                c.enabled = false;
            }
        }
        let vars = env(&[("GROQ_API_KEY", "gsk-1"), ("OLLAMA_MODEL", "llama3.2")]);
        let providers = build_providers_with(&configs, |k| vars.get(k).cloned());

        assert!(providers.iter().all(|p| p.name() != "groq"));
        let ollama = providers.iter().find(|p| p.name() == "ollama").unwrap();
        assert_eq!(ollama.model(), "llama3.2");
    }

    #[test]
    fn test_create_provider_requires_key_for_remote() {
        let groq = default_providers()
            .into_iter()
            .find(|c| c.name == "groq")
            .unwrap();
        assert!(matches!(
            create_provider(&groq, None, None),
            Err(LlmError::AuthenticationFailed)
        ));
        let provider = create_provider(&groq, Some(SecretString::from("k")), None).unwrap();
        assert_eq!(provider.model(), "llama-3.3-70b-versatile");
    }
}
