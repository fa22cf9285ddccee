//! Configuration loader for Foundry.
//!
//! Reads `config.toml` from the data directory (`~/.foundry/` in production)
//! and deserializes it into [`FoundryConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use foundry_types::config::FoundryConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Process-wide provider override, applied over `[gateway] preferred_provider`.
pub const PREFERRED_PROVIDER_ENV: &str = "PREFERRED_LLM";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`FoundryConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> FoundryConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return FoundryConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return FoundryConfig::default();
        }
    };

    match toml::from_str::<FoundryConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            FoundryConfig::default()
        }
    }
}

/// Apply environment overrides read from the process environment.
pub fn apply_env_overrides(config: &mut FoundryConfig) {
    apply_env_overrides_with(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides through `lookup`.
pub fn apply_env_overrides_with(config: &mut FoundryConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(preferred) = lookup(PREFERRED_PROVIDER_ENV) {
        let preferred = preferred.trim();
        if !preferred.is_empty() {
            tracing::debug!(provider = %preferred, "Preferred provider set from environment");
            config.gateway.preferred_provider = Some(preferred.to_string());
        }
    }
}
