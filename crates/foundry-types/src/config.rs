//! Global configuration types for Foundry.
//!
//! `FoundryConfig` represents the top-level `config.toml` in the data
//! directory: provider backends, the gateway route table, sandbox limits,
//! worker runtime limits, and email settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::{ProviderConfig, TaskKind, default_providers};

/// Top-level configuration for Foundry.
///
/// Loaded from `~/.foundry/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider backends available to the gateway, referenced by name from routes.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

impl Default for FoundryConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            providers: default_providers(),
            sandbox: SandboxConfig::default(),
            worker: WorkerConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

/// Routing table and backoff policy for the provider gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Seconds a rate-limited provider is skipped for every task kind.
    #[serde(default = "default_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// Provider moved to the front of every route that contains it.
    /// `PREFERRED_LLM` in the environment takes precedence.
    #[serde(default)]
    pub preferred_provider: Option<String>,

    /// Task kind (snake_case) -> ordered provider names.
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, Vec<String>>,

    /// Task kind (snake_case) -> output token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: BTreeMap<String, u32>,
}

impl GatewayConfig {
    /// Ordered provider names for a task kind. Kinds missing from a
    /// user-supplied table fall back to the built-in route.
    pub fn route_for(&self, kind: TaskKind) -> Vec<String> {
        self.routes
            .get(kind.as_str())
            .cloned()
            .or_else(|| default_routes().remove(kind.as_str()))
            .unwrap_or_default()
    }

    pub fn max_tokens_for(&self, kind: TaskKind) -> u32 {
        self.max_tokens
            .get(kind.as_str())
            .copied()
            .or_else(|| default_max_tokens().get(kind.as_str()).copied())
            .unwrap_or(600)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown_secs: default_cooldown_secs(),
            preferred_provider: None,
            routes: default_routes(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_routes() -> BTreeMap<String, Vec<String>> {
    let route = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        (
            TaskKind::CodeWriting.to_string(),
            route(&["groq", "ollama", "deepseek", "gemini", "hf_router"]),
        ),
        (
            TaskKind::PromptGeneration.to_string(),
            route(&["groq", "ollama", "gemini", "deepseek", "hf_router"]),
        ),
        (
            TaskKind::ToolIdentification.to_string(),
            route(&["groq", "ollama", "gemini", "deepseek", "hf_router"]),
        ),
        (
            TaskKind::AgentStep.to_string(),
            route(&["groq", "ollama", "hf_router"]),
        ),
    ])
}

fn default_max_tokens() -> BTreeMap<String, u32> {
    BTreeMap::from([
        (TaskKind::CodeWriting.to_string(), 700),
        (TaskKind::PromptGeneration.to_string(), 600),
        (TaskKind::ToolIdentification.to_string(), 400),
        (TaskKind::AgentStep.to_string(), 800),
    ])
}

/// Limits for validating and running synthesized capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter used for capability source records and the smoke driver.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Hard wall-clock limit for a smoke test.
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,

    /// Wall-clock limit for one capability call made by a running worker.
    #[serde(default = "default_invoke_timeout_secs")]
    pub invoke_timeout_secs: u64,

    /// Environment flag that forces capabilities into mock mode.
    #[serde(default = "default_mock_env_var")]
    pub mock_env_var: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_sandbox_timeout_secs(),
            invoke_timeout_secs: default_invoke_timeout_secs(),
            mock_env_var: default_mock_env_var(),
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_sandbox_timeout_secs() -> u64 {
    15
}

fn default_invoke_timeout_secs() -> u64 {
    60
}

fn default_mock_env_var() -> String {
    "TOOL_TEST_MODE".to_string()
}

/// Limits for the worker runtime loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum model turns per run before the run is failed.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> u32 {
    6
}

/// Mail settings for the `send_email` and `read_email` built-ins.
/// Credentials come from the environment variables named here, never from
/// the file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Unset derives the IMAP host from `smtp_host`.
    #[serde(default)]
    pub imap_host: Option<String>,

    #[serde(default = "default_imap_port")]
    pub imap_port: u16,

    #[serde(default = "default_sender_env")]
    pub sender_env: String,

    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl EmailConfig {
    /// `imap_host`, else `smtp_host` with its `smtp.` label swapped for `imap.`.
    pub fn resolved_imap_host(&self) -> String {
        match &self.imap_host {
            Some(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => self.smtp_host.replacen("smtp.", "imap.", 1),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            imap_host: None,
            imap_port: default_imap_port(),
            sender_env: default_sender_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_imap_port() -> u16 {
    993
}

fn default_sender_env() -> String {
    "EMAIL_SENDER".to_string()
}

fn default_password_env() -> String {
    "EMAIL_APP_PASSWORD".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = FoundryConfig::default();
        assert_eq!(config.gateway.rate_limit_cooldown_secs, 60);
        assert_eq!(config.sandbox.timeout_secs, 15);
        assert_eq!(config.sandbox.mock_env_var, "TOOL_TEST_MODE");
        assert_eq!(config.providers.len(), 5);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: FoundryConfig = toml::from_str("").unwrap();
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.email.imap_port, 993);
        assert_eq!(
            config.gateway.route_for(TaskKind::PromptGeneration),
            vec!["groq", "ollama", "gemini", "deepseek", "hf_router"]
        );
    }

    #[test]
    fn test_partial_routes_fall_back_per_kind() {
        let toml_str = r#"
[gateway]
preferred_provider = "ollama"

[gateway.routes]
code_writing = ["ollama"]
"#;
        let config: FoundryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.preferred_provider.as_deref(), Some("ollama"));
        assert_eq!(config.gateway.route_for(TaskKind::CodeWriting), vec!["ollama"]);
        assert_eq!(
            config.gateway.route_for(TaskKind::ToolIdentification).first().map(String::as_str),
            Some("groq")
        );
    }

    #[test]
    fn test_max_tokens_per_kind() {
        let gateway = GatewayConfig::default();
        assert_eq!(gateway.max_tokens_for(TaskKind::CodeWriting), 700);
        assert_eq!(gateway.max_tokens_for(TaskKind::PromptGeneration), 600);
        assert_eq!(gateway.max_tokens_for(TaskKind::ToolIdentification), 400);
    }

    #[test]
    fn test_custom_provider_table() {
        let toml_str = r#"
[[providers]]
name = "local"
kind = "ollama"
base_url = "http://127.0.0.1:11434"
model = "llama3"
"#;
        let config: FoundryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "local");
        assert_eq!(config.providers[0].timeout_secs, 60);
        assert!(config.providers[0].enabled);
    }

    #[test]
    fn test_imap_host_derived_from_smtp_host() {
        let mut email = EmailConfig::default();
        assert_eq!(email.resolved_imap_host(), "imap.gmail.com");

        email.imap_host = Some("mail.example.org".to_string());
        assert_eq!(email.resolved_imap_host(), "mail.example.org");
    }
}
