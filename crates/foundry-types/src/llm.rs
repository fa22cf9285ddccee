//! Text-generation request/response types for Foundry.
//!
//! These types model the data shapes exchanged with provider backends:
//! completion requests, task kinds used for routing, provider configuration,
//! and error classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request to a provider for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Response from a provider for a non-streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

/// Token usage reported by a provider. Backends that do not report usage leave zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The kind of work a generation call performs. Routing and output budgets
/// are looked up by task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CodeWriting,
    PromptGeneration,
    ToolIdentification,
    AgentStep,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::CodeWriting,
        TaskKind::PromptGeneration,
        TaskKind::ToolIdentification,
        TaskKind::AgentStep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::CodeWriting => "code_writing",
            TaskKind::PromptGeneration => "prompt_generation",
            TaskKind::ToolIdentification => "tool_identification",
            TaskKind::AgentStep => "agent_step",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code_writing" => Ok(TaskKind::CodeWriting),
            "prompt_generation" => Ok(TaskKind::PromptGeneration),
            "tool_identification" => Ok(TaskKind::ToolIdentification),
            "agent_step" => Ok(TaskKind::AgentStep),
            other => Err(format!("invalid task kind: '{other}'")),
        }
    }
}

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("All providers failed for task_kind={task_kind}. Last error: {last_error}")]
    AllProvidersFailed {
        task_kind: TaskKind,
        last_error: String,
    },
}

impl LlmError {
    /// Whether this failure should put the provider into cooldown.
    ///
    /// Besides the typed variant, any message mentioning `429` or a rate
    /// limit counts: several backends only report throttling in free text.
    pub fn is_rate_limit(&self) -> bool {
        if matches!(self, LlmError::RateLimited { .. }) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("429")
            || text.contains("rate limit")
            || text.contains("rate_limit")
            || text.contains("ratelimit")
    }
}

/// Wire protocol spoken by a provider backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions compatible endpoint (Groq, DeepSeek, Gemini, HF router).
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    /// Ollama's native `/api/chat` endpoint.
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAiCompatible => write!(f, "openai_compatible"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_compatible" => Ok(ProviderKind::OpenAiCompatible),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("invalid provider kind: '{other}'")),
        }
    }
}

/// Configuration for a single named provider backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name referenced by the gateway route table (e.g., "groq", "ollama").
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. `None` for keyless backends.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Environment variable that overrides `model` when set.
    #[serde(default)]
    pub model_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_temperature() -> f64 {
    0.3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

/// Built-in provider table used when `config.toml` declares none.
pub fn default_providers() -> Vec<ProviderConfig> {
    let openai = |name: &str, base_url: &str, model: &str, key: &str| ProviderConfig {
        name: name.to_string(),
        kind: ProviderKind::OpenAiCompatible,
        base_url: base_url.to_string(),
        model: model.to_string(),
        api_key_env: Some(key.to_string()),
        model_env: None,
        temperature: default_temperature(),
        timeout_secs: default_timeout_secs(),
        enabled: true,
    };

    vec![
        openai(
            "groq",
            "https://api.groq.com/openai/v1",
            "llama-3.3-70b-versatile",
            "GROQ_API_KEY",
        ),
        ProviderConfig {
            name: "ollama".to_string(),
            kind: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "qwen3:8b".to_string(),
            api_key_env: None,
            model_env: Some("OLLAMA_MODEL".to_string()),
            temperature: 0.1,
            timeout_secs: 120,
            enabled: true,
        },
        openai(
            "deepseek",
            "https://api.deepseek.com/v1",
            "deepseek-reasoner",
            "DEEPSEEK_API_KEY",
        ),
        openai(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            "gemini-2.0-flash",
            "GEMINI_API_KEY",
        ),
        openai(
            "hf_router",
            "https://router.huggingface.co/v1",
            "meta-llama/Llama-3.3-70B-Instruct",
            "HUGGINGFACE_API_KEY",
        ),
    ]
}
