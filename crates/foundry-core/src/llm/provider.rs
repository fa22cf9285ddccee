//! LlmProvider trait definition.
//!
//! This is the core abstraction that all text-generation backends implement.
//! Uses RPITIT for `complete`; the object-safe companion lives in
//! [`super::box_provider`].

use foundry_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends (Groq, Ollama, DeepSeek, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in foundry-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Name the gateway route table refers to (e.g., "groq").
    fn name(&self) -> &str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
