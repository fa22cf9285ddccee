//! Local Ollama provider over the native `/api/chat` endpoint.
//!
//! Needs no API key. Reasoning is suppressed twice: `think: false` in the
//! payload and a `/no_think` marker on the user turn, for models that only
//! honor one of them.

pub mod types;

use std::time::Duration;

use tracing::Instrument;

use foundry_core::llm::provider::LlmProvider;
use foundry_observe::genai_attrs;
use foundry_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, ProviderConfig, Usage,
};

use self::types::{ChatMessage, ChatOptions, ChatRequest, ChatResponse};

const NO_THINK_SUFFIX: &str =
    "\nIMPORTANT: Do not include any reasoning or <think> blocks. Output ONLY the raw response.";

pub struct OllamaProvider {
    client: reqwest::Client,
    provider_name: String,
    base_url: String,
    model: String,
    temperature: f64,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            provider_name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        let system = request.system.as_deref().unwrap_or_default();
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: format!("{system}{NO_THINK_SUFFIX}"),
        });

        for msg in &request.messages {
            let content = match msg.role {
                MessageRole::User => format!("/no_think {}", msg.content),
                _ => msg.content.clone(),
            };
            messages.push(ChatMessage {
                role: msg.role.to_string(),
                content,
            });
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        ChatRequest {
            model,
            messages,
            stream: false,
            think: false,
            options: ChatOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                num_predict: request.max_tokens,
            },
        }
    }
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("name", &self.provider_name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(request);
        let url = format!("{}/api/chat", self.base_url);
        let span = genai_attrs::chat_span(&self.provider_name, &body.model, request.max_tokens);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .instrument(span.clone())
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Provider {
                        message: format!("HTTP request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &error_body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let model = if chat.model.is_empty() {
            body.model
        } else {
            chat.model
        };
        genai_attrs::record_response(&span, &model, chat.prompt_eval_count, chat.eval_count);

        Ok(CompletionResponse {
            content: chat.message.map(|m| m.content).unwrap_or_default(),
            model,
            usage: Usage {
                input_tokens: chat.prompt_eval_count,
                output_tokens: chat.eval_count,
            },
        })
    }
}

fn map_status(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}
