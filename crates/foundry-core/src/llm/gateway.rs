//! Provider gateway: one call contract over interchangeable backends.
//!
//! Each task kind resolves to an ordered provider list from the route
//! table. Providers are tried in order; a rate-limited provider enters a
//! cooldown shared by every task kind, any other failure moves on to the
//! next provider immediately. The call fails only when the whole route is
//! exhausted, carrying the last failure's message.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::Instrument;

use foundry_types::config::GatewayConfig;
use foundry_types::llm::{CompletionRequest, LlmError, Message, TaskKind};
use foundry_types::log::GenerationCall;

use super::box_provider::BoxLlmProvider;
use super::health::{ProviderHealth, ProviderStatus};
use super::sanitize::sanitize_response;
use crate::repository::trace::TraceRepository;

/// Sanitized text plus which backend produced it.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub fallback_used: bool,
}

/// The seam the planner, synthesizer and worker runtime generate through.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        system_prompt: &str,
    ) -> impl std::future::Future<Output = Result<GatewayReply, LlmError>> + Send;
}

impl<G: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<G> {
    async fn generate(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        system_prompt: &str,
    ) -> Result<GatewayReply, LlmError> {
        (**self).generate(kind, user_prompt, system_prompt).await
    }
}

/// Routes generation calls through the configured providers.
pub struct ProviderGateway<T: TraceRepository> {
    providers: HashMap<String, BoxLlmProvider>,
    health: Mutex<HashMap<String, ProviderHealth>>,
    config: GatewayConfig,
    trace: T,
}

impl<T: TraceRepository> ProviderGateway<T> {
    /// Create a gateway. Providers are addressed by their `name()`; a later
    /// provider with a duplicate name replaces the earlier one.
    pub fn new(config: GatewayConfig, providers: Vec<BoxLlmProvider>, trace: T) -> Self {
        let mut by_name = HashMap::new();
        let mut health = HashMap::new();
        for provider in providers {
            let name = provider.name().to_string();
            health.insert(name.clone(), ProviderHealth::new(&name));
            by_name.insert(name, provider);
        }

        Self {
            providers: by_name,
            health: Mutex::new(health),
            config,
            trace,
        }
    }

    /// The ordered provider names tried for `kind`: configured route,
    /// minus unknown providers, with the preferred provider moved first.
    pub fn resolved_route(&self, kind: TaskKind) -> Vec<String> {
        let mut route: Vec<String> = self
            .config
            .route_for(kind)
            .into_iter()
            .filter(|name| {
                let known = self.providers.contains_key(name);
                if !known {
                    tracing::debug!(provider = %name, task_kind = %kind, "Route names an unavailable provider, skipping");
                }
                known
            })
            .collect();

        if let Some(preferred) = &self.config.preferred_provider {
            if let Some(pos) = route.iter().position(|name| name == preferred) {
                let name = route.remove(pos);
                route.insert(0, name);
            }
        }
        route
    }

    /// `call(task_kind, user_prompt, system_prompt) -> text`.
    pub async fn call(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        system_prompt: &str,
    ) -> Result<String, LlmError> {
        self.complete(kind, user_prompt, system_prompt)
            .await
            .map(|reply| reply.text)
    }

    /// Like [`Self::call`] but also reports the provider that answered.
    pub async fn complete(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        system_prompt: &str,
    ) -> Result<GatewayReply, LlmError> {
        let route = self.resolved_route(kind);
        let max_tokens = self.config.max_tokens_for(kind);
        let cooldown = Duration::from_secs(self.config.rate_limit_cooldown_secs);
        let prompt_text = format!("{system_prompt}\n\n{user_prompt}");
        let mut last_error: Option<String> = None;

        for (position, name) in route.iter().enumerate() {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };

            if !self.with_health(name, |h| h.is_available()) {
                tracing::debug!(provider = %name, "Provider cooling down after rate limit, skipping");
                if last_error.is_none() {
                    last_error = Some(format!("{name} is cooling down after a rate limit"));
                }
                continue;
            }

            let request = CompletionRequest {
                model: provider.model().to_string(),
                messages: vec![Message::user(user_prompt)],
                system: (!system_prompt.is_empty()).then(|| system_prompt.to_string()),
                max_tokens,
                temperature: None,
            };

            let span = tracing::info_span!(
                "chat",
                gen_ai.provider.name = %name,
                gen_ai.request.model = %provider.model(),
                gen_ai.request.max_tokens = max_tokens,
                task_kind = %kind,
            );

            let started = Instant::now();
            let result = provider.complete(&request).instrument(span).await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let fallback_used = position > 0;

            match result {
                Ok(response) => {
                    let text = sanitize_response(&response.content);
                    self.with_health(name, |h| h.record_success(latency_ms));

                    if fallback_used {
                        tracing::info!(provider = %name, task_kind = %kind, "Served by fallback provider");
                    }

                    self.record(GenerationCall {
                        id: uuid::Uuid::now_v7(),
                        task_kind: kind.to_string(),
                        provider: name.clone(),
                        model: response.model.clone(),
                        prompt: prompt_text.clone(),
                        response: text.clone(),
                        prompt_chars: prompt_text.chars().count() as i64,
                        response_chars: text.chars().count() as i64,
                        success: true,
                        fallback_used,
                        fallback_reason: last_error.as_deref().map(truncate_reason),
                        duration_ms: latency_ms as i64,
                        created_at: chrono::Utc::now(),
                    })
                    .await;

                    return Ok(GatewayReply {
                        text,
                        provider: name.clone(),
                        model: response.model,
                        fallback_used,
                    });
                }
                Err(err) => {
                    let message = err.to_string();
                    let rate_limited = err.is_rate_limit();
                    self.with_health(name, |h| {
                        h.record_failure(&err, latency_ms);
                        if rate_limited {
                            h.set_rate_limited(cooldown);
                        }
                    });

                    if rate_limited {
                        tracing::warn!(
                            provider = %name,
                            cooldown_secs = cooldown.as_secs(),
                            "Provider rate limited, cooling down and trying next"
                        );
                    } else {
                        tracing::warn!(provider = %name, error = %err, "Provider failed, trying next");
                    }

                    self.record(GenerationCall {
                        id: uuid::Uuid::now_v7(),
                        task_kind: kind.to_string(),
                        provider: name.clone(),
                        model: provider.model().to_string(),
                        prompt: prompt_text.clone(),
                        response: String::new(),
                        prompt_chars: prompt_text.chars().count() as i64,
                        response_chars: 0,
                        success: false,
                        fallback_used,
                        fallback_reason: Some(truncate_reason(&message)),
                        duration_ms: latency_ms as i64,
                        created_at: chrono::Utc::now(),
                    })
                    .await;

                    last_error = Some(message);
                }
            }
        }

        Err(LlmError::AllProvidersFailed {
            task_kind: kind,
            last_error: last_error
                .unwrap_or_else(|| "no providers configured for this task kind".to_string()),
        })
    }

    /// Health snapshot of every provider, ordered by name.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        let health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        let mut status: Vec<ProviderStatus> = health
            .values()
            .map(|h| {
                let model = self
                    .providers
                    .get(&h.name)
                    .map(|p| p.model())
                    .unwrap_or_default();
                h.to_status(model)
            })
            .collect();
        status.sort_by(|a, b| a.name.cmp(&b.name));
        status
    }

    /// Send a one-line prompt straight to a named provider, bypassing routing.
    pub async fn ping(&self, provider_name: &str) -> Result<String, LlmError> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| LlmError::InvalidRequest(format!("unknown provider '{provider_name}'")))?;
        let request = CompletionRequest {
            model: provider.model().to_string(),
            messages: vec![Message::user("Reply with the single word: pong")],
            system: None,
            max_tokens: 16,
            temperature: None,
        };
        provider
            .complete(&request)
            .await
            .map(|r| sanitize_response(&r.content))
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn with_health<R>(&self, name: &str, f: impl FnOnce(&mut ProviderHealth) -> R) -> R {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        let entry = health
            .entry(name.to_string())
            .or_insert_with(|| ProviderHealth::new(name));
        f(entry)
    }

    async fn record(&self, call: GenerationCall) {
        if let Err(e) = self.trace.record_generation_call(&call).await {
            tracing::warn!(error = %e, provider = %call.provider, "Failed to record generation call");
        }
    }
}

impl<T: TraceRepository> TextGenerator for ProviderGateway<T> {
    async fn generate(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        system_prompt: &str,
    ) -> Result<GatewayReply, LlmError> {
        self.complete(kind, user_prompt, system_prompt).await
    }
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(GenerationCall::REASON_LIMIT).collect()
}
