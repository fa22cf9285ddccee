//! OpenTelemetry GenAI Semantic Convention attributes for generation calls.
//!
//! Every provider call runs inside a `chat` span carrying these attributes.

use tracing::Span;

// --- Required attributes ---

/// The name of the operation being performed.
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider (e.g., "groq").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
pub const GEN_AI_RESPONSE_MODEL: &str = "gen_ai.response.model";

// --- Operation name values ---

/// Chat completion operation.
pub const OP_CHAT: &str = "chat";

/// Span for one chat completion against a provider backend.
///
/// Usage fields start empty and are filled by [`record_response`].
pub fn chat_span(provider: &str, model: &str, max_tokens: u32) -> Span {
    tracing::info_span!(
        "chat",
        gen_ai.operation.name = OP_CHAT,
        gen_ai.provider.name = provider,
        gen_ai.request.model = model,
        gen_ai.request.max_tokens = max_tokens,
        gen_ai.response.model = tracing::field::Empty,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    )
}

/// Record the served model and token usage on a [`chat_span`].
pub fn record_response(span: &Span, model: &str, input_tokens: u32, output_tokens: u32) {
    span.record(GEN_AI_RESPONSE_MODEL, model);
    span.record(GEN_AI_USAGE_INPUT_TOKENS, input_tokens);
    span.record(GEN_AI_USAGE_OUTPUT_TOKENS, output_tokens);
}
