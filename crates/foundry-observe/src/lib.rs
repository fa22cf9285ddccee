//! Observability for Foundry: subscriber setup and GenAI span attributes.

pub mod genai_attrs;
pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
