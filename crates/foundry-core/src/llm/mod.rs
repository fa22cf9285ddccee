//! Text-generation abstractions.
//!
//! - `LlmProvider`: RPITIT trait for concrete backends
//! - `BoxLlmProvider`: object-safe wrapper for heterogeneous provider lists
//! - `ProviderGateway`: routing, cooldown and sanitization over providers
//! - `TextGenerator`: the seam everything else generates through

pub mod box_provider;
pub mod gateway;
pub mod health;
pub mod provider;
pub mod sanitize;
