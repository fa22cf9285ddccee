//! Shared domain types for Foundry.
//!
//! This crate contains the core domain types used across the Foundry
//! pipeline: Capability, Plan, Worker, RunRecord, traceability records,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod capability;
pub mod config;
pub mod error;
pub mod llm;
pub mod log;
pub mod plan;
pub mod worker;
