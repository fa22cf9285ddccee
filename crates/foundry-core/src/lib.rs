//! Business logic and port definitions for Foundry.
//!
//! This crate defines the ports (repository, filesystem, validator,
//! spawner and invoker traits) that foundry-infra implements, and the
//! pipeline built on top of them. It depends only on `foundry-types`,
//! never on `foundry-infra` or any database/IO crate.

pub mod fs;
pub mod launch;
pub mod llm;
pub mod materializer;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod repository;
pub mod runtime;
pub mod synthesizer;
pub mod validator;

#[cfg(test)]
mod testing;
