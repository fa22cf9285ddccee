//! Infrastructure layer for Foundry.
//!
//! Implements the ports defined in `foundry-core`: SQLite storage,
//! text-generation backends, the subprocess sandbox, capability execution,
//! filesystem access and detached process spawning.

pub mod capability;
pub mod config;
pub mod filesystem;
pub mod llm;
pub mod process;
pub mod sandbox;
pub mod sqlite;
