//! Capability execution for worker processes.
//!
//! Built-ins run natively; synthesized capabilities run through
//! [`script::ScriptRunner`]. Mock mode is decided once at construction from
//! the configured environment flag.

pub mod builtin;
pub mod script;

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use foundry_core::runtime::CapabilityInvoker;
use foundry_types::capability::{Capability, CapabilityOrigin};
use foundry_types::config::{EmailConfig, SandboxConfig};

use self::builtin::Builtins;
use self::script::ScriptRunner;

/// Whether `var` holds `true` in the process environment.
pub fn mock_mode_from_env(var: &str) -> bool {
    std::env::var(var)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct LocalCapabilityInvoker {
    builtins: Builtins,
    scripts: ScriptRunner,
}

impl LocalCapabilityInvoker {
    pub fn new(sandbox: &SandboxConfig, email: &EmailConfig, mock: bool) -> Self {
        Self {
            builtins: Builtins::new(email.clone(), mock),
            scripts: ScriptRunner::new(
                sandbox.interpreter.clone(),
                Duration::from_secs(sandbox.invoke_timeout_secs),
                sandbox.mock_env_var.clone(),
                mock,
            ),
        }
    }

    /// Reads mock mode from `sandbox.mock_env_var`.
    pub fn from_env(sandbox: &SandboxConfig, email: &EmailConfig) -> Self {
        Self::new(sandbox, email, mock_mode_from_env(&sandbox.mock_env_var))
    }
}

impl CapabilityInvoker for LocalCapabilityInvoker {
    async fn invoke(&self, capability: &Capability, input: &Value) -> String {
        match capability.origin {
            CapabilityOrigin::BuiltIn => match self.builtins.call(&capability.name, input).await {
                Some(output) => output,
                None => format!("Error: no built-in named '{}'", capability.name),
            },
            CapabilityOrigin::Synthesized => {
                let path = Path::new(&capability.source_location);
                match self.scripts.run(&capability.name, path, input).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(capability = %capability.name, error = %e, "Capability run failed");
                        format!("Error running {}: {e}", capability.name)
                    }
                }
            }
        }
    }
}
