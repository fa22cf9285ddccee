//! Capability synthesizer: gap -> generated source file.
//!
//! One call is one attempt. Retrying with the validator's error is the
//! caller's decision (see [`crate::pipeline`]); the synthesizer only embeds
//! `previous_error` into the prompt when asked to.

use std::path::{Path, PathBuf};

use foundry_types::capability::{Capability, is_valid_capability_name};
use foundry_types::error::SynthesisError;
use foundry_types::llm::TaskKind;
use foundry_types::log::SynthesisAttempt;

use crate::fs::FileSystem;
use crate::llm::gateway::TextGenerator;
use crate::llm::sanitize::strip_code_fences;
use crate::registry::{CapabilityRegistry, is_builtin};
use crate::repository::capability::CapabilityRepository;
use crate::repository::trace::TraceRepository;

const SYSTEM_PROMPT: &str = "You are a Python expert. Write clean, working Python code. \
Output only Python code. No explanation. No markdown fences.";

/// An accepted candidate, written to disk and recorded as inactive.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub capability: Capability,
    pub source_location: PathBuf,
    pub source: String,
}

/// What a synthesis request is for.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub name: &'a str,
    pub purpose: &'a str,
    pub attempt_number: u32,
    pub previous_error: Option<&'a str>,
    pub requested_for: Option<&'a str>,
}

pub struct CapabilitySynthesizer<G: TextGenerator, F: FileSystem, T: TraceRepository> {
    generator: G,
    fs: F,
    trace: T,
    capabilities_dir: PathBuf,
    mock_env_var: String,
}

impl<G: TextGenerator, F: FileSystem, T: TraceRepository> CapabilitySynthesizer<G, F, T> {
    pub fn new(
        generator: G,
        fs: F,
        trace: T,
        capabilities_dir: impl Into<PathBuf>,
        mock_env_var: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            fs,
            trace,
            capabilities_dir: capabilities_dir.into(),
            mock_env_var: mock_env_var.into(),
        }
    }

    /// Deterministic per-name source location.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.capabilities_dir.join(format!("{name}.py"))
    }

    /// `synthesize(name, purpose, attempt_number, previous_error) -> source_location`.
    ///
    /// A rejected candidate is never written. An accepted one overwrites any
    /// earlier attempt for the same name and is recorded in the registry as
    /// inactive and untested.
    pub async fn synthesize<R: CapabilityRepository>(
        &self,
        registry: &CapabilityRegistry<R>,
        request: SynthesisRequest<'_>,
    ) -> Result<Synthesized, SynthesisError> {
        let name = request.name;
        if !is_valid_capability_name(name) {
            return Err(SynthesisError::InvalidName(name.to_string()));
        }
        if is_builtin(name) {
            return Err(SynthesisError::ReservedName(name.to_string()));
        }

        tracing::info!(%name, attempt = request.attempt_number, "Synthesizing capability");
        let prompt = build_prompt(
            name,
            request.purpose,
            request.attempt_number,
            request.previous_error,
            &self.mock_env_var,
        );

        let reply = self
            .generator
            .generate(TaskKind::CodeWriting, &prompt, SYSTEM_PROMPT)
            .await
            .map_err(|e| SynthesisError::Generation(e.to_string()))?;

        let source = strip_code_fences(&reply.text);
        if !declares_callable(&source, name) {
            let error = format!("source does not declare def {name}(");
            self.log_attempt(&request, &source, false, None, Some(error)).await;
            return Err(SynthesisError::MissingDeclaration(name.to_string()));
        }

        let path = self.source_path(name);
        self.write_source(&path, &source).await?;

        let location = path.to_string_lossy().to_string();
        let capability = Capability::candidate(
            name,
            request.purpose,
            &location,
            request.requested_for.map(str::to_string),
        );
        registry
            .record_candidate(&capability)
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))?;

        tracing::info!(%name, path = %path.display(), "Capability source written");
        Ok(Synthesized {
            capability,
            source_location: path,
            source,
        })
    }

    /// Append a synthesis-attempt record. `test_passed` is `None` when the
    /// candidate never reached the validator.
    pub async fn log_attempt(
        &self,
        request: &SynthesisRequest<'_>,
        source: &str,
        accepted: bool,
        test_passed: Option<bool>,
        error: Option<String>,
    ) {
        let attempt = SynthesisAttempt {
            id: uuid::Uuid::now_v7(),
            capability_name: request.name.to_string(),
            requested_for: request.requested_for.map(str::to_string),
            attempt_number: request.attempt_number,
            purpose: request.purpose.to_string(),
            source: source.to_string(),
            accepted,
            test_passed,
            error,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.trace.record_synthesis_attempt(&attempt).await {
            tracing::warn!(error = %e, name = %request.name, "Failed to record synthesis attempt");
        }
    }

    async fn write_source(&self, path: &Path, source: &str) -> Result<(), SynthesisError> {
        if let Some(parent) = path.parent() {
            self.fs
                .create_dir_all(parent)
                .await
                .map_err(|e| SynthesisError::Storage(e.to_string()))?;
        }
        self.fs
            .write_file(path, source)
            .await
            .map_err(|e| SynthesisError::Storage(e.to_string()))
    }
}

/// Whether `source` has a top-level `def name(` or `async def name(` line.
pub fn declares_callable(source: &str, name: &str) -> bool {
    let def = format!("def {name}(");
    let async_def = format!("async def {name}(");
    source
        .lines()
        .any(|line| line.starts_with(&def) || line.starts_with(&async_def))
}

fn build_prompt(
    name: &str,
    purpose: &str,
    attempt_number: u32,
    previous_error: Option<&str>,
    mock_env_var: &str,
) -> String {
    let error_note = match previous_error {
        Some(err) if attempt_number > 1 && !err.is_empty() => {
            format!("\nPrevious attempt failed with this error: {err}. Fix this issue.")
        }
        _ => String::new(),
    };

    format!(
        r#"Write a Python function for this tool.

Tool name: {name}
Purpose: {purpose}{error_note}

Requirements:
- Function name must be exactly: {name}
- Single standalone function taking at most one argument
- All imports at the top of the file (not inside the function)
- Always return a string
- Wrap main logic in try/except, return an error message string on exception
- The first statement must be: if os.getenv("{mock_env_var}") == "true": return a mock success string
  (no real network calls, file writes or emails in that mode)
- Use only the standard library, requests and beautifulsoup4
- No classes, no argparse, no if __name__ == "__main__" block

Output only the complete Python file content including imports."#
    )
}
