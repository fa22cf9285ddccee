//! Subprocess sandbox for smoke-testing synthesized capabilities.
//!
//! Each validation writes a throwaway driver script, runs it under the
//! configured interpreter in a fresh process with mock mode forced on, and
//! reads back a single verdict line. The driver file is a `NamedTempFile`,
//! so it is removed on every exit path including timeouts.

pub mod driver;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use foundry_core::validator::CapabilityValidator;
use foundry_types::capability::{ValidationReport, is_valid_capability_name};
use foundry_types::config::SandboxConfig;

/// [`CapabilityValidator`] backed by an interpreter subprocess.
#[derive(Debug, Clone)]
pub struct SubprocessValidator {
    interpreter: String,
    timeout: Duration,
    mock_env_var: String,
    scratch_dir: Option<PathBuf>,
}

impl SubprocessValidator {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            mock_env_var: config.mock_env_var.clone(),
            scratch_dir: None,
        }
    }

    /// Write driver scripts under `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    async fn run_driver(&self, name: &str, source_location: &Path) -> anyhow::Result<ValidationReport> {
        let prefix = format!("{name}_test_");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".py");
        let mut script = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        script.write_all(driver::render_driver(name, source_location).as_bytes())?;
        script.flush()?;

        let child = tokio::process::Command::new(&self.interpreter)
            .arg(script.path())
            .env(&self.mock_env_var, "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Ok(ValidationReport::fail(format!(
                    "Tool execution timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(driver::parse_output(&stdout, &stderr))
    }
}

impl CapabilityValidator for SubprocessValidator {
    async fn validate(&self, name: &str, source_location: &Path) -> ValidationReport {
        if !is_valid_capability_name(name) {
            return ValidationReport::fail(format!("invalid capability name '{name}'"));
        }
        if !source_location.is_file() {
            return ValidationReport::fail(format!(
                "source not found at {}",
                source_location.display()
            ));
        }

        let report = match self.run_driver(name, source_location).await {
            Ok(report) => report,
            Err(e) => ValidationReport::fail(e.to_string()),
        };

        tracing::info!(
            capability = %name,
            passed = report.passed,
            error = %report.error,
            "Smoke test finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn validator(timeout_secs: u64) -> SubprocessValidator {
        SubprocessValidator::new(&SandboxConfig {
            timeout_secs,
            ..SandboxConfig::default()
        })
    }

    fn scratch_entries(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    fn write_source(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(format!("{name}.py"));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_passing_capability_uses_mock_mode() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            &dir,
            "echo_tool",
            "import os\n\ndef echo_tool(text):\n    if os.getenv(\"TOOL_TEST_MODE\") == \"true\":\n        return \"mock ok\"\n    return text\n",
        );

        let report = validator(15).validate("echo_tool", &path).await;
        assert!(report.passed, "error: {}", report.error);
        assert_eq!(report.output, "mock ok");
    }

    #[tokio::test]
    async fn test_zero_argument_fallback() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "now_tool", "def now_tool():\n    return 'tick'\n");

        let report = validator(15).validate("now_tool", &path).await;
        assert!(report.passed, "error: {}", report.error);
        assert_eq!(report.output, "tick");
    }

    #[tokio::test]
    async fn test_raising_capability_fails() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "bad_tool", "def bad_tool(x):\n    raise ValueError('nope')\n");

        let report = validator(15).validate("bad_tool", &path).await;
        assert!(!report.passed);
        assert_eq!(report.error, "nope");
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_report() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            &dir,
            "slow_tool",
            "import time\n\ndef slow_tool(x):\n    time.sleep(30)\n    return 'late'\n",
        );

        let report = validator(1).validate("slow_tool", &path).await;
        assert!(!report.passed);
        assert_eq!(report.error, "Tool execution timed out after 1 seconds");
    }

    #[tokio::test]
    async fn test_driver_file_removed_after_run_and_timeout() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let quick = write_source(&dir, "quick_tool", "def quick_tool(x):\n    return 'done'\n");
        let slow = write_source(
            &dir,
            "sleepy_tool",
            "import time\n\ndef sleepy_tool(x):\n    time.sleep(30)\n    return 'late'\n",
        );
        let validator = validator(1).with_scratch_dir(scratch.path());

        assert!(validator.validate("quick_tool", &quick).await.passed);
        assert_eq!(scratch_entries(&scratch), 0);

        let report = validator.validate("sleepy_tool", &slow).await;
        assert!(!report.passed);
        assert_eq!(scratch_entries(&scratch), 0);
    }

    #[tokio::test]
    async fn test_stdlib_named_capability_keeps_stdlib_visible() {
        if !python_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(
            &dir,
            "json",
            "import json as stdlib_json\n\ndef json(x):\n    return 'own ' + stdlib_json.dumps(x)\n",
        );

        let report = validator(15).validate("json", &path).await;
        assert!(report.passed, "error: {}", report.error);
        assert_eq!(report.output, "own \"test\"");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_failed_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(&dir, "any_tool", "def any_tool(x):\n    return x\n");
        let validator = SubprocessValidator::new(&SandboxConfig {
            interpreter: "/nonexistent/python-interpreter".to_string(),
            ..SandboxConfig::default()
        });

        let report = validator.validate("any_tool", &path).await;
        assert!(!report.passed);
        assert!(!report.error.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_spawning() {
        let report = validator(15)
            .validate("ghost_tool", Path::new("/nonexistent/ghost_tool.py"))
            .await;
        assert!(!report.passed);
        assert!(report.error.contains("source not found"));
    }
}
