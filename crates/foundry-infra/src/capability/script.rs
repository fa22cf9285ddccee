//! Runs a synthesized capability's source file in an interpreter subprocess.
//!
//! The argument travels as JSON on stdin: an object is spread as keyword
//! arguments, a string or number is passed positionally, and null calls the
//! function with no arguments. Whatever the function returns is printed.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::sandbox::driver::MODULE_PREFIX;

const RUNNER: &str = r#"import importlib.util
import json
import sys

spec = importlib.util.spec_from_file_location(sys.argv[2], sys.argv[1])
module = importlib.util.module_from_spec(spec)
spec.loader.exec_module(module)
fn = getattr(module, sys.argv[3])
arg = json.loads(sys.stdin.read() or "null")
try:
    if isinstance(arg, dict):
        try:
            result = fn(**arg)
        except TypeError:
            result = fn(arg)
    elif arg is None:
        try:
            result = fn()
        except TypeError:
            result = fn("")
    else:
        result = fn(arg)
except Exception as e:
    result = "Error: " + str(e)
sys.stdout.write(str(result))
"#;

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    timeout: Duration,
    mock_env_var: String,
    mock: bool,
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration, mock_env_var: impl Into<String>, mock: bool) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            mock_env_var: mock_env_var.into(),
            mock,
        }
    }

    /// Call `name` from the file at `source_location` with `input`.
    pub async fn run(&self, name: &str, source_location: &Path, input: &Value) -> anyhow::Result<String> {
        let stem = source_location
            .file_stem()
            .context("capability source has no file name")?
            .to_string_lossy();
        let module = format!("{MODULE_PREFIX}{stem}");

        let mut command = tokio::process::Command::new(&self.interpreter);
        command
            .arg("-c")
            .arg(RUNNER)
            .arg(source_location)
            .arg(&module)
            .arg(name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.mock {
            command.env(&self.mock_env_var, "true");
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.interpreter))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_string().as_bytes()).await.ok();
            // Dropping stdin closes the pipe
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {} seconds", self.timeout.as_secs()))?
            .context("failed to wait for capability process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            anyhow::bail!("exited with {}: {last_line}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
