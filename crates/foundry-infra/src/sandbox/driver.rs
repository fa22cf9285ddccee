//! Smoke-test driver source and the `PASS:`/`FAIL:` output protocol.

use std::path::Path;

use foundry_types::capability::ValidationReport;

/// Characters of stderr kept when the driver produced no verdict line.
pub const STDERR_LIMIT: usize = 500;

/// Prefix of the private module name a capability is loaded under, so a
/// capability named after a standard library module cannot shadow it.
pub const MODULE_PREFIX: &str = "foundry_capability_";

/// Render the Python driver that loads `name` from the file at
/// `source_location` and calls it with `"test"`, falling back to a
/// zero-argument call on `TypeError`.
pub fn render_driver(name: &str, source_location: &Path) -> String {
    let stem = source_location
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    // JSON string literals are valid Python string literals.
    let path_literal = serde_json::Value::String(source_location.display().to_string()).to_string();
    let module_literal = serde_json::Value::String(format!("{MODULE_PREFIX}{stem}")).to_string();
    let name_literal = serde_json::Value::String(name.to_string()).to_string();

    format!(
        r#"import importlib.util
import sys

try:
    spec = importlib.util.spec_from_file_location({module_literal}, {path_literal})
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
    fn = getattr(module, {name_literal})
except Exception as e:
    print("FAIL:" + str(e))
    sys.exit(0)

try:
    result = fn("test")
    if isinstance(result, str):
        print("PASS:" + result[:100])
    else:
        print("PASS:" + str(result)[:100])
except TypeError:
    try:
        result = fn()
        print("PASS:" + str(result)[:100])
    except Exception as e:
        print("FAIL:" + str(e))
except Exception as e:
    print("FAIL:" + str(e))
"#
    )
}

/// Turn the driver's captured streams into a report.
///
/// The first stdout line carrying a verdict prefix decides; without one the
/// run failed and stderr (or a fixed message) becomes the error.
pub fn parse_output(stdout: &str, stderr: &str) -> ValidationReport {
    for line in stdout.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("PASS:") {
            return ValidationReport::pass(rest);
        }
        if let Some(rest) = line.strip_prefix("FAIL:") {
            return ValidationReport::fail(rest);
        }
    }

    let stderr = stderr.trim();
    let error = if stderr.is_empty() {
        "Unexpected output format".to_string()
    } else {
        stderr.chars().take(STDERR_LIMIT).collect()
    };
    ValidationReport {
        passed: false,
        output: stdout.trim().to_string(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_loads_source_by_path() {
        let driver = render_driver("rss_reader", Path::new("/data/capabilities/rss_reader.py"));
        assert!(driver.contains(
            r#"spec_from_file_location("foundry_capability_rss_reader", "/data/capabilities/rss_reader.py")"#
        ));
        assert!(driver.contains(r#"getattr(module, "rss_reader")"#));
        assert!(!driver.contains("sys.path.insert"));
        assert!(driver.contains(r#"fn("test")"#));
        assert!(driver.contains("except TypeError:"));
    }

    #[test]
    fn test_driver_escapes_quotes_in_path() {
        let driver = render_driver("tool", Path::new("/tmp/we\"ird/tool.py"));
        assert!(driver.contains(r#""/tmp/we\"ird/tool.py""#));
    }

    #[test]
    fn test_parse_pass_and_fail() {
        let report = parse_output("PASS:mock feed\n", "");
        assert!(report.passed);
        assert_eq!(report.output, "mock feed");

        let report = parse_output("noise\nFAIL:division by zero\n", "");
        assert!(!report.passed);
        assert_eq!(report.error, "division by zero");
    }

    #[test]
    fn test_parse_without_verdict_uses_stderr() {
        let trace = format!("Traceback...\n{}", "x".repeat(1000));
        let report = parse_output("", &trace);
        assert!(!report.passed);
        assert_eq!(report.error.chars().count(), STDERR_LIMIT);
        assert!(report.error.starts_with("Traceback"));

        let report = parse_output("hello", "");
        assert_eq!(report.error, "Unexpected output format");
        assert_eq!(report.output, "hello");
    }
}
