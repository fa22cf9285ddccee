//! Capability domain types.
//!
//! A capability is a named, callable unit of functionality a worker can
//! invoke. Built-in capabilities ship with the binary; synthesized ones are
//! generated source records that must pass a sandboxed smoke test before
//! they become active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// A named, callable unit of functionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique snake_case identifier, shared namespace across origins.
    pub name: String,
    pub description: String,
    /// Opaque reference to the implementation (a file path for synthesized
    /// capabilities, `builtin:<name>` for built-ins).
    pub source_location: String,
    pub origin: CapabilityOrigin,
    pub status: CapabilityStatus,
    pub test_verdict: TestVerdict,
    pub test_output: Option<String>,
    /// Worker the capability was synthesized for, if any.
    pub created_for: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Capability {
    /// A built-in capability: always active, never persisted.
    pub fn builtin(name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source_location: format!("builtin:{name}"),
            origin: CapabilityOrigin::BuiltIn,
            status: CapabilityStatus::Active,
            test_verdict: TestVerdict::Passed,
            test_output: None,
            created_for: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A freshly synthesized candidate awaiting validation.
    pub fn candidate(
        name: &str,
        description: &str,
        source_location: &str,
        created_for: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source_location: source_location.to_string(),
            origin: CapabilityOrigin::Synthesized,
            status: CapabilityStatus::Inactive,
            test_verdict: TestVerdict::Untested,
            test_output: None,
            created_for,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CapabilityStatus::Active
    }

    /// `name: description`, the only form prompts consume.
    pub fn listing_line(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// Where a capability's implementation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOrigin {
    BuiltIn,
    Synthesized,
}

impl fmt::Display for CapabilityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityOrigin::BuiltIn => write!(f, "built_in"),
            CapabilityOrigin::Synthesized => write!(f, "synthesized"),
        }
    }
}

impl FromStr for CapabilityOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "built_in" => Ok(CapabilityOrigin::BuiltIn),
            "synthesized" => Ok(CapabilityOrigin::Synthesized),
            other => Err(format!("invalid capability origin: '{other}'")),
        }
    }
}

/// Whether a capability may be exposed to planning and wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatus {
    Active,
    Inactive,
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityStatus::Active => write!(f, "active"),
            CapabilityStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for CapabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CapabilityStatus::Active),
            "inactive" => Ok(CapabilityStatus::Inactive),
            other => Err(format!("invalid capability status: '{other}'")),
        }
    }
}

/// Most recent smoke-test result for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestVerdict {
    Untested,
    Passed,
    Failed,
}

impl fmt::Display for TestVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestVerdict::Untested => write!(f, "untested"),
            TestVerdict::Passed => write!(f, "passed"),
            TestVerdict::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TestVerdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "untested" => Ok(TestVerdict::Untested),
            "passed" => Ok(TestVerdict::Passed),
            "failed" => Ok(TestVerdict::Failed),
            other => Err(format!("invalid test verdict: '{other}'")),
        }
    }
}

/// Outcome of a sandboxed smoke test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub output: String,
    pub error: String,
}

impl ValidationReport {
    pub fn pass(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: String::new(),
            error: error.into(),
        }
    }

    pub fn verdict(&self) -> TestVerdict {
        if self.passed {
            TestVerdict::Passed
        } else {
            TestVerdict::Failed
        }
    }
}

/// Check that a name is a snake_case identifier usable as a module and
/// function name: lowercase ASCII letters, digits and underscores, not
/// starting with a digit.
pub fn is_valid_capability_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
