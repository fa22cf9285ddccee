//! The planner's structured output.

use serde::{Deserialize, Serialize};

/// What a worker should do, how often, and with which capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Second-person description of the worker's purpose.
    pub role_text: String,
    /// Single imperative sentence.
    pub goal: String,
    /// Hours between runs; 0 means run once.
    pub schedule_interval: u32,
    /// Existing, active capability names in the order the planner chose them.
    pub required_capabilities: Vec<String>,
    /// Capabilities the registry does not have yet.
    pub capability_gaps: Vec<CapabilityGap>,
}

impl Plan {
    pub fn is_one_shot(&self) -> bool {
        self.schedule_interval == 0
    }
}

/// A capability a plan needs that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub name: String,
    pub purpose: String,
}
