//! Planner: instruction + capability catalog -> structured [`Plan`].
//!
//! The model is asked for a JSON object; the response is parsed at a strict
//! boundary into [`Plan`] and then grounded against the registry snapshot
//! taken before the call. Unknown capability names are dropped, never
//! invented. A malformed response is retried once with a fresh call.

use std::collections::HashSet;

use serde::Deserialize;

use foundry_types::capability::Capability;
use foundry_types::error::PlanError;
use foundry_types::llm::TaskKind;
use foundry_types::log::GenerationCall;
use foundry_types::plan::{CapabilityGap, Plan};

use crate::llm::gateway::TextGenerator;
use crate::registry::{CapabilityRegistry, listing_of};
use crate::repository::capability::CapabilityRepository;
use crate::repository::trace::TraceRepository;

const MAX_ATTEMPTS: u32 = 2;

const SYSTEM_PROMPT: &str = "You design autonomous AI worker agents. \
You answer with a single JSON object and nothing else.";

pub struct Planner<G: TextGenerator, T: TraceRepository> {
    generator: G,
    trace: T,
}

impl<G: TextGenerator, T: TraceRepository> Planner<G, T> {
    pub fn new(generator: G, trace: T) -> Self {
        Self { generator, trace }
    }

    /// `plan(instruction) -> Plan`, grounded in the registry's current snapshot.
    pub async fn plan<R: CapabilityRepository>(
        &self,
        instruction: &str,
        registry: &CapabilityRegistry<R>,
    ) -> Result<Plan, PlanError> {
        let snapshot = registry.snapshot().await;
        let prompt = build_plan_prompt(instruction, &snapshot);

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let reply = match self
                .generator
                .generate(TaskKind::PromptGeneration, &prompt, SYSTEM_PROMPT)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Planner generation failed");
                    last_error = PlanError::Backend(e.to_string()).to_string();
                    continue;
                }
            };

            match parse_plan(&reply.text).map(|plan| ground_plan(plan, &snapshot)) {
                Ok(plan) => {
                    self.record_plan(instruction, &plan, &reply.provider, &reply.model)
                        .await;
                    return Ok(plan);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Planner response rejected");
                    last_error = e.to_string();
                }
            }
        }

        Err(PlanError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }

    async fn record_plan(&self, instruction: &str, plan: &Plan, provider: &str, model: &str) {
        let response = serde_json::to_string(plan).unwrap_or_default();
        let call = GenerationCall {
            id: uuid::Uuid::now_v7(),
            task_kind: "agent_plan".to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            prompt: instruction.to_string(),
            prompt_chars: instruction.chars().count() as i64,
            response_chars: response.chars().count() as i64,
            response,
            success: true,
            fallback_used: false,
            fallback_reason: None,
            duration_ms: 0,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.trace.record_generation_call(&call).await {
            tracing::warn!(error = %e, "Failed to record plan");
        }
    }
}

fn build_plan_prompt(instruction: &str, snapshot: &[Capability]) -> String {
    let tools = listing_of(snapshot);
    format!(
        r#"A user wants an AI worker agent. Their instruction:
"{instruction}"

Available tools (name: description):
{tools}

Rules:
- "required_tools" may ONLY contain names from the list above. Never invent names.
- Put a tool in "missing_tools" only when no listed tool can provide that functionality.
- Missing tool names are snake_case identifiers; "purpose" says in one sentence what it must do.
- "interval_hours" is 0 for a one-time task, 1 for hourly, 24 for daily, 168 for weekly.
- "system_prompt" describes the agent's purpose in the second person ("You are ...").
- "goal" is a single imperative sentence.

Respond with exactly this JSON shape:
{{
  "system_prompt": "...",
  "goal": "...",
  "interval_hours": 0,
  "required_tools": ["tool_name"],
  "missing_tools": [{{"name": "tool_name", "purpose": "..."}}]
}}"#
    )
}

/// Return the outermost `{ ... }` span of `text`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// The plan object as the model writes it. Every key is optional here so a
/// missing one surfaces as [`PlanError::MissingField`] rather than a generic
/// parse error; unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct PlanWire {
    #[serde(default, alias = "role_text")]
    system_prompt: Option<String>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default, alias = "schedule_interval")]
    interval_hours: Option<IntervalWire>,
    #[serde(default, alias = "required_capabilities")]
    required_tools: Option<Vec<String>>,
    #[serde(default, alias = "capability_gaps")]
    missing_tools: Option<Vec<GapWire>>,
}

/// Models write the interval as an integer, a whole float or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntervalWire {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl IntervalWire {
    fn hours(&self) -> Result<u32, PlanError> {
        let hours = match self {
            IntervalWire::Integer(n) => Some(*n),
            IntervalWire::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            IntervalWire::Float(_) => None,
            IntervalWire::Text(s) => s.trim().parse::<i64>().ok(),
        }
        .ok_or_else(|| PlanError::Invalid(format!("interval_hours is not an integer: {self:?}")))?;

        u32::try_from(hours)
            .map_err(|_| PlanError::Invalid(format!("interval_hours out of range: {hours}")))
    }
}

#[derive(Debug, Deserialize)]
struct GapWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    purpose: String,
}

impl TryFrom<GapWire> for CapabilityGap {
    type Error = PlanError;

    fn try_from(wire: GapWire) -> Result<Self, Self::Error> {
        let name = wire.name.trim();
        if name.is_empty() {
            return Err(PlanError::Invalid("missing_tools entry without a name".to_string()));
        }
        let purpose = wire.purpose.trim();
        if purpose.is_empty() {
            return Err(PlanError::Invalid(format!(
                "missing_tools entry '{name}' without a purpose"
            )));
        }
        Ok(CapabilityGap {
            name: name.to_string(),
            purpose: purpose.to_string(),
        })
    }
}

/// Parse a model response into a [`Plan`] without consulting the registry.
///
/// Required keys (aliases accepted): `system_prompt`/`role_text`, `goal`,
/// `interval_hours`/`schedule_interval`, `required_tools`/`required_capabilities`,
/// `missing_tools`/`capability_gaps`. Extra keys are ignored.
pub fn parse_plan(text: &str) -> Result<Plan, PlanError> {
    let json = extract_json_object(text)
        .ok_or_else(|| PlanError::Parse("no JSON object in response".to_string()))?;
    let wire: PlanWire =
        serde_json::from_str(json).map_err(|e| PlanError::Parse(e.to_string()))?;

    let role_text = wire.system_prompt.ok_or_else(|| missing("system_prompt"))?;
    let goal = wire.goal.ok_or_else(|| missing("goal"))?;
    if goal.trim().is_empty() {
        return Err(PlanError::Invalid("goal is empty".to_string()));
    }
    let schedule_interval = wire.interval_hours.ok_or_else(|| missing("interval_hours"))?.hours()?;
    let required_capabilities = wire
        .required_tools
        .ok_or_else(|| missing("required_tools"))?
        .into_iter()
        .map(|name| name.trim().to_string())
        .collect();
    let capability_gaps = wire
        .missing_tools
        .ok_or_else(|| missing("missing_tools"))?
        .into_iter()
        .map(CapabilityGap::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Plan {
        role_text: role_text.trim().to_string(),
        goal: goal.trim().to_string(),
        schedule_interval,
        required_capabilities,
        capability_gaps,
    })
}

/// Drop capability names that are not active in `snapshot`, dedup while
/// keeping order, and drop gaps the registry can already satisfy.
pub fn ground_plan(mut plan: Plan, snapshot: &[Capability]) -> Plan {
    let active: HashSet<&str> = snapshot
        .iter()
        .filter(|c| c.is_active())
        .map(|c| c.name.as_str())
        .collect();

    let mut seen = HashSet::new();
    plan.required_capabilities.retain(|name| {
        if !active.contains(name.as_str()) {
            tracing::warn!(%name, "Planner selected an unknown capability, dropping it");
            return false;
        }
        seen.insert(name.clone())
    });

    let mut seen_gaps = HashSet::new();
    plan.capability_gaps.retain(|gap| {
        if active.contains(gap.name.as_str()) {
            tracing::info!(name = %gap.name, "Gap already satisfied by registry");
            return false;
        }
        seen_gaps.insert(gap.name.clone())
    });

    plan
}

fn missing(field: &str) -> PlanError {
    PlanError::MissingField(field.to_string())
}
