//! Objective refinement and specialist team assembly

use super::{prompts, Agent, Role};
use crate::extraction::{extract_confidence, extract_structured, NEUTRAL_CONFIDENCE};
use crate::gateway::is_gateway_failure;
use serde_json::Value;
use tracing::{info, warn};

/// Rewrites a problem statement until the model is confident in it.
pub struct PromptRefiner {
    agent: Agent,
    threshold: f64,
    max_attempts: usize,
}

impl PromptRefiner {
    pub fn new(agent: Agent, threshold: u8, max_attempts: usize) -> Self {
        Self {
            agent,
            threshold: f64::from(threshold),
            max_attempts,
        }
    }

    /// Returns the refined objective and its confidence. Each attempt starts
    /// from the latest non-empty refinement; confidence stays at 50 if no
    /// attempt could be parsed.
    pub async fn refine(&self, problem: &str) -> (String, f64) {
        let mut objective = problem.to_string();
        let mut confidence = NEUTRAL_CONFIDENCE;

        for attempt in 1..=self.max_attempts {
            let raw = self.agent.execute(&objective, "").await;
            if is_gateway_failure(&raw) {
                warn!(attempt, "Refinement attempt failed at the gateway");
                continue;
            }

            let Some(value) = extract_structured(&raw) else {
                warn!(attempt, "Refinement reply had no structured block");
                continue;
            };

            confidence = extract_confidence(&raw);
            if let Some(refined) = refined_objective(&value) {
                objective = refined;
            }

            info!(attempt, confidence, "Objective refined");

            if confidence >= self.threshold && !objective.trim().is_empty() {
                break;
            }
        }

        (objective, confidence)
    }
}

fn refined_objective(value: &Value) -> Option<String> {
    value
        .as_object()?
        .iter()
        .find(|(k, _)| k.to_lowercase().contains("objective"))
        .and_then(|(_, v)| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Expert roster used when the model cannot define one.
pub const DEFAULT_EXPERTS: [(&str, &str); 4] = [
    ("Financial Analyst", "Analyzes market trends and financial data."),
    ("Risk Assessor", "Evaluates potential risks and suggests mitigations."),
    ("Market Researcher", "Gathers market data and identifies trends."),
    ("Strategic Planner", "Develops long-term strategies and action plans."),
];

/// Spawns per-run specialist agents for an objective.
pub struct TeamAssembler {
    recruiter: Agent,
}

impl TeamAssembler {
    pub fn new(recruiter: Agent) -> Self {
        Self { recruiter }
    }

    pub async fn assemble(&self, objective: &str) -> Vec<Agent> {
        let definitions = self.define_experts(objective).await;
        let chosen = self.choose_essential(objective, &definitions).await;

        info!(team = ?chosen.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(), "Team assembled");

        chosen
            .into_iter()
            .map(|(title, definition)| {
                let template = prompts::specialist_template(&title, &definition);
                self.recruiter.sibling(title, Role::Specialist, template)
            })
            .collect()
    }

    async fn define_experts(&self, objective: &str) -> Vec<(String, String)> {
        let raw = self
            .recruiter
            .execute_with(objective, "", &prompts::team_definition_instruction())
            .await;

        let parsed: Vec<(String, String)> = extract_structured(&raw)
            .as_ref()
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(title, definition)| {
                        let definition = definition.as_str()?.trim();
                        let title = title.trim();
                        (!title.is_empty()).then(|| (title.to_string(), definition.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if parsed.is_empty() {
            warn!("Expert definitions unavailable, using default team");
            return DEFAULT_EXPERTS
                .iter()
                .map(|(t, d)| (t.to_string(), d.to_string()))
                .collect();
        }
        parsed
    }

    async fn choose_essential(
        &self,
        objective: &str,
        definitions: &[(String, String)],
    ) -> Vec<(String, String)> {
        let raw = self
            .recruiter
            .execute_with(objective, "", &prompts::team_selection_instruction(definitions))
            .await;

        let chosen: Vec<(String, String)> = if is_gateway_failure(&raw) {
            Vec::new()
        } else {
            let names: Vec<String> = raw
                .split([',', '\n'])
                .map(|s| {
                    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '*' | '"' | '.'))
                        .to_lowercase()
                })
                .filter(|s| !s.is_empty())
                .collect();

            definitions
                .iter()
                .filter(|(title, _)| names.contains(&title.to_lowercase()))
                .cloned()
                .collect()
        };

        if chosen.is_empty() {
            definitions.to_vec()
        } else {
            chosen
        }
    }
}
