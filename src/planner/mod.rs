//! Planner trait and implementations
//!
//! A planner turns a goal into an ordered list of subtask descriptions.
//! Decomposition never fails outright: the model planner retries once with a
//! simpler prompt and then falls back to a configured subtask list.

use crate::agent::{prompts, Agent};
use crate::extraction::extract_structured;
use crate::gateway::is_gateway_failure;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Plans longer than this are truncated.
pub const MAX_SUBTASKS: usize = 20;

/// Trait for goal decomposition
#[async_trait]
pub trait Planner: Send + Sync {
    async fn decompose(&self, goal: &str) -> Vec<String>;
}

/// Model-driven planner: full prompt, then a simplified retry, then the
/// fallback list.
pub struct ModelPlanner {
    agent: Agent,
    fallback: Vec<String>,
}

impl ModelPlanner {
    pub fn new(agent: Agent, fallback: Vec<String>) -> Self {
        Self { agent, fallback }
    }

    async fn attempt(&self, goal: &str, instruction: &str) -> Vec<String> {
        let raw = self.agent.execute_with(goal, "", instruction).await;
        if is_gateway_failure(&raw) {
            return Vec::new();
        }
        parse_subtasks(&raw)
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    async fn decompose(&self, goal: &str) -> Vec<String> {
        let subtasks = self.attempt(goal, prompts::DECOMPOSE_INSTRUCTION).await;
        if !subtasks.is_empty() {
            info!(manager = %self.agent.name(), count = subtasks.len(), "Goal decomposed");
            return subtasks;
        }

        warn!(manager = %self.agent.name(), "No subtasks extracted, retrying with simplified prompt");
        let subtasks = self.attempt(goal, prompts::DECOMPOSE_RETRY_INSTRUCTION).await;
        if !subtasks.is_empty() {
            info!(manager = %self.agent.name(), count = subtasks.len(), "Goal decomposed on retry");
            return subtasks;
        }

        warn!(manager = %self.agent.name(), "Falling back to default subtasks");
        self.fallback.clone()
    }
}

/// Fixed plan, for offline runs and tests.
pub struct StaticPlanner {
    subtasks: Vec<String>,
}

impl StaticPlanner {
    pub fn new(subtasks: Vec<String>) -> Self {
        Self { subtasks }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn decompose(&self, _goal: &str) -> Vec<String> {
        self.subtasks.clone()
    }
}

/// Subtask descriptions from a model reply.
///
/// Accepts a JSON array of strings, an array of objects carrying a
/// `description`/`task` field, or an object wrapping such an array.
pub fn parse_subtasks(raw: &str) -> Vec<String> {
    let Some(value) = extract_structured(raw) else {
        return Vec::new();
    };

    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.values().find_map(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut subtasks: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => ["description", "task", "subtask", "name"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    if subtasks.len() > MAX_SUBTASKS {
        debug!(count = subtasks.len(), "Truncating oversized plan");
        subtasks.truncate(MAX_SUBTASKS);
    }
    subtasks
}
