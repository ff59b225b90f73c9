//! Task routing
//!
//! Two model-driven decisions:
//! - `TaskClassifier`: is a subtask programmatic (run a command) or general?
//! - `AgentSelector`: which roles take part in a run for a given problem?
//!
//! Both fall back to a safe answer rather than failing: an unclassifiable task
//! is general (never silently executed), an unusable selection is the
//! mandatory role set.

use crate::agent::{prompts, Agent, Role};
use crate::extraction::extract_structured;
use crate::gateway::is_gateway_failure;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use crate::models::TaskKind;

/// SHA-256 hex digest of a problem statement, used as the selection cache key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct TaskClassifier {
    agent: Agent,
}

impl TaskClassifier {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub async fn classify(&self, task: &str) -> TaskKind {
        let raw = self
            .agent
            .execute_with(task, "", &prompts::classify_instruction(task))
            .await;

        if is_gateway_failure(&raw) {
            warn!(subtask = %task, "Classification unavailable, defaulting to general");
            return TaskKind::General;
        }

        let kind = extract_structured(&raw)
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|map| {
                map.iter()
                    .find(|(k, _)| k.to_lowercase().contains("type"))
                    .and_then(|(_, v)| v.as_str())
                    .map(parse_kind)
            })
            .unwrap_or_else(|| {
                warn!(subtask = %task, "Classification unparseable, defaulting to general");
                TaskKind::General
            });

        info!(subtask = %task, kind = %kind, "Task classified");
        kind
    }
}

// Anything other than an explicit "programmatic" is general.
fn parse_kind(raw: &str) -> TaskKind {
    if raw.trim().eq_ignore_ascii_case("programmatic") {
        TaskKind::Programmatic
    } else {
        TaskKind::General
    }
}

pub struct AgentSelector {
    agent: Agent,
    domain_exclusions: HashMap<String, Vec<String>>,
    cache: RwLock<HashMap<String, Vec<Role>>>,
}

impl AgentSelector {
    pub fn new(agent: Agent, domain_exclusions: HashMap<String, Vec<String>>) -> Self {
        Self {
            agent,
            domain_exclusions,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Ordered roster for a problem. Always contains the mandatory roles;
    /// never contains a non-mandatory role excluded for `domain`.
    pub async fn select_agents(&self, problem: &str, domain: &str) -> Vec<Role> {
        let key = content_hash(problem);

        let cached = self.cache.read().await.get(&key).cloned();
        let selected = match cached {
            Some(roles) => {
                debug!(hash = %key, "Agent selection served from cache");
                roles
            }
            None => {
                let roles = self.query_selection(problem).await;
                if !roles.is_empty() {
                    self.cache.write().await.insert(key, roles.clone());
                }
                roles
            }
        };

        let excluded = self.excluded_roles(domain);
        let mut roster: Vec<Role> = selected
            .into_iter()
            .filter(|role| role.is_mandatory() || !excluded.contains(role))
            .chain(Role::mandatory())
            .collect();
        roster.sort();
        roster.dedup();

        info!(
            domain = %domain,
            roster = ?roster.iter().map(Role::name).collect::<Vec<_>>(),
            "Agents selected"
        );
        roster
    }

    pub async fn cached_selections(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn query_selection(&self, problem: &str) -> Vec<Role> {
        let candidates: Vec<&str> = Role::ALL.iter().map(Role::name).collect();
        let raw = self
            .agent
            .execute_with(problem, "", &prompts::selection_instruction(&candidates))
            .await;

        if is_gateway_failure(&raw) {
            warn!("Agent selection unavailable, using mandatory roles");
            return Vec::new();
        }

        let roles = parse_selection(&raw);
        if roles.is_empty() {
            warn!(reply = %raw.trim(), "Agent selection unparseable, using mandatory roles");
        }
        roles
    }

    fn excluded_roles(&self, domain: &str) -> Vec<Role> {
        self.domain_exclusions
            .iter()
            .filter(|(tag, _)| tag.eq_ignore_ascii_case(domain))
            .flat_map(|(_, names)| names.iter())
            .filter_map(|name| Role::from_name(name))
            .collect()
    }
}

/// Role names from a selection reply: a JSON array, a JSON object with a list
/// value, or a plain comma/newline separated list. Unknown names are dropped.
pub fn parse_selection(raw: &str) -> Vec<Role> {
    let names: Vec<String> = match extract_structured_list(raw) {
        Some(items) => items,
        None => raw
            .split([',', '\n'])
            .map(|s| s.trim().to_string())
            .collect(),
    };

    names.iter().filter_map(|name| Role::from_name(name)).collect()
}

fn extract_structured_list(raw: &str) -> Option<Vec<String>> {
    if !raw.contains(['[', '{']) {
        return None;
    }
    let value = extract_structured(raw)?;
    let list = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map.values().find_map(Value::as_array)?,
        _ => return None,
    };
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FeedbackLog;
    use crate::gateway::{ModelGateway, ScriptedBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn manager(backend: Arc<ScriptedBackend>) -> Agent {
        let gateway = Arc::new(ModelGateway::new(backend, Duration::from_secs(5)));
        Agent::new("Manager 1", Role::Manager, None, gateway, Arc::new(FeedbackLog::new()))
    }

    #[tokio::test]
    async fn test_classification() {
        let backend = Arc::new(
            ScriptedBackend::new(r#"{"task_type": "general"}"#).rule(
                "Task to classify: List all text files in a directory",
                r#"{"task_type": "programmatic", "reason": "needs ls"}"#,
            ),
        );
        let classifier = TaskClassifier::new(manager(backend));

        assert_eq!(
            classifier.classify("List all text files in a directory").await,
            TaskKind::Programmatic
        );
        assert_eq!(
            classifier.classify("Summarize market trends for 2025").await,
            TaskKind::General
        );
    }

    #[tokio::test]
    async fn test_classification_defaults_to_general() {
        let failing = Arc::new(ScriptedBackend::new("").failing());
        let classifier = TaskClassifier::new(manager(failing));
        assert_eq!(classifier.classify("rm everything").await, TaskKind::General);

        let chatty = Arc::new(ScriptedBackend::new("I think this is programmatic!"));
        let classifier = TaskClassifier::new(manager(chatty));
        assert_eq!(classifier.classify("ls").await, TaskKind::General);
    }

    #[tokio::test]
    async fn test_selection_adds_mandatory_and_orders() {
        let backend = Arc::new(ScriptedBackend::new("Communicator, ExecutionAgent, Wizard"));
        let selector = AgentSelector::new(manager(backend), HashMap::new());

        let roster = selector.select_agents("plan a launch", "general").await;
        assert_eq!(
            roster,
            vec![
                Role::Director,
                Role::Manager,
                Role::Individual,
                Role::Execution,
                Role::Evaluator,
                Role::Critique,
                Role::Communicator,
            ]
        );
    }

    #[tokio::test]
    async fn test_selection_cache_and_exclusions() {
        let backend = Arc::new(ScriptedBackend::new(r#"["Execution", "Synthesizer", "Critique"]"#));
        let mut exclusions = HashMap::new();
        exclusions.insert(
            "finance".to_string(),
            vec!["Execution".to_string(), "Critique".to_string()],
        );
        let selector = AgentSelector::new(manager(backend.clone()), exclusions);

        let finance = selector.select_agents("rebalance", "Finance").await;
        assert!(!finance.contains(&Role::Execution));
        assert!(finance.contains(&Role::Critique));
        assert!(finance.contains(&Role::Synthesizer));

        let general = selector.select_agents("rebalance", "general").await;
        assert!(general.contains(&Role::Execution));

        assert_eq!(backend.prompts().len(), 1);
        assert_eq!(selector.cached_selections().await, 1);
    }

    #[tokio::test]
    async fn test_empty_selection_falls_back_to_mandatory() {
        let backend = Arc::new(ScriptedBackend::new("   "));
        let selector = AgentSelector::new(manager(backend.clone()), HashMap::new());

        let roster = selector.select_agents("anything", "general").await;
        assert_eq!(roster, Role::mandatory());
        assert_eq!(selector.cached_selections().await, 0);
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(content_hash("abc").len(), 64);
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
