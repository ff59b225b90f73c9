//! Per-run session state
//!
//! Created at the start of each run and dropped at its end. Nothing here is
//! persisted.

use crate::agent::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub domain: String,
    pub active_agents: Vec<Role>,
    pub context: HashMap<String, String>,
    pub refined_objective: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(domain: impl Into<String>) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            active_agents: Vec::new(),
            context: HashMap::new(),
            refined_objective: None,
            started_at: Utc::now(),
        };
        session.reset_context();
        session
    }

    pub fn reset_context(&mut self) {
        self.context.clear();
        self.refined_objective = None;
        debug!(session_id = %self.id, "Session context reset");
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.active_agents.contains(&role)
    }

    pub fn remember(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    /// Context entries rendered as `key: value` lines, sorted by key.
    pub fn context_text(&self) -> String {
        let mut keys: Vec<&String> = self.context.keys().collect();
        keys.sort();
        keys.iter()
            .map(|k| format!("{}: {}", k, self.context[*k]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn roster_names(&self) -> Vec<String> {
        self.active_agents.iter().map(|r| r.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_unique_and_clean() {
        let a = Session::new("finance");
        let b = Session::new("finance");
        assert_ne!(a.id, b.id);
        assert!(a.context.is_empty());
        assert!(a.refined_objective.is_none());
    }

    #[test]
    fn test_reset_context() {
        let mut session = Session::new("general");
        session.remember("domain", "general");
        session.refined_objective = Some("x".into());

        session.reset_context();
        assert!(session.context.is_empty());
        assert!(session.refined_objective.is_none());
    }

    #[test]
    fn test_context_text_is_sorted() {
        let mut session = Session::new("general");
        session.remember("b", "2");
        session.remember("a", "1");
        assert_eq!(session.context_text(), "a: 1\nb: 2");
    }
}
