//! Append-only feedback history, keyed by agent instance

use super::AgentId;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

#[derive(Default)]
pub struct FeedbackLog {
    notes: RwLock<HashMap<AgentId, Vec<String>>>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note for `agent`. Empty notes and notes already recorded for
    /// that agent are ignored; returns whether anything was appended.
    pub fn append(&self, agent: AgentId, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() {
            return false;
        }

        let Ok(mut notes) = self.notes.write() else {
            warn!(agent = %agent, "Feedback log lock poisoned, note dropped");
            return false;
        };

        let entry = notes.entry(agent).or_default();
        if entry.iter().any(|existing| existing == note) {
            return false;
        }
        entry.push(note.to_string());
        true
    }

    pub fn notes(&self, agent: AgentId) -> Vec<String> {
        self.notes
            .read()
            .ok()
            .and_then(|notes| notes.get(&agent).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_idempotent_append() {
        let log = FeedbackLog::new();
        let id = AgentId::new();

        assert!(log.append(id, "Add numbers"));
        assert!(!log.append(id, "Add numbers"));
        assert!(!log.append(id, "  Add numbers \n"));
        assert!(!log.append(id, "   "));
        assert_eq!(log.notes(id), vec!["Add numbers".to_string()]);
    }

    #[test]
    fn test_concurrent_appends_stay_consistent() {
        let log = Arc::new(FeedbackLog::new());
        let id = AgentId::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    log.append(id, "shared note");
                    log.append(id, &format!("note {}", i % 4));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.notes(id).len(), 5);
    }
}
