//! Deterministic backend for tests and offline runs
//!
//! Replies are chosen by the first rule whose pattern occurs in the prompt.
//! A rule may carry a sequence of replies; the last one repeats once the
//! sequence is used up.

use super::CompletionBackend;
use crate::error::OrchestrationError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

struct Rule {
    pattern: String,
    replies: Vec<String>,
    served: usize,
}

pub struct ScriptedBackend {
    rules: Mutex<Vec<Rule>>,
    default_reply: String,
    fail: bool,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_reply: default_reply.into(),
            fail: false,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn rule(self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rule_sequence(pattern, vec![reply.into()])
    }

    pub fn rule_sequence(self, pattern: impl Into<String>, replies: Vec<String>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.into(),
                replies,
                served: 0,
            });
        }
        self
    }

    /// Every call fails with a gateway error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of received prompts containing `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }

    fn reply_for(&self, prompt: &str) -> String {
        let Ok(mut rules) = self.rules.lock() else {
            return self.default_reply.clone();
        };

        for rule in rules.iter_mut() {
            if !prompt.contains(&rule.pattern) {
                continue;
            }
            let index = rule.served.min(rule.replies.len().saturating_sub(1));
            rule.served += 1;
            if let Some(reply) = rule.replies.get(index) {
                return reply.clone();
            }
        }

        self.default_reply.clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(OrchestrationError::Gateway("scripted failure".to_string()));
        }

        Ok(self.reply_for(prompt))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_repeats_last() {
        let backend = ScriptedBackend::new("default")
            .rule_sequence("critique", vec!["v1".to_string(), "v2".to_string()]);

        assert_eq!(backend.complete("critique this").await.unwrap(), "v1");
        assert_eq!(backend.complete("critique this").await.unwrap(), "v2");
        assert_eq!(backend.complete("critique this").await.unwrap(), "v2");
        assert_eq!(backend.complete("hello").await.unwrap(), "default");
        assert_eq!(backend.count_matching("critique"), 3);
    }

    #[test]
    fn test_failing_backend_records_prompt() {
        let backend = ScriptedBackend::new("default").failing();

        let result = tokio_test::block_on(backend.complete("hello"));
        assert!(result.is_err());
        assert_eq!(backend.prompts(), vec!["hello".to_string()]);
    }
}
