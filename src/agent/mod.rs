//! Agents
//!
//! An agent is a role, a prompt template and a handle to the model gateway.
//! Variants differ only in template content and in how their output is
//! post-processed (see `behaviour`). Feedback notes live in a shared
//! append-only [`FeedbackLog`] keyed by agent id and are replayed at render
//! time, so the template itself never changes after construction.

mod behaviour;
pub mod feedback;
pub mod prompts;
pub mod team;

use crate::gateway::ModelGateway;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub use behaviour::INSUFFICIENT_FINDINGS;
pub use feedback::FeedbackLog;
pub use team::{PromptRefiner, TeamAssembler};

/// Closed set of agent roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Director,
    Manager,
    Individual,
    Execution,
    Evaluator,
    Critique,
    Synthesizer,
    Communicator,
    PromptRefiner,
    Specialist,
}

impl Role {
    /// Canonical order, used for rosters.
    pub const ALL: [Role; 10] = [
        Role::Director,
        Role::Manager,
        Role::Individual,
        Role::Execution,
        Role::Evaluator,
        Role::Critique,
        Role::Synthesizer,
        Role::Communicator,
        Role::PromptRefiner,
        Role::Specialist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Director => "Director",
            Role::Manager => "Manager",
            Role::Individual => "Individual",
            Role::Execution => "Execution",
            Role::Evaluator => "Evaluator",
            Role::Critique => "Critique",
            Role::Synthesizer => "Synthesizer",
            Role::Communicator => "Communicator",
            Role::PromptRefiner => "PromptRefiner",
            Role::Specialist => "Specialist",
        }
    }

    /// Lenient lookup: case, spacing and an "Agent" suffix are ignored.
    pub fn from_name(raw: &str) -> Option<Role> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let key = key.strip_suffix("agent").unwrap_or(&key);

        match key {
            "director" => Some(Role::Director),
            "manager" => Some(Role::Manager),
            "individual" | "worker" => Some(Role::Individual),
            "execution" | "os" | "executor" => Some(Role::Execution),
            "evaluator" | "evaluation" => Some(Role::Evaluator),
            "critique" | "critic" => Some(Role::Critique),
            "synthesizer" | "synthesiser" => Some(Role::Synthesizer),
            "communicator" => Some(Role::Communicator),
            "promptrefiner" | "refiner" => Some(Role::PromptRefiner),
            "specialist" | "role" | "dynamic" | "team" => Some(Role::Specialist),
            _ => None,
        }
    }

    /// Roles every roster carries regardless of selection or exclusions.
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            Role::Director | Role::Manager | Role::Individual | Role::Evaluator | Role::Critique
        )
    }

    pub fn mandatory() -> Vec<Role> {
        Role::ALL.into_iter().filter(Role::is_mandatory).collect()
    }

    pub fn default_template(&self) -> &'static str {
        prompts::default_template(*self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub prompt_template: String,
}

#[derive(Clone)]
pub struct Agent {
    descriptor: AgentDescriptor,
    gateway: Arc<ModelGateway>,
    feedback: Arc<FeedbackLog>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        role: Role,
        prompt_template: Option<String>,
        gateway: Arc<ModelGateway>,
        feedback: Arc<FeedbackLog>,
    ) -> Self {
        let descriptor = AgentDescriptor {
            id: AgentId::new(),
            name: name.into(),
            role,
            prompt_template: prompt_template
                .unwrap_or_else(|| role.default_template().to_string()),
        };
        Self {
            descriptor,
            gateway,
            feedback,
        }
    }

    /// A new agent sharing this agent's gateway and feedback log.
    pub fn sibling(&self, name: impl Into<String>, role: Role, prompt_template: String) -> Self {
        Self::new(
            name,
            role,
            Some(prompt_template),
            Arc::clone(&self.gateway),
            Arc::clone(&self.feedback),
        )
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> AgentId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn role(&self) -> Role {
        self.descriptor.role
    }

    pub fn render(&self, problem: &str, context: &str) -> String {
        self.render_with(problem, context, "")
    }

    /// Fill `{problem}`, `{context}` and `{subject}`, then replay feedback notes.
    pub fn render_with(&self, problem: &str, context: &str, subject: &str) -> String {
        let context = if context.trim().is_empty() { "None" } else { context };
        let mut prompt = fill_placeholders(
            &self.descriptor.prompt_template,
            &[("problem", problem), ("context", context), ("subject", subject)],
        );

        for note in self.feedback.notes(self.descriptor.id) {
            prompt.push_str("\n\n[Feedback Update]: ");
            prompt.push_str(&note);
        }

        prompt
    }

    pub async fn execute(&self, problem: &str, context: &str) -> String {
        self.execute_with(problem, context, "").await
    }

    pub async fn execute_with(&self, problem: &str, context: &str, subject: &str) -> String {
        let prompt = self.render_with(problem, context, subject);
        debug!(agent = %self.descriptor.name, role = %self.descriptor.role, "Executing agent");
        self.gateway.query(&prompt).await
    }

    /// Record evaluator feedback for future renders. Returns `false` when the
    /// note was already present (or empty).
    pub fn update_from_feedback(&self, revised_output: &str, feedback: &str) -> bool {
        let appended = self.feedback.append(self.descriptor.id, feedback);
        debug!(
            agent = %self.descriptor.name,
            appended,
            revised_len = revised_output.len(),
            "Feedback received"
        );
        appended
    }

    pub fn feedback_notes(&self) -> Vec<String> {
        self.feedback.notes(self.descriptor.id)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.descriptor.name)
            .field("role", &self.descriptor.role)
            .finish()
    }
}

/// Single-pass `{name}` substitution. Substituted text is never rescanned, so
/// braces inside a problem statement stay literal. Unknown placeholders are
/// left as written.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
