//! Role behaviours: the prompt each one sends and how its reply is read back

use super::{prompts, Agent};
use crate::extraction::extract_structured;
use crate::gateway::is_gateway_failure;
use crate::models::{Evaluation, Report};
use tracing::{info, warn};

/// Conclusions text used when there is nothing to conclude from.
pub const INSUFFICIENT_FINDINGS: &str =
    "Insufficient data to generate actionable conclusions for the given goal.";

const CONCLUSIONS_UNAVAILABLE: &str =
    "Conclusions could not be generated because the model was unavailable.";

impl Agent {
    /// Complete a subtask and report on it. Never fails: gateway and
    /// extraction problems produce a failed report.
    pub async fn perform_task(&self, task: &str, context: &str) -> Report {
        info!(agent = %self.name(), subtask = %task, "Performing task");

        let raw = self
            .execute_with(task, context, &prompts::report_instruction())
            .await;

        if is_gateway_failure(&raw) {
            return Report::failed(task, "Model gateway unavailable.").with_agent(self.name());
        }

        match extract_structured(&raw) {
            Some(value) => Report::from_value(task, &value).with_agent(self.name()),
            None => {
                warn!(agent = %self.name(), subtask = %task, "Unparseable task report");
                Report::failed(task, "Agent reply could not be parsed as a report.")
                    .with_agent(self.name())
            }
        }
    }

    /// Score a candidate against the objective.
    pub async fn evaluate(&self, objective: &str, candidate: &str) -> Evaluation {
        let raw = self.execute_with(objective, "", candidate).await;
        if is_gateway_failure(&raw) {
            warn!(agent = %self.name(), "Evaluation unavailable, using neutral confidence");
        }
        Evaluation::from_response(&raw)
    }

    /// Produce a revision of `candidate` addressing `evaluation`. Returns the
    /// raw reply; callers decide whether it replaces the candidate.
    pub async fn revise(&self, objective: &str, candidate: &str, evaluation: &Evaluation) -> String {
        let feedback = if evaluation.improvements.is_empty() {
            evaluation.raw.clone()
        } else {
            evaluation
                .improvements
                .iter()
                .map(|i| format!("- {}", i))
                .collect::<Vec<_>>()
                .join("\n")
        };

        self.execute_with(objective, &feedback, candidate)
            .await
            .trim()
            .to_string()
    }

    /// Merge findings into recommendations.
    pub async fn synthesize(&self, objective: &str, findings: &[String]) -> String {
        if findings.is_empty() {
            return INSUFFICIENT_FINDINGS.to_string();
        }

        let material: String = findings.iter().map(|f| format!("- {}\n", f)).collect();
        let raw = self.execute_with(objective, "", &material).await;
        if is_gateway_failure(&raw) {
            return CONCLUSIONS_UNAVAILABLE.to_string();
        }
        raw.trim().to_string()
    }

    /// Rewrite a report for a non-technical reader. `None` when the gateway fails.
    pub async fn communicate(&self, objective: &str, report: &str) -> Option<String> {
        let raw = self.execute_with(objective, "", report).await;
        if is_gateway_failure(&raw) || raw.trim().is_empty() {
            warn!(agent = %self.name(), "Executive summary unavailable");
            return None;
        }
        Some(raw.trim().to_string())
    }

    /// Director-style conclusions over completed findings. No model call when
    /// there are no findings.
    pub async fn generate_conclusions(&self, goal: &str, findings: &[String]) -> String {
        if findings.is_empty() {
            return INSUFFICIENT_FINDINGS.to_string();
        }

        let raw = self
            .execute_with(goal, "", &prompts::conclusions_instruction(findings))
            .await;
        if is_gateway_failure(&raw) {
            warn!(agent = %self.name(), "Conclusions unavailable");
            return CONCLUSIONS_UNAVAILABLE.to_string();
        }
        raw.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::agent::{Agent, FeedbackLog, Role};
    use crate::gateway::{ModelGateway, ScriptedBackend};
    use crate::models::ReportStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn agent(backend: ScriptedBackend, role: Role) -> (Agent, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let gateway = Arc::new(ModelGateway::new(backend.clone(), Duration::from_secs(5)));
        (
            Agent::new("worker", role, None, gateway, Arc::new(FeedbackLog::new())),
            backend,
        )
    }

    #[tokio::test]
    async fn test_perform_task_parses_report() {
        let reply = r#"Here is my report:
<<<JSON>>>
{"status": "completed", "quality": 90, "result": "Found 3 trends", "remarks": "ok",}
<<<END>>>"#;
        let (agent, _) = agent(ScriptedBackend::new(reply), Role::Individual);

        let report = agent.perform_task("Find trends", "").await;
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.quality, 90);
        assert_eq!(report.result.as_deref(), Some("Found 3 trends"));
        assert_eq!(report.agent.as_deref(), Some("worker"));
    }

    #[tokio::test]
    async fn test_perform_task_gateway_failure() {
        let (agent, _) = agent(ScriptedBackend::new("").failing(), Role::Individual);

        let report = agent.perform_task("Find trends", "").await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.quality, 0);
        assert!(report.result.is_none());
    }

    #[tokio::test]
    async fn test_perform_task_unparseable() {
        let (agent, _) = agent(ScriptedBackend::new("I did it!"), Role::Individual);
        let report = agent.perform_task("Find trends", "").await;
        assert_eq!(report.status, ReportStatus::Failed);
    }

    #[tokio::test]
    async fn test_conclusions_skip_model_without_findings() {
        let (agent, backend) = agent(ScriptedBackend::new("should not be used"), Role::Director);

        let text = agent.generate_conclusions("goal", &[]).await;
        assert_eq!(text, super::INSUFFICIENT_FINDINGS);
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_failure_is_neutral() {
        let (agent, _) = agent(ScriptedBackend::new("").failing(), Role::Evaluator);
        let evaluation = agent.evaluate("objective", "candidate").await;
        assert_eq!(evaluation.confidence, 50.0);
    }
}
