//! Core data models for the orchestrator

use crate::extraction::{extract_confidence, extract_structured};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Routing class of a subtask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Programmatic,
    General,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverallStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "partially completed")]
    PartiallyCompleted,
}

//
// ================= Goal =================
//

/// Objective plus the domain tag that scopes role exclusions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub goal_id: Uuid,
    pub description: String,
    pub domain: String,
}

impl Goal {
    pub fn new(description: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            goal_id: Uuid::new_v4(),
            description: description.into(),
            domain: domain.into(),
        }
    }
}

//
// ================= Subtask =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub description: String,
    pub kind: Option<TaskKind>,
    pub status: SubtaskStatus,
    pub assignee: Option<String>,
}

impl Subtask {
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind: None,
            status: SubtaskStatus::Pending,
            assignee: None,
        }
    }

    /// Fold a finished report back into the subtask record.
    pub fn settle(&mut self, report: &Report) {
        self.status = match report.status {
            ReportStatus::Completed => SubtaskStatus::Completed,
            ReportStatus::Failed => SubtaskStatus::Failed,
        };
    }
}

//
// ================= Report =================
//

/// Outcome of one subtask. Always fully populated: a failed report has
/// quality 0 and no result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub task: String,
    pub status: ReportStatus,
    pub quality: u8,
    pub result: Option<String>,
    pub remarks: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

const NO_REMARKS: &str = "No remarks provided.";

impl Report {
    pub fn completed(
        task: impl Into<String>,
        quality: u8,
        result: Option<String>,
        remarks: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            status: ReportStatus::Completed,
            quality: quality.min(100),
            result: result.filter(|r| !r.trim().is_empty()),
            remarks: remarks.into(),
            confidence: None,
            agent: None,
        }
    }

    pub fn failed(task: impl Into<String>, remarks: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: ReportStatus::Failed,
            quality: 0,
            result: None,
            remarks: remarks.into(),
            confidence: None,
            agent: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReportStatus::Completed
    }

    /// Coerce a loosely-shaped model reply into the canonical report shape.
    ///
    /// The subtask text passed in wins over whatever the model echoed back.
    /// Missing or mistyped fields take defaults; nothing here fails.
    pub fn from_value(task: &str, value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Report::failed(task, "Agent reply was not a report object.");
        };

        let field = |name: &str| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        };

        let status = field("status")
            .and_then(Value::as_str)
            .map(parse_report_status)
            .unwrap_or(ReportStatus::Failed);

        let remarks = field("remarks")
            .and_then(value_to_text)
            .unwrap_or_else(|| NO_REMARKS.to_string());

        if status == ReportStatus::Failed {
            return Report::failed(task, remarks);
        }

        let quality = field("quality").map(coerce_quality).unwrap_or(0);
        let result = field("result").and_then(value_to_text);

        Report::completed(task, quality, result, remarks)
    }
}

fn parse_report_status(raw: &str) -> ReportStatus {
    match raw.trim().to_lowercase().as_str() {
        "completed" | "complete" | "done" | "success" | "succeeded" => ReportStatus::Completed,
        _ => ReportStatus::Failed,
    }
}

fn coerce_quality(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };
    raw.round().clamp(0.0, 100.0) as u8
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

//
// ================= Evaluation =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub accuracy: Option<String>,
    pub completeness: Option<String>,
    pub improvements: Vec<String>,
    /// Normalized to [0, 100].
    pub confidence: f64,
    #[serde(skip)]
    pub raw: String,
}

impl Evaluation {
    /// Build an evaluation from raw evaluator output. Unparseable output yields
    /// empty fields and the neutral confidence.
    pub fn from_response(raw: &str) -> Self {
        let structured = extract_structured(raw);
        let map = structured.as_ref().and_then(Value::as_object);

        let text_field = |name: &str| {
            map.and_then(|m| {
                m.iter()
                    .find(|(k, _)| k.to_lowercase().contains(name))
                    .and_then(|(_, v)| value_to_text(v))
            })
        };

        let improvements = map
            .and_then(|m| {
                m.iter()
                    .find(|(k, _)| k.to_lowercase().starts_with("improvement"))
                    .map(|(_, v)| v)
            })
            .map(|v| match v {
                Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
                other => value_to_text(other).into_iter().collect(),
            })
            .unwrap_or_default();

        Self {
            accuracy: text_field("accuracy"),
            completeness: text_field("completeness"),
            improvements,
            confidence: extract_confidence(raw),
            raw: raw.to_string(),
        }
    }

    /// Text appended to the evaluated agent's feedback log.
    pub fn feedback_note(&self) -> String {
        if self.improvements.is_empty() {
            self.raw.trim().to_string()
        } else {
            self.improvements.join("; ")
        }
    }
}

//
// ================= Summary =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub key_findings: Vec<String>,
    pub recommendations: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerReport {
    pub manager: String,
    pub reports: Vec<Report>,
}

/// Session-level details attached to a full `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetails {
    pub goal_id: Uuid,
    pub session_id: Uuid,
    pub domain: String,
    pub refined_objective: Option<String>,
    pub objective_confidence: Option<f64>,
    pub active_roles: Vec<String>,
    pub specialists: Vec<String>,
    pub executive_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub goal: String,
    pub overall_status: OverallStatus,
    pub total_subtasks: usize,
    pub completed_subtasks: usize,
    pub average_quality: f64,
    pub reports_by_manager: Vec<ManagerReport>,
    pub synthesized_answer: SynthesizedAnswer,
    pub final_report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunDetails>,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Programmatic => "programmatic",
            TaskKind::General => "general",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallStatus::Completed => "completed",
            OverallStatus::PartiallyCompleted => "partially completed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_coercion_defaults() {
        let value = json!({
            "task": "model echo that should be ignored",
            "status": "Completed",
            "quality": "87.6",
            "result": {"rows": 3},
        });

        let report = Report::from_value("count rows", &value);
        assert_eq!(report.task, "count rows");
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.quality, 88);
        assert_eq!(report.result.as_deref(), Some(r#"{"rows":3}"#));
        assert_eq!(report.remarks, NO_REMARKS);
    }

    #[test]
    fn test_failed_report_is_normalized() {
        let value = json!({
            "status": "failed",
            "quality": 70,
            "result": "partial output",
            "remarks": "timed out"
        });

        let report = Report::from_value("t", &value);
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.quality, 0);
        assert!(report.result.is_none());
        assert_eq!(report.remarks, "timed out");
    }

    #[test]
    fn test_non_object_reply() {
        let report = Report::from_value("t", &json!(["a", "b"]));
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.quality, 0);
    }

    #[test]
    fn test_evaluation_parsing() {
        let raw = r#"<<<JSON>>>
{
  "Accuracy": "7/10 - mostly right",
  "Completeness": "6/10 - misses costs",
  "Improvements": ["Quantify savings", "Name owners"],
  "Confidence Score": "7/10"
}
<<<END>>>"#;

        let evaluation = Evaluation::from_response(raw);
        assert_eq!(evaluation.accuracy.as_deref(), Some("7/10 - mostly right"));
        assert_eq!(evaluation.improvements.len(), 2);
        assert_eq!(evaluation.confidence, 70.0);
        assert_eq!(evaluation.feedback_note(), "Quantify savings; Name owners");
    }

    #[test]
    fn test_overall_status_serialization() {
        let json = serde_json::to_string(&OverallStatus::PartiallyCompleted).unwrap();
        assert_eq!(json, "\"partially completed\"");
    }
}
