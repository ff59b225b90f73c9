//! Folding manager reports into a `Summary`

use crate::models::{ManagerReport, OverallStatus, Summary, SynthesizedAnswer};
use std::fmt::Write;

const BANNER: &str = "==================== FINAL REPORT ====================";

/// Results of every completed report, in manager then plan order.
pub fn key_findings(reports_by_manager: &[ManagerReport]) -> Vec<String> {
    reports_by_manager
        .iter()
        .flat_map(|m| m.reports.iter())
        .filter(|r| r.is_completed())
        .filter_map(|r| r.result.clone())
        .filter(|r| !r.trim().is_empty())
        .collect()
}

/// Build the summary. Well-formed for zero managers, zero subtasks and
/// all-failed subtasks alike: an empty plan counts as completed with an
/// average quality of 0.
pub fn aggregate(goal: &str, reports_by_manager: Vec<ManagerReport>, recommendations: String) -> Summary {
    let reports = reports_by_manager.iter().flat_map(|m| m.reports.iter());

    let total_subtasks = reports.clone().count();
    let completed_subtasks = reports.clone().filter(|r| r.is_completed()).count();
    let total_quality: u32 = reports.map(|r| u32::from(r.quality)).sum();

    let average_quality = if total_subtasks == 0 {
        0.0
    } else {
        f64::from(total_quality) / total_subtasks as f64
    };
    let overall_status = if completed_subtasks == total_subtasks {
        OverallStatus::Completed
    } else {
        OverallStatus::PartiallyCompleted
    };

    let synthesized_answer = SynthesizedAnswer {
        key_findings: key_findings(&reports_by_manager),
        recommendations,
    };

    let mut summary = Summary {
        goal: goal.to_string(),
        overall_status,
        total_subtasks,
        completed_subtasks,
        average_quality,
        reports_by_manager,
        synthesized_answer,
        final_report: String::new(),
        run: None,
    };
    summary.final_report = render_final_report(&summary);
    summary
}

pub fn render_final_report(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "Goal: {}", summary.goal);
    let _ = writeln!(
        out,
        "Status: {} ({}/{} subtasks completed, average quality {:.1})",
        summary.overall_status,
        summary.completed_subtasks,
        summary.total_subtasks,
        summary.average_quality
    );

    let _ = writeln!(out, "\nKey Findings:");
    if summary.synthesized_answer.key_findings.is_empty() {
        let _ = writeln!(out, "- None");
    }
    for finding in &summary.synthesized_answer.key_findings {
        let _ = writeln!(out, "- {}", finding);
    }

    let _ = writeln!(out, "\nRecommendations:");
    let _ = writeln!(out, "{}", summary.synthesized_answer.recommendations.trim());
    let _ = write!(out, "{}", "=".repeat(BANNER.len()));
    out
}
