//! Manager: decompose, classify, route, collect

use crate::agent::Agent;
use crate::classifier::{TaskClassifier, TaskKind};
use crate::execution::ExecutionAgent;
use crate::models::{Report, Subtask};
use crate::planner::Planner;
use crate::refinement::{RefinementController, RefinementPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Seeded picker for the general-subtask pool, so routing is reproducible.
pub struct AgentPicker {
    rng: Mutex<StdRng>,
}

impl AgentPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Index into a pool of `len` agents; `None` for an empty pool.
    pub fn pick(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self.rng.lock() {
            Ok(mut rng) => Some(rng.random_range(0..len)),
            Err(_) => Some(0),
        }
    }
}

/// Everything a manager may route work to during one delegation.
pub struct Crew<'a> {
    pub general: Vec<&'a Agent>,
    pub execution: Option<&'a ExecutionAgent>,
    pub reviewers: Option<Reviewers<'a>>,
    pub picker: &'a AgentPicker,
    /// Shared context handed to every subtask.
    pub context: String,
}

/// Evaluator and critique used to refine general subtask results.
pub struct Reviewers<'a> {
    pub evaluator: &'a Agent,
    pub critique: &'a Agent,
    pub policy: RefinementPolicy,
}

pub struct Manager {
    agent: Agent,
    planner: Arc<dyn Planner>,
    classifier: TaskClassifier,
}

impl Manager {
    pub fn new(agent: Agent, planner: Arc<dyn Planner>) -> Self {
        let classifier = TaskClassifier::new(agent.clone());
        Self {
            agent,
            planner,
            classifier,
        }
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn set_planner(&mut self, planner: Arc<dyn Planner>) {
        self.planner = planner;
    }

    /// Decompose `goal`, route every subtask, and return one report per
    /// subtask in plan order.
    pub async fn assign_task(&self, goal: &str, crew: &Crew<'_>) -> Vec<Report> {
        let descriptions = self.planner.decompose(goal).await;
        info!(manager = %self.name(), subtasks = descriptions.len(), "Assigning subtasks");

        let mut reports = Vec::with_capacity(descriptions.len());
        for description in descriptions {
            let mut subtask = Subtask::pending(description);
            let report = self.handle(&mut subtask, crew).await;
            subtask.settle(&report);

            debug!(
                manager = %self.name(),
                subtask = %subtask.description,
                assignee = ?subtask.assignee,
                status = ?subtask.status,
                quality = report.quality,
                "Subtask settled"
            );
            reports.push(report);
        }
        reports
    }

    async fn handle(&self, subtask: &mut Subtask, crew: &Crew<'_>) -> Report {
        let kind = self.classifier.classify(&subtask.description).await;
        subtask.kind = Some(kind);

        if kind == TaskKind::Programmatic {
            match crew.execution {
                Some(executor) => {
                    subtask.assignee = Some(executor.name().to_string());
                    return executor.perform_task(&subtask.description).await;
                }
                None => warn!(
                    manager = %self.name(),
                    subtask = %subtask.description,
                    "Execution unavailable, routing programmatic subtask as general"
                ),
            }
        }

        let Some(agent) = crew.picker.pick(crew.general.len()).map(|i| crew.general[i]) else {
            warn!(manager = %self.name(), subtask = %subtask.description, "No general agent available");
            return Report::failed(&subtask.description, "No agent available for general subtasks.");
        };
        subtask.assignee = Some(agent.name().to_string());

        let report = agent.perform_task(&subtask.description, &crew.context).await;
        match &crew.reviewers {
            Some(reviewers) => refine_report(report, &subtask.description, agent, reviewers).await,
            None => report,
        }
    }
}

/// Run a completed report's result through its own refinement controller.
/// A revised result takes the evaluator's score as its quality, since the
/// author's self-score was for the draft.
async fn refine_report(mut report: Report, task: &str, author: &Agent, reviewers: &Reviewers<'_>) -> Report {
    let Some(result) = report.result.clone().filter(|_| report.is_completed()) else {
        return report;
    };

    let controller = RefinementController::new(reviewers.evaluator, reviewers.critique, reviewers.policy);
    let outcome = controller.run(task, author, result.clone()).await;

    if outcome.best != result {
        report.quality = outcome.best_score.round().clamp(0.0, 100.0) as u8;
        report.remarks = format!(
            "{} Revised after review ({} rounds).",
            report.remarks.trim_end(),
            outcome.rounds
        );
    }
    report.result = Some(outcome.best);
    report.confidence = Some(outcome.best_score);
    report
}
