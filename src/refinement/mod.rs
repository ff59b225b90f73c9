//! Refinement controller
//!
//! Evaluate → critique → re-evaluate, bounded by a confidence threshold and an
//! iteration budget:
//!
//! ```text
//! INITIAL → EVALUATING → CONVERGED
//!                      ↘ REFINING → EVALUATING → …
//!                      ↘ TERMINATED (budget spent)
//! ```
//!
//! The best-scoring candidate is tracked separately from the working
//! candidate and is what the controller returns. Termination on budget is a
//! best-effort exit, not an error.

use crate::agent::Agent;
use crate::config::OrchestratorConfig;
use crate::gateway::is_gateway_failure;
use crate::models::Evaluation;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum RefinementState {
    Initial,
    Evaluating,
    Refining,
    Converged,
    Terminated,
}

#[derive(Debug, Clone, Copy)]
pub struct RefinementPolicy {
    pub threshold: f64,
    /// Maximum critique rounds.
    pub max_iterations: usize,
}

impl RefinementPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            threshold: f64::from(config.confidence_threshold),
            max_iterations: config.max_confidence_iterations,
        }
    }
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefinementOutcome {
    pub best: String,
    pub best_score: f64,
    pub final_state: RefinementState,
    /// Critique rounds performed.
    pub rounds: usize,
    pub evaluations: Vec<Evaluation>,
    pub trace: Vec<String>,
}

/// One controller per evaluated task. Holds no state between runs.
pub struct RefinementController<'a> {
    evaluator: &'a Agent,
    critique: &'a Agent,
    policy: RefinementPolicy,
}

impl<'a> RefinementController<'a> {
    pub fn new(evaluator: &'a Agent, critique: &'a Agent, policy: RefinementPolicy) -> Self {
        Self {
            evaluator,
            critique,
            policy,
        }
    }

    /// Refine `initial`, produced by `subject`, toward `objective`. Evaluation
    /// feedback is recorded on `subject` after every round.
    pub async fn run(&self, objective: &str, subject: &Agent, initial: String) -> RefinementOutcome {
        let mut state = RefinementState::Initial;
        let mut trace = vec![format!("{:?}: candidate from {}", state, subject.name())];

        let mut candidate = initial;
        let mut best = candidate.clone();
        let mut best_score = f64::NEG_INFINITY;
        let mut rounds = 0;
        let mut evaluations = Vec::new();

        loop {
            state = RefinementState::Evaluating;
            let evaluation = self.evaluator.evaluate(objective, &candidate).await;
            let score = evaluation.confidence;

            debug!(agent = %subject.name(), iteration = rounds, confidence = score, "Candidate evaluated");
            trace.push(format!("{:?}: round {} scored {:.1}", state, rounds, score));

            if score > best_score {
                best = candidate.clone();
                best_score = score;
            }

            if !is_gateway_failure(&evaluation.raw) {
                subject.update_from_feedback(&candidate, &evaluation.feedback_note());
            }

            if score >= self.policy.threshold {
                state = RefinementState::Converged;
                evaluations.push(evaluation);
                break;
            }
            if rounds >= self.policy.max_iterations {
                state = RefinementState::Terminated;
                evaluations.push(evaluation);
                break;
            }

            state = RefinementState::Refining;
            rounds += 1;

            let revision = self.critique.revise(objective, &candidate, &evaluation).await;
            evaluations.push(evaluation);

            if is_gateway_failure(&revision) || revision.is_empty() || revision == candidate.trim() {
                trace.push(format!("{:?}: round {} kept candidate", state, rounds));
            } else {
                trace.push(format!("{:?}: round {} adopted revision", state, rounds));
                candidate = revision;
            }
        }

        trace.push(format!("{:?}: best score {:.1}", state, best_score));
        info!(
            agent = %subject.name(),
            final_state = ?state,
            rounds,
            confidence = best_score,
            "Refinement finished"
        );

        RefinementOutcome {
            best,
            best_score,
            final_state: state,
            rounds,
            evaluations,
            trace,
        }
    }
}
