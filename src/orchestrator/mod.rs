//! Director/Manager hierarchy
//!
//! `delegate_goal` hands the same goal to every manager, collects one report
//! per subtask and folds them into a `Summary`. `run` wraps it in a session:
//! role selection, optional objective refinement and specialist team, then
//! conclusions and an optional executive summary.

mod aggregate;
mod manager;

pub use aggregate::{aggregate, key_findings, render_final_report};
pub use manager::{AgentPicker, Crew, Manager, Reviewers};

use crate::agent::{Agent, FeedbackLog, PromptRefiner, Role, TeamAssembler};
use crate::classifier::{AgentSelector, TaskClassifier, TaskKind};
use crate::config::OrchestratorConfig;
use crate::execution::{CommandRunner, ExecutionAgent, ProcessSandbox};
use crate::gateway::ModelGateway;
use crate::models::{Goal, ManagerReport, RunDetails, Summary};
use crate::planner::{ModelPlanner, Planner};
use crate::refinement::RefinementPolicy;
use crate::session::Session;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Routing switches for one delegation.
#[derive(Debug, Clone, Copy)]
struct Routing {
    execution: bool,
}

/// Main orchestrator. Agents are built once at bootstrap and live for the
/// process; specialists are built per run.
pub struct Orchestrator {
    config: OrchestratorConfig,
    director: Agent,
    managers: Vec<Manager>,
    individuals: Vec<Agent>,
    execution: ExecutionAgent,
    evaluator: Agent,
    critique: Agent,
    synthesizer: Agent,
    communicator: Agent,
    refiner: PromptRefiner,
    selector: AgentSelector,
    picker: AgentPicker,
}

impl Orchestrator {
    /// Build every agent from `config`, sharing one gateway and one feedback log.
    pub fn bootstrap(
        config: OrchestratorConfig,
        gateway: Arc<ModelGateway>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let feedback = Arc::new(FeedbackLog::new());
        let make = |name: String, role: Role| {
            Agent::new(
                name,
                role,
                template_override(&config, role),
                Arc::clone(&gateway),
                Arc::clone(&feedback),
            )
        };

        let director = make("Director".to_string(), Role::Director);

        let managers = (1..=config.team.managers)
            .map(|i| {
                let agent = make(format!("Manager {}", i), Role::Manager);
                let planner = ModelPlanner::new(agent.clone(), config.team.fallback_subtasks.clone());
                Manager::new(agent, Arc::new(planner))
            })
            .collect::<Vec<_>>();

        let individuals = (1..=config.team.individuals)
            .map(|i| make(format!("Individual {}", i), Role::Individual))
            .collect::<Vec<_>>();

        let execution = ExecutionAgent::new(make("Execution Agent".to_string(), Role::Execution), runner);
        let evaluator = make("Evaluator".to_string(), Role::Evaluator);
        let critique = make("Critique".to_string(), Role::Critique);
        let synthesizer = make("Synthesizer".to_string(), Role::Synthesizer);
        let communicator = make("Communicator".to_string(), Role::Communicator);
        let refiner = PromptRefiner::new(
            make("Prompt Refiner".to_string(), Role::PromptRefiner),
            config.confidence_threshold,
            config.max_refinement_attempts,
        );
        let selector = AgentSelector::new(director.clone(), config.domain_exclusions.clone());
        let picker = AgentPicker::new(config.team.routing_seed);

        info!(
            backend = %gateway.backend_name(),
            managers = managers.len(),
            individuals = individuals.len(),
            "Orchestrator bootstrapped"
        );

        Self {
            config,
            director,
            managers,
            individuals,
            execution,
            evaluator,
            critique,
            synthesizer,
            communicator,
            refiner,
            selector,
            picker,
        }
    }

    /// Bootstrap with the configured model backend and a process sandbox.
    pub fn from_config(config: OrchestratorConfig) -> crate::Result<Self> {
        let gateway = Arc::new(ModelGateway::from_config(&config.gateway)?);
        let runner = Arc::new(ProcessSandbox::from_config(&config.execution));
        Ok(Self::bootstrap(config, gateway, runner))
    }

    /// Replace every manager's planner.
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        for manager in &mut self.managers {
            manager.set_planner(Arc::clone(&planner));
        }
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Classify a single task with the first manager (the director when there
    /// are no managers).
    pub async fn classify(&self, task: &str) -> TaskKind {
        let agent = self
            .managers
            .first()
            .map(Manager::agent)
            .unwrap_or(&self.director);
        TaskClassifier::new(agent.clone()).classify(task).await
    }

    /// Delegate `goal` to every manager and summarise. Never fails.
    pub async fn delegate_goal(&self, goal: &str) -> Summary {
        let start_time = Instant::now();
        info!(goal = %goal, "Delegating goal");

        let routing = Routing {
            execution: self.config.execution.enabled,
        };
        let context = format!("Overall goal: {}", goal);
        let reports = self.delegate(goal, routing, &[], context).await;

        let findings = key_findings(&reports);
        let recommendations = self.director.generate_conclusions(goal, &findings).await;
        let summary = aggregate(goal, reports, recommendations);

        info!(
            status = %summary.overall_status,
            total = summary.total_subtasks,
            completed = summary.completed_subtasks,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Goal delegated"
        );
        summary
    }

    /// Full session run for a goal within its domain. Never fails.
    pub async fn run(&self, goal: &Goal) -> Summary {
        let start_time = Instant::now();
        let problem = goal.description.as_str();
        let domain = goal.domain.as_str();
        let mut session = Session::new(domain);
        info!(goal_id = %goal.goal_id, session_id = %session.id, domain = %domain, "Run started");

        session.active_agents = self.selector.select_agents(problem, domain).await;

        let mut objective_confidence = None;
        if session.has_role(Role::PromptRefiner) {
            let (objective, confidence) = self.refiner.refine(problem).await;
            session.refined_objective = Some(objective);
            objective_confidence = Some(confidence);
        }
        let objective = session
            .refined_objective
            .clone()
            .unwrap_or_else(|| problem.to_string());

        let specialists = if session.has_role(Role::Specialist) {
            TeamAssembler::new(self.director.clone()).assemble(&objective).await
        } else {
            Vec::new()
        };

        session.remember("Overall goal", objective.as_str());
        session.remember("Domain", domain);
        if !specialists.is_empty() {
            let names: Vec<&str> = specialists.iter().map(Agent::name).collect();
            session.remember("Specialists", names.join(", "));
        }

        let routing = Routing {
            execution: session.has_role(Role::Execution) && self.config.execution.enabled,
        };
        let reports = self
            .delegate(&objective, routing, &specialists, session.context_text())
            .await;

        let findings = key_findings(&reports);
        let recommendations = if session.has_role(Role::Synthesizer) {
            self.synthesizer.synthesize(&objective, &findings).await
        } else {
            self.director.generate_conclusions(&objective, &findings).await
        };

        let mut summary = aggregate(&objective, reports, recommendations);

        let executive_summary = if session.has_role(Role::Communicator) {
            self.communicator.communicate(&objective, &summary.final_report).await
        } else {
            None
        };

        summary.run = Some(RunDetails {
            goal_id: goal.goal_id,
            session_id: session.id,
            domain: session.domain.clone(),
            refined_objective: session.refined_objective.clone(),
            objective_confidence,
            active_roles: session.roster_names(),
            specialists: specialists.iter().map(|s| s.name().to_string()).collect(),
            executive_summary,
        });

        info!(
            session_id = %session.id,
            status = %summary.overall_status,
            average_quality = summary.average_quality,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Run finished"
        );
        summary
    }

    /// Managers run one after another; aggregation happens once all are done.
    async fn delegate(
        &self,
        goal: &str,
        routing: Routing,
        specialists: &[Agent],
        context: String,
    ) -> Vec<ManagerReport> {
        let crew = Crew {
            general: self.individuals.iter().chain(specialists).collect(),
            execution: routing.execution.then_some(&self.execution),
            reviewers: self.config.team.refine_subtask_results.then(|| Reviewers {
                evaluator: &self.evaluator,
                critique: &self.critique,
                policy: RefinementPolicy::from_config(&self.config),
            }),
            picker: &self.picker,
            context,
        };
        debug!(
            general = crew.general.len(),
            execution = crew.execution.is_some(),
            refine = crew.reviewers.is_some(),
            "Crew assembled"
        );

        let mut reports = Vec::with_capacity(self.managers.len());
        for manager in &self.managers {
            let manager_reports = manager.assign_task(goal, &crew).await;
            reports.push(ManagerReport {
                manager: manager.name().to_string(),
                reports: manager_reports,
            });
        }
        reports
    }
}

fn template_override(config: &OrchestratorConfig, role: Role) -> Option<String> {
    config
        .team
        .role_templates
        .iter()
        .find(|(name, _)| Role::from_name(name) == Some(role))
        .map(|(_, template)| template.clone())
}
