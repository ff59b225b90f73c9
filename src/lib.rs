//! Hierarchical Agent Orchestrator
//!
//! Decomposes a goal through a Director/Manager hierarchy of LLM-backed
//! agents:
//! - Managers break the goal into subtasks and route each one
//! - Programmatic subtasks run as sandboxed commands, general ones go to agents
//! - Results are evaluated and revised until confident or out of budget
//! - Everything folds into a single summary with a final report
//!
//! UNIFIED LOOP:
//! SELECT → REFINE → DECOMPOSE → ROUTE → EVALUATE → REVISE? → AGGREGATE

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod extraction;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod refinement;
pub mod session;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::OrchestratorConfig;
pub use orchestrator::Orchestrator;
