//! Prompt templates and per-behaviour instructions
//!
//! Templates use three named placeholders: `{problem}` (the objective or task),
//! `{context}` (accumulated context, "None" when empty) and `{subject}` (the
//! material or instruction a behaviour supplies).

use super::Role;
use crate::extraction::{END_DELIMITER, START_DELIMITER};

pub fn default_template(role: Role) -> &'static str {
    match role {
        Role::Director => DIRECTOR,
        Role::Manager => MANAGER,
        Role::Individual => INDIVIDUAL,
        Role::Execution => EXECUTION,
        Role::Evaluator => EVALUATOR,
        Role::Critique => CRITIQUE,
        Role::Synthesizer => SYNTHESIZER,
        Role::Communicator => COMMUNICATOR,
        Role::PromptRefiner => PROMPT_REFINER,
        Role::Specialist => SPECIALIST,
    }
}

const DIRECTOR: &str = "You are the Director. You own the overall goal, oversee the managers \
working on it and turn their results into conclusions.

Goal: {problem}

Context:
{context}

{subject}";

const MANAGER: &str = "You are a Manager. You break goals into subtasks and route each subtask \
to the team member best suited to it.

Goal: {problem}

Context:
{context}

{subject}";

const INDIVIDUAL: &str = "You are an Individual agent responsible for completing one well-defined task.

Task: {problem}

Context:
{context}

{subject}";

const EXECUTION: &str = "You are the Execution agent. You turn a task into a single command that \
can be run on a computer.

Task: {problem}

{subject}";

const EVALUATOR: &str = "You are the Evaluator. Assess the answer below against the objective. \
Keep each explanation to one sentence and give at most three improvements.

Objective: {problem}

Answer under review:
{subject}

Return only a JSON object between <<<JSON>>> and <<<END>>>, with no other text:
<<<JSON>>>
{\"Accuracy\": \"X/10 - one sentence\", \"Completeness\": \"X/10 - one sentence\", \
\"Improvements\": [\"suggestion\"], \"Confidence Score\": \"X/10\"}
<<<END>>>";

const CRITIQUE: &str = "You are the Critique agent. Rewrite the answer below so it is clearer, \
more complete and more actionable, addressing the evaluation feedback.

Objective: {problem}

Evaluation feedback:
{context}

Current answer:
{subject}

Return only the improved answer as plain text.";

const SYNTHESIZER: &str = "You are the Synthesizer. Combine the findings below into one coherent \
set of recommendations for the objective.

Objective: {problem}

Findings:
{subject}

Respond with a short list of concrete recommendations.";

const COMMUNICATOR: &str = "You are the Communicator. Rewrite the report below as a concise \
executive summary for a non-technical reader.

Objective: {problem}

Report:
{subject}";

const PROMPT_REFINER: &str = "You are the Prompt Refiner. Rewrite the problem statement below so \
it is specific, measurable and actionable, with any key scope or constraints made explicit.

Problem statement: {problem}

Return only a JSON object between <<<JSON>>> and <<<END>>>, with no other text:
<<<JSON>>>
{\"Refined Objective\": \"improved statement\", \"Confidence Score\": \"XX%\"}
<<<END>>>";

const SPECIALIST: &str = "You are a specialist contributing your expertise to the task below.

Task: {problem}

Context:
{context}

{subject}";

/// Template for a dynamically assembled expert.
pub fn specialist_template(title: &str, definition: &str) -> String {
    format!(
        "You are an expert in '{}'. Your expertise: {}\n\
         Using your specialized knowledge, contribute to the task below.\n\n\
         Task: {{problem}}\n\nContext:\n{{context}}\n\n{{subject}}",
        title, definition
    )
}

// ===== Behaviour instructions =====

pub fn report_instruction() -> String {
    format!(
        "Complete the task and report on it. Return only a JSON object between {start} and {end}:\n\
         {start}\n\
         {{\"status\": \"completed or failed\", \"quality\": 0-100, \"result\": \"specific outcome\", \
         \"remarks\": \"brief explanation\"}}\n\
         {end}",
        start = START_DELIMITER,
        end = END_DELIMITER
    )
}

pub const DECOMPOSE_INSTRUCTION: &str = "Break the goal into actionable subtasks. \
Respond strictly with a JSON array of strings, one subtask per string. \
If no subtasks can be derived, respond with []. Do not add any other text.";

pub const DECOMPOSE_RETRY_INSTRUCTION: &str = "List three to five short subtasks for the goal. \
Example: [\"Subtask one\", \"Subtask two\", \"Subtask three\"]. Reply with the JSON array only.";

pub fn classify_instruction(task: &str) -> String {
    format!(
        "Decide whether the task can be completed by running a program or shell command \
         (\"programmatic\") or needs reasoning and writing (\"general\").\n\n\
         Task to classify: {}\n\n\
         Return only a JSON object: {{\"task_type\": \"programmatic\" or \"general\"}}",
        task
    )
}

pub fn selection_instruction(candidates: &[&str]) -> String {
    format!(
        "Choose the agents needed to solve the goal from this list: {}.\n\
         Return only a comma-separated list of agent names.",
        candidates.join(", ")
    )
}

pub fn conclusions_instruction(findings: &[String]) -> String {
    let summary: String = findings
        .iter()
        .map(|finding| format!("- {}\n", finding))
        .collect();
    format!(
        "Summary of key findings:\n{}\n\
         Generate actionable conclusions that serve the goal, as a short list:\n\
         - Conclusion 1\n- Conclusion 2\n- Conclusion 3 (if applicable)",
        summary
    )
}

pub fn command_instruction() -> String {
    format!(
        "Write one command that accomplishes the task. Return only a JSON object between {start} and {end}:\n\
         {start}\n\
         {{\"command_type\": \"python or shell\", \"command\": \"the command\"}}\n\
         {end}",
        start = START_DELIMITER,
        end = END_DELIMITER
    )
}

pub fn team_definition_instruction() -> String {
    format!(
        "List the expert roles that could contribute to the goal, each with a one-sentence \
         definition of its expertise. Return only a JSON object mapping title to definition \
         between {start} and {end}:\n\
         {start}\n\
         {{\"Financial Analyst\": \"Analyzes market trends and financial data.\"}}\n\
         {end}",
        start = START_DELIMITER,
        end = END_DELIMITER
    )
}

pub fn team_selection_instruction(definitions: &[(String, String)]) -> String {
    let listing: String = definitions
        .iter()
        .map(|(title, definition)| format!("- {}: {}\n", title, definition))
        .collect();
    format!(
        "Expert definitions:\n{}\n\
         Decide which of these roles are essential for the goal. \
         Return only a comma-separated list of titles.",
        listing
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_takes_the_problem() {
        for role in Role::ALL {
            assert!(default_template(role).contains("{problem}"), "{}", role);
        }
    }

    #[test]
    fn test_specialist_template_keeps_placeholders() {
        let template = specialist_template("Risk Assessor", "Evaluates risk.");
        assert!(template.contains("'Risk Assessor'"));
        assert!(template.contains("{problem}"));
        assert!(template.contains("{context}"));
    }
}
