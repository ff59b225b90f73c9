//! Execution agent for programmatic subtasks
//!
//! The model writes a command; the command runs in a sandboxed child process
//! and its exit status decides the report. Nothing generated by the model is
//! run without passing the blocklist first.

use crate::agent::{prompts, Agent};
use crate::config::ExecutionConfig;
use crate::error::OrchestrationError;
use crate::extraction::extract_structured;
use crate::gateway::is_gateway_failure;
use crate::models::Report;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

lazy_static! {
    static ref ANSI_SEQUENCE: Regex = Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap();
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Script,
    Shell,
}

impl CommandKind {
    /// Map a declared command type onto a kind. An absent type is inferred
    /// from the command text; an unknown one is an error.
    pub fn normalize(declared: Option<&str>, command: &str) -> Result<CommandKind> {
        let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) else {
            return Ok(Self::infer(command));
        };

        match declared.to_lowercase().as_str() {
            "python" | "python3" | "py" | "script" => Ok(CommandKind::Script),
            "shell" | "bash" | "sh" | "zsh" | "cmd" | "powershell" => Ok(CommandKind::Shell),
            other => Err(OrchestrationError::Execution(format!(
                "Unsupported command type: {}",
                other
            ))),
        }
    }

    pub fn infer(command: &str) -> CommandKind {
        const SCRIPT_MARKERS: [&str; 5] = ["import ", "print(", "def ", "os.", "for i in range("];
        if SCRIPT_MARKERS.iter().any(|m| command.contains(m)) {
            CommandKind::Script
        } else {
            CommandKind::Shell
        }
    }
}

/// Strip terminal escape sequences and stray control characters, and undo
/// `\%` escaping that shells would otherwise pass through literally.
pub fn neutralize_escapes(command: &str, kind: CommandKind) -> String {
    let without_ansi = ANSI_SEQUENCE.replace_all(command, "");
    let cleaned: String = without_ansi
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    match kind {
        CommandKind::Shell => cleaned.replace("\\%", "%"),
        CommandKind::Script => cleaned,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub command: String,
    pub remarks: Option<String>,
}

impl CommandRequest {
    pub fn new(kind: CommandKind, command: impl Into<String>) -> Self {
        let command = neutralize_escapes(&command.into(), kind);
        Self {
            kind,
            command,
            remarks: None,
        }
    }

    /// Build from the model's `{command_type, command, remarks}` reply.
    pub fn from_value(value: &Value) -> Result<Self> {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OrchestrationError::Execution("No command in reply".to_string()))?;

        let declared = value
            .get("command_type")
            .or_else(|| value.get("kind"))
            .and_then(Value::as_str);
        let kind = CommandKind::normalize(declared, command)?;

        let mut request = Self::new(kind, command);
        request.remarks = value
            .get("remarks")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command request. Errors mean the command could not run at all.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome>;
}

/// Child-process runner with a blocklist and a hard timeout.
pub struct ProcessSandbox {
    python: String,
    shell: String,
    timeout: Duration,
    blocked: Vec<String>,
}

impl ProcessSandbox {
    pub fn new(python: String, shell: String, timeout: Duration, blocked: Vec<String>) -> Self {
        Self {
            python,
            shell,
            timeout,
            blocked,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.python.clone(),
            config.shell.clone(),
            Duration::from_secs(config.timeout_secs),
            config.blocked_patterns.clone(),
        )
    }

    /// Reject commands matching a blocked pattern. Whitespace is ignored on
    /// both sides so spacing tricks do not slip through.
    pub fn check(&self, command: &str) -> Result<()> {
        let squashed: String = command.chars().filter(|c| !c.is_whitespace()).collect();
        for pattern in &self.blocked {
            let pattern: String = pattern.chars().filter(|c| !c.is_whitespace()).collect();
            if !pattern.is_empty() && squashed.contains(&pattern) {
                return Err(OrchestrationError::CommandBlocked(command.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for ProcessSandbox {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        self.check(&request.command)?;

        let program = match request.kind {
            CommandKind::Script => &self.python,
            CommandKind::Shell => &self.shell,
        };

        let mut cmd = Command::new(program);
        cmd.arg("-c")
            .arg(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(kind = ?request.kind, command = %request.command, "Spawning command");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                OrchestrationError::Execution(format!(
                    "Command timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })??;

        Ok(CommandOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Execution-role agent paired with a command runner.
pub struct ExecutionAgent {
    agent: Agent,
    runner: Arc<dyn CommandRunner>,
}

impl ExecutionAgent {
    pub fn new(agent: Agent, runner: Arc<dyn CommandRunner>) -> Self {
        Self { agent, runner }
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    /// Generate a command for `task`, run it, and fold the outcome into a
    /// report. Exit 0 is quality 100; anything else is a failed report with
    /// the error text as remarks.
    pub async fn perform_task(&self, task: &str) -> Report {
        info!(agent = %self.agent.name(), subtask = %task, "Generating command");

        let raw = self
            .agent
            .execute_with(task, "", &prompts::command_instruction())
            .await;
        if is_gateway_failure(&raw) {
            return self.failed(task, "Model gateway unavailable.");
        }

        let request = match extract_structured(&raw)
            .ok_or_else(|| OrchestrationError::Execution("Command reply could not be parsed".to_string()))
            .and_then(|value| CommandRequest::from_value(&value))
        {
            Ok(request) => request,
            Err(e) => {
                warn!(subtask = %task, error = %e, "No runnable command");
                return self.failed(task, e.to_string());
            }
        };

        info!(kind = ?request.kind, command = %request.command, "Running command");

        match self.runner.run(&request).await {
            Ok(outcome) if outcome.succeeded() => {
                let result = if outcome.stdout.is_empty() {
                    "Command executed with no output.".to_string()
                } else {
                    outcome.stdout
                };
                let remarks = request
                    .remarks
                    .unwrap_or_else(|| format!("Ran `{}`.", request.command));
                Report::completed(task, 100, Some(result), remarks).with_agent(self.agent.name())
            }
            Ok(outcome) => {
                let remarks = if outcome.stderr.is_empty() {
                    format!("Command exited with status {:?}", outcome.exit_code)
                } else {
                    outcome.stderr
                };
                warn!(subtask = %task, exit_code = ?outcome.exit_code, "Command failed");
                self.failed(task, remarks)
            }
            Err(e) => {
                warn!(subtask = %task, error = %e, "Command could not run");
                self.failed(task, e.to_string())
            }
        }
    }

    fn failed(&self, task: &str, remarks: impl Into<String>) -> Report {
        Report::failed(task, remarks).with_agent(self.agent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{FeedbackLog, Role};
    use crate::config::ExecutionConfig;
    use crate::gateway::{ModelGateway, ScriptedBackend};
    use crate::models::ReportStatus;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeRunner {
        outcome: CommandOutcome,
        seen: Mutex<Vec<CommandRequest>>,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.outcome.clone())
        }
    }

    fn execution_agent(reply: &str, outcome: CommandOutcome) -> (ExecutionAgent, Arc<FakeRunner>) {
        let gateway = Arc::new(ModelGateway::new(
            Arc::new(ScriptedBackend::new(reply)),
            Duration::from_secs(5),
        ));
        let agent = Agent::new("OS Agent", Role::Execution, None, gateway, Arc::new(FeedbackLog::new()));
        let runner = Arc::new(FakeRunner {
            outcome,
            seen: Mutex::new(Vec::new()),
        });
        (ExecutionAgent::new(agent, runner.clone()), runner)
    }

    #[test]
    fn test_kind_normalization() {
        assert_eq!(CommandKind::normalize(Some("python"), "x").unwrap(), CommandKind::Script);
        assert_eq!(CommandKind::normalize(Some("CMD"), "dir").unwrap(), CommandKind::Shell);
        assert_eq!(CommandKind::normalize(None, "print(1)").unwrap(), CommandKind::Script);
        assert_eq!(CommandKind::normalize(None, "ls *.txt").unwrap(), CommandKind::Shell);
        assert!(CommandKind::normalize(Some("fortran"), "x").is_err());
    }

    #[test]
    fn test_neutralize_escapes() {
        let command = "date +\\%Y-\\%m\x1b[31m\x07";
        assert_eq!(neutralize_escapes(command, CommandKind::Shell), "date +%Y-%m");

        let script = "print('a\\%b')\nprint(2)";
        assert_eq!(neutralize_escapes(script, CommandKind::Script), script);
    }

    #[test]
    fn test_request_from_value() {
        let request = CommandRequest::from_value(&json!({
            "command_type": "shell",
            "command": "ls *.txt",
            "remarks": "lists text files"
        }))
        .unwrap();
        assert_eq!(request.kind, CommandKind::Shell);
        assert_eq!(request.remarks.as_deref(), Some("lists text files"));

        assert!(CommandRequest::from_value(&json!({"command_type": "shell"})).is_err());
    }

    #[test]
    fn test_blocklist() {
        let sandbox = ProcessSandbox::from_config(&ExecutionConfig::default());
        assert!(sandbox.check("rm  -rf   /").is_err());
        assert!(sandbox.check(":(){:|:&};:").is_err());
        assert!(sandbox.check("ls -la").is_ok());
    }

    #[tokio::test]
    async fn test_sandbox_runs_shell() {
        let sandbox = ProcessSandbox::from_config(&ExecutionConfig::default());

        let ok = sandbox
            .run(&CommandRequest::new(CommandKind::Shell, "echo hello"))
            .await
            .unwrap();
        assert!(ok.succeeded());
        assert_eq!(ok.stdout, "hello");

        let failed = sandbox
            .run(&CommandRequest::new(CommandKind::Shell, "echo oops >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(failed.stderr, "oops");
    }

    #[tokio::test]
    async fn test_sandbox_timeout() {
        let sandbox = ProcessSandbox::new(
            "python3".into(),
            "sh".into(),
            Duration::from_millis(100),
            Vec::new(),
        );
        let result = sandbox
            .run(&CommandRequest::new(CommandKind::Shell, "sleep 5"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_successful_command_report() {
        let reply = r#"<<<JSON>>>{"command_type": "shell", "command": "ls *.txt", "remarks": "lists files"}<<<END>>>"#;
        let (agent, runner) = execution_agent(
            reply,
            CommandOutcome {
                exit_code: Some(0),
                stdout: "a.txt\nb.txt".into(),
                stderr: String::new(),
            },
        );

        let report = agent.perform_task("List all text files in a directory").await;
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.quality, 100);
        assert_eq!(report.result.as_deref(), Some("a.txt\nb.txt"));
        assert_eq!(runner.seen.lock().unwrap()[0].command, "ls *.txt");
    }

    #[tokio::test]
    async fn test_nonzero_exit_report() {
        let reply = r#"{"command_type": "shell", "command": "cat missing.txt"}"#;
        let (agent, _) = execution_agent(
            reply,
            CommandOutcome {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "cat: missing.txt: No such file or directory".into(),
            },
        );

        let report = agent.perform_task("Show missing.txt").await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.quality, 0);
        assert!(report.result.is_none());
        assert!(report.remarks.contains("No such file"));
    }

    #[tokio::test]
    async fn test_unsupported_type_report() {
        let reply = r#"{"command_type": "cobol", "command": "DISPLAY 'HI'"}"#;
        let (agent, runner) = execution_agent(reply, CommandOutcome {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        });

        let report = agent.perform_task("Say hi").await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.remarks.contains("Unsupported command type"));
        assert!(runner.seen.lock().unwrap().is_empty());
    }
}
