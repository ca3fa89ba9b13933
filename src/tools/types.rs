//! Result types for file mutations and shell commands

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a successful mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Created,
    Overwritten,
    DirectoryCreated,
}

/// Per-target result of applying a directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// Target path as requested (relative to the project root)
    pub target: String,
    pub success: bool,
    pub kind: Option<MutationKind>,
    pub error: Option<String>,
}

impl MutationOutcome {
    pub fn success(target: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            target: target.into(),
            success: true,
            kind: Some(kind),
            error: None,
        }
    }

    pub fn failure(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            success: false,
            kind: None,
            error: Some(error.into()),
        }
    }
}

/// Captured result of one shell command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed, timed out or left running
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Launched in a separate terminal without waiting
    pub detached: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn completed(
        command: impl Into<String>,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            stdout,
            stderr,
            exit_code,
            timed_out: false,
            detached: false,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn timed_out(command: impl Into<String>, duration: Duration) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: true,
            detached: false,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn detached(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            detached: true,
            duration_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.detached || self.exit_code == Some(0)
    }

    /// Output text in the shape fed back to the model
    pub fn combined(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            format!("STDOUT:\n{}\n\nSTDERR:\n{}", self.stdout, self.stderr)
        }
    }
}
