//! Shell command runner
//!
//! Runs model-proposed commands through `sh -c` in the project root with a
//! timeout. Commands that start with the configured terminal launcher open
//! their own window and are spawned without waiting. Nothing is sandboxed.

use crate::collaborators::CommandRunner;
use crate::errors::{AgentError, Result};
use crate::tools::types::CommandOutput;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// Default command timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// `CommandRunner` backed by the system shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
    terminal_launcher: Option<String>,
}

impl ShellRunner {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_seconds.max(1)),
            terminal_launcher: None,
        }
    }

    pub fn with_terminal_launcher(mut self, launcher: impl Into<String>) -> Self {
        let launcher = launcher.into();
        self.terminal_launcher = (!launcher.trim().is_empty()).then_some(launcher);
        self
    }

    fn launches_terminal(&self, command: &str) -> bool {
        self.terminal_launcher
            .as_deref()
            .map(|launcher| command.trim_start().starts_with(launcher))
            .unwrap_or(false)
    }

    fn shell(command: &str, cwd: &Path) -> Command {
        #[cfg(unix)]
        let mut cmd = {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        #[cfg(windows)]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        };
        cmd.current_dir(cwd);
        cmd
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        if command.trim().is_empty() {
            return Err(AgentError::Generic("command cannot be empty".to_string()));
        }

        if self.launches_terminal(command) {
            Self::shell(command, cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            tracing::info!(%command, "launched in separate terminal");
            return Ok(CommandOutput::detached(command));
        }

        let start = Instant::now();
        let mut cmd = Self::shell(command, cwd);
        cmd.kill_on_drop(true);

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput::completed(
                    command,
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                    output.status.code(),
                    start.elapsed(),
                );
                tracing::info!(%command, exit_code = ?result.exit_code, "command finished");
                Ok(result)
            }
            Ok(Err(e)) => Err(AgentError::IoError(e)),
            Err(_) => {
                tracing::warn!(%command, timeout_secs = self.timeout.as_secs(), "command timed out");
                Ok(CommandOutput::timed_out(command, start.elapsed()))
            }
        }
    }
}
