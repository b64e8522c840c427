//! Logged platform command invocation.
//!
//! The designer reports errors in a log file named by `/Out` rather than on
//! stderr. `CommandInvoker` appends the standard non-interactive flags and a
//! temporary `/Out` file, runs the command, and on failure turns the log
//! contents into a redacted `CommandFailed` error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::{redact_all, Credentials};
use crate::error::{DesignerError, Result};
use crate::exec::encoding::decode_log;
use crate::exec::runner::{ExecutionResult, ProcessRunner, DEFAULT_TIMEOUT};

/// Flags that suppress interactive dialogs on every invocation.
pub const STARTUP_FLAGS: &[&str] = &["/DisableStartupDialogs", "/DisableStartupMessages"];

/// Flag naming the file the platform writes its messages to.
pub const OUT_FLAG: &str = "/Out";

/// Runs one platform executable in a given mode with a captured message log.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    executable: PathBuf,
    runner: ProcessRunner,
    timeout: Option<Duration>,
    credentials: Vec<Credentials>,
}

impl CommandInvoker {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        CommandInvoker {
            executable: executable.into(),
            runner: ProcessRunner::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            credentials: Vec::new(),
        }
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register credentials to mask in everything this invoker logs or raises.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        if !credentials.is_empty() {
            self.credentials.push(credentials);
        }
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn redact(&self, text: &str) -> String {
        redact_all(&self.credentials, text)
    }

    /// Run `<executable> <mode> <args...> /DisableStartupDialogs /DisableStartupMessages /Out <log>`.
    ///
    /// With `wait = false` the process is detached and no log file is
    /// attached, since nobody would read it.
    ///
    /// # Errors
    /// `CommandFailed` for a non-zero exit or a timeout, with the log file
    /// text and the process message, both redacted. `SpawnFailed` when the
    /// executable cannot be launched.
    pub async fn invoke(&self, mode: &str, args: &[String], wait: bool) -> Result<ExecutionResult> {
        let mut params: Vec<String> = Vec::with_capacity(args.len() + 5);
        params.push(mode.to_string());
        params.extend(args.iter().cloned());
        params.extend(STARTUP_FLAGS.iter().map(|flag| flag.to_string()));

        if !wait {
            tracing::debug!(
                executable = %self.executable.display(),
                command = %self.redact(&params.join(" ")),
                "starting platform command detached"
            );
            return self
                .runner
                .run(&self.executable, &params, self.timeout, false)
                .await;
        }

        // Closed immediately so the platform can open it; removed on drop
        let log_path = tempfile::Builder::new()
            .prefix("designer-cmd-")
            .suffix(".log")
            .tempfile()
            .map_err(|e| DesignerError::Io("temporary log file".to_string(), e.to_string()))?
            .into_temp_path();
        params.push(OUT_FLAG.to_string());
        params.push(log_path.display().to_string());

        tracing::debug!(
            executable = %self.executable.display(),
            command = %self.redact(&params.join(" ")),
            "running platform command"
        );

        let result = self
            .runner
            .run(&self.executable, &params, self.timeout, true)
            .await?;
        if result.is_success() {
            return Ok(result);
        }

        let log_text = read_log(&log_path);
        let details = format!(
            "{}\n{}",
            self.redact(log_text.trim()),
            self.redact(&result.message)
        );
        tracing::error!(
            executable = %self.executable.display(),
            mode = %mode,
            exit_code = result.status.exit_code(),
            details = %details,
            "platform command failed"
        );
        Err(DesignerError::CommandFailed(
            self.executable.display().to_string(),
            details,
        ))
    }
}

fn read_log(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => decode_log(&bytes),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "platform log file unreadable");
            String::new()
        }
    }
}
