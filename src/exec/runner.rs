//! Process runner: spawns an executable with timeout-kill, captures output
//! in the console encoding, and reports the outcome as data.
//!
//! `ProcessRunner::run` is the only place that touches the OS process API.
//! Non-zero exits and timeouts come back as an [`ExecutionResult`]; only a
//! failure to launch at all is an error.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{DesignerError, Result};
use crate::exec::console::CodePageGuard;
use crate::exec::encoding::{decode, decode_utf8_or, host_encoding, UTF8_CODE_PAGE};

/// Default limit for a single platform command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Message reported for a process killed on timeout.
pub const TIMEOUT_MESSAGE: &str = "execution exceeded the allotted time";

/// Outcome of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "exit_code", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    /// Exited with a non-zero code (`-1` when killed by a signal).
    Failed(i32),
    /// Killed after exceeding the timeout.
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    /// Conventional exit code: 0 on success, 1 on timeout.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionStatus::Success => 0,
            ExecutionStatus::Failed(code) => *code,
            ExecutionStatus::TimedOut => 1,
        }
    }
}

/// Status plus captured text: trimmed stdout on success, trimmed stderr on
/// failure, [`TIMEOUT_MESSAGE`] on timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    #[serde(flatten)]
    pub status: ExecutionStatus,
    pub message: String,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    fn timed_out() -> Self {
        ExecutionResult {
            status: ExecutionStatus::TimedOut,
            message: TIMEOUT_MESSAGE.to_string(),
        }
    }
}

/// Runs external executables.
///
/// By default output is decoded with the host console encoding, which is
/// only implemented on Windows. [`ProcessRunner::with_encoding`] fixes the
/// encoding explicitly and works on any host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    encoding: Option<&'static Encoding>,
    prefer_utf8: bool,
}

impl ProcessRunner {
    /// Runner decoding output in the host console encoding.
    pub fn new() -> Self {
        ProcessRunner {
            encoding: None,
            prefer_utf8: false,
        }
    }

    /// Runner decoding output in a fixed encoding.
    pub fn with_encoding(encoding: &'static Encoding) -> Self {
        ProcessRunner {
            encoding: Some(encoding),
            prefer_utf8: false,
        }
    }

    /// Decode output as UTF-8 whenever it is valid UTF-8, using the runner
    /// encoding only for output that is not.
    pub fn preferring_utf8(mut self) -> Self {
        self.prefer_utf8 = true;
        self
    }

    /// The encoding used to decode output.
    pub fn encoding(&self) -> Result<&'static Encoding> {
        match self.encoding {
            Some(encoding) => Ok(encoding),
            None => host_encoding(),
        }
    }

    /// Run `executable` with `args`, never through a shell.
    ///
    /// # Waiting
    /// With `wait = true` stdout and stderr are drained concurrently while the
    /// child runs. If `timeout` elapses first the child is killed and reaped,
    /// and the call returns a `TimedOut` result rather than an error.
    ///
    /// With `wait = false` the child is started with null stdio and left
    /// running; the result is always `(Success, "")`.
    ///
    /// # Errors
    /// `SpawnFailed` when the executable cannot be launched, and
    /// `UnsupportedPlatform` when no encoding is set on a non-Windows host.
    /// Arguments are never logged here, since they may carry credentials.
    pub async fn run(
        &self,
        executable: impl AsRef<Path>,
        args: &[String],
        timeout: Option<Duration>,
        wait: bool,
    ) -> Result<ExecutionResult> {
        let executable = executable.as_ref();
        let encoding = self.encoding()?;

        // Lets the platform write UTF-8 diagnostics; restored on every exit path.
        let _code_page = CodePageGuard::switch_output(UTF8_CODE_PAGE);

        let mut cmd = Command::new(executable);
        cmd.args(args);
        cmd.stdin(Stdio::null());

        if !wait {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
            let child = cmd.spawn().map_err(|e| spawn_failed(executable, e))?;
            tracing::debug!(
                executable = %executable.display(),
                pid = ?child.id(),
                "started detached process"
            );
            return Ok(ExecutionResult {
                status: ExecutionStatus::Success,
                message: String::new(),
            });
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| spawn_failed(executable, e))?;

        // Take pipes first so the child stays borrowable for kill() on timeout
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let completion = async {
            let (stdout, stderr) = tokio::join!(read_pipe(stdout_pipe), read_pipe(stderr_pipe));
            let status = child.wait().await?;
            Ok::<(ExitStatus, Vec<u8>, Vec<u8>), std::io::Error>((status, stdout?, stderr?))
        };

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.ok(),
            None => Some(completion.await),
        };

        let Some(outcome) = outcome else {
            // Kill the process, not just the future; kill() also reaps it
            if let Err(e) = child.kill().await {
                tracing::warn!(
                    executable = %executable.display(),
                    error = %e,
                    "failed to kill timed-out process"
                );
            }
            tracing::warn!(
                executable = %executable.display(),
                timeout_secs = timeout.map(|t| t.as_secs()).unwrap_or_default(),
                "process timed out and was killed"
            );
            return Ok(ExecutionResult::timed_out());
        };

        let (status, stdout, stderr) = outcome.map_err(|e| {
            DesignerError::Io(
                executable.display().to_string(),
                format!("process I/O error: {}", e),
            )
        })?;

        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(
            executable = %executable.display(),
            exit_code = %exit_code,
            duration_ms = %start.elapsed().as_millis(),
            "process finished"
        );

        let result = if status.success() {
            ExecutionResult {
                status: ExecutionStatus::Success,
                message: self.decode_output(encoding, &stdout).trim().to_string(),
            }
        } else {
            ExecutionResult {
                status: ExecutionStatus::Failed(exit_code),
                message: self.decode_output(encoding, &stderr).trim().to_string(),
            }
        };
        Ok(result)
    }

    fn decode_output(&self, encoding: &'static Encoding, bytes: &[u8]) -> String {
        if self.prefer_utf8 {
            decode_utf8_or(encoding, bytes)
        } else {
            decode(encoding, bytes)
        }
    }
}

/// Run with the host-default runner.
pub async fn run(
    executable: impl AsRef<Path>,
    args: &[String],
    timeout: Option<Duration>,
    wait: bool,
) -> Result<ExecutionResult> {
    ProcessRunner::new().run(executable, args, timeout, wait).await
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut bytes).await?;
    }
    Ok(bytes)
}

fn spawn_failed(executable: &Path, e: std::io::Error) -> DesignerError {
    tracing::error!(executable = %executable.display(), error = %e, "failed to spawn process");
    DesignerError::SpawnFailed(executable.display().to_string(), e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn utf8_runner() -> ProcessRunner {
        ProcessRunner::with_encoding(encoding_rs::UTF_8)
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(ExecutionStatus::Success.exit_code(), 0);
        assert_eq!(ExecutionStatus::Failed(3).exit_code(), 3);
        assert_eq!(ExecutionStatus::TimedOut.exit_code(), 1);
        assert!(!ExecutionStatus::TimedOut.is_success());
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let result = utf8_runner()
            .run("nonexistent-cmd-xyz", &[], Some(Duration::from_secs(5)), true)
            .await;
        assert!(
            matches!(result, Err(DesignerError::SpawnFailed(ref exe, _)) if exe == "nonexistent-cmd-xyz"),
            "expected SpawnFailed, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_missing_executable_detached_is_spawn_error() {
        let result = utf8_runner()
            .run("nonexistent-cmd-xyz", &[], None, false)
            .await;
        assert!(matches!(result, Err(DesignerError::SpawnFailed(_, _))));
    }

    #[tokio::test]
    #[cfg(not(windows))]
    async fn test_host_runner_unsupported_off_windows() {
        let result = run("echo", &args(&["hello"]), None, true).await;
        assert!(matches!(result, Err(DesignerError::UnsupportedPlatform(_))));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_success_returns_trimmed_stdout() {
        let result = utf8_runner()
            .run("echo", &args(&["  hello world  "]), Some(Duration::from_secs(5)), true)
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.message, "hello world");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_failure_returns_trimmed_stderr() {
        let result = utf8_runner()
            .run(
                "sh",
                &args(&["-c", "echo ignored; echo '  broken  ' >&2; exit 3"]),
                Some(Duration::from_secs(5)),
                true,
            )
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed(3));
        assert_eq!(result.message, "broken");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_timeout_is_reported_not_raised() {
        let start = Instant::now();
        let result = utf8_runner()
            .run("sleep", &args(&["10"]), Some(Duration::from_secs(1)), true)
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::TimedOut);
        assert_eq!(result.message, TIMEOUT_MESSAGE);
        assert!(start.elapsed() < Duration::from_secs(5), "timeout should not wait for the child");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_timed_out_child_is_not_left_running() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("child.pid");
        let result = utf8_runner()
            .run(
                "sh",
                &args(&[
                    "-c",
                    r#"echo $$ > "$1"; exec sleep 30"#,
                    "sh",
                    pid_file.to_str().unwrap(),
                ]),
                Some(Duration::from_secs(1)),
                true,
            )
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::TimedOut);

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "process {} still running after timeout", pid);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_prefer_utf8_overrides_runner_encoding() {
        let result = ProcessRunner::with_encoding(encoding_rs::IBM866)
            .preferring_utf8()
            .run("echo", &args(&["Основной"]), Some(Duration::from_secs(5)), true)
            .await
            .unwrap();
        assert_eq!(result.message, "Основной");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_detached_returns_immediately() {
        let start = Instant::now();
        let result = utf8_runner()
            .run("sleep", &args(&["2"]), None, false)
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.message.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_large_stderr_does_not_block() {
        // Fills the stderr pipe buffer before writing stdout
        let result = utf8_runner()
            .run(
                "sh",
                &args(&["-c", "head -c 200000 /dev/zero | tr '\\0' x >&2; echo done"]),
                Some(Duration::from_secs(10)),
                true,
            )
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.message, "done");
    }

    #[tokio::test]
    #[cfg(windows)]
    async fn test_cmd_dir_succeeds() {
        let result = run("cmd.exe", &args(&["/c", "dir"]), Some(Duration::from_secs(30)), true)
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(!result.message.is_empty());
    }

    #[tokio::test]
    #[cfg(windows)]
    async fn test_cmd_timeout() {
        let start = Instant::now();
        let result = run(
            "cmd.exe",
            &args(&["/c", "ping", "-n", "10", "127.0.0.1"]),
            Some(Duration::from_secs(1)),
            true,
        )
        .await
        .unwrap();
        assert_eq!(result.status, ExecutionStatus::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(windows)]
    fn console_output_code_page() -> u32 {
        // SAFETY: no arguments; returns 0 when the process has no console.
        unsafe { windows::Win32::System::Console::GetConsoleOutputCP() }
    }

    #[tokio::test]
    #[cfg(windows)]
    async fn test_console_code_page_restored_after_run() {
        let before = console_output_code_page();
        let result = run("cmd.exe", &args(&["/c", "echo", "ok"]), Some(Duration::from_secs(30)), true)
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(console_output_code_page(), before);

        let timed_out = run(
            "cmd.exe",
            &args(&["/c", "ping", "-n", "10", "127.0.0.1"]),
            Some(Duration::from_secs(1)),
            true,
        )
        .await
        .unwrap();
        assert_eq!(timed_out.status, ExecutionStatus::TimedOut);
        assert_eq!(console_output_code_page(), before);
    }
}
