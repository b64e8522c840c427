//! Running-process snapshots and termination.
//!
//! Takes one OS process table snapshot, filters it client-side, and acts on
//! the filtered handles. There is no liveness guarantee between the snapshot
//! and a later `terminate`; a pid that has exited by then is reported as a
//! termination failure.

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, UpdateKind};

use crate::error::{DesignerError, Result};

/// Process names of the platform executables, without extension.
pub const PLATFORM_EXECUTABLES: &[&str] = &["1cv8", "1cv8c", "1cv8s"];

/// A running process captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    pub name: String,
    pub command_line: String,
    pub pid: u32,
}

impl ProcessHandle {
    pub fn terminate(&self) -> Result<()> {
        terminate(self.pid)
    }

    /// True when the recorded command line contains every needle.
    pub fn command_line_contains_all(&self, needles: &[&str]) -> bool {
        needles.iter().all(|needle| self.command_line.contains(needle))
    }
}

/// Snapshot the process table and keep processes whose name satisfies `predicate`.
///
/// Handles are sorted by pid.
pub fn list_matching_processes(predicate: impl Fn(&str) -> bool) -> Vec<ProcessHandle> {
    let system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_processes(ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always)),
    );

    let mut handles: Vec<ProcessHandle> = system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            let name = process.name().to_string_lossy();
            if !predicate(&name) {
                return None;
            }
            let command_line = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            Some(ProcessHandle {
                name: name.into_owned(),
                command_line,
                pid: pid.as_u32(),
            })
        })
        .collect();

    handles.sort_by_key(|handle| handle.pid);
    tracing::debug!(matched = handles.len(), "process snapshot taken");
    handles
}

/// True for the platform executables, with or without `.exe`, any case.
pub fn is_platform_process(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
    PLATFORM_EXECUTABLES.contains(&stem)
}

/// Snapshot of running platform processes.
pub fn platform_processes() -> Vec<ProcessHandle> {
    list_matching_processes(is_platform_process)
}

/// Terminate a process by pid.
pub fn terminate(pid: u32) -> Result<()> {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::nothing(),
    );

    let Some(process) = system.process(sys_pid) else {
        return Err(DesignerError::TerminationFailed(
            pid,
            "no such process".to_string(),
        ));
    };

    if !process.kill() {
        return Err(DesignerError::TerminationFailed(
            pid,
            "kill signal was refused".to_string(),
        ));
    }

    tracing::info!(pid = pid, "terminated process");
    Ok(())
}

/// Terminate every handle whose command line contains all `needles`.
///
/// Best effort: individual failures are logged and skipped. Returns the
/// number of processes terminated.
pub fn terminate_matching(handles: &[ProcessHandle], needles: &[&str]) -> usize {
    let mut terminated = 0;
    for handle in handles.iter().filter(|h| h.command_line_contains_all(needles)) {
        match handle.terminate() {
            Ok(()) => terminated += 1,
            Err(e) => {
                tracing::warn!(pid = handle.pid, name = %handle.name, error = %e, "could not terminate process");
            }
        }
    }
    terminated
}
