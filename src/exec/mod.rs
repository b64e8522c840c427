//! External process execution: the runner, output decoding, console code page
//! handling, and process snapshots.
//!
//! Every child is started from structured args (never a shell) and is either
//! awaited with timeout-kill semantics or explicitly detached.

pub mod console;
pub mod encoding;
pub mod processes;
pub mod runner;

pub use console::CodePageGuard;
pub use encoding::{encoding_for_code_page, encoding_for_label, host_encoding};
pub use processes::{
    list_matching_processes, platform_processes, terminate, terminate_matching, ProcessHandle,
};
pub use runner::{
    run, ExecutionResult, ExecutionStatus, ProcessRunner, DEFAULT_TIMEOUT, TIMEOUT_MESSAGE,
};
