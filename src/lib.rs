//! designer-cmd — locate and run the platform's command-line executables.
//! Resolves an installed designer or cluster-admin executable by version,
//! runs it with timeout-kill and console-encoding-aware output capture, and
//! keeps credentials out of every log line and error it produces.

pub mod config;
pub mod credentials;
pub mod error;
pub mod exec;
pub mod invoke;
pub mod platform;
pub mod rac;

pub use config::{expand_env_refs, parse_env_ref, DesignerConfig, ExecutionConfig, PlatformConfig};
pub use credentials::Credentials;
pub use error::{DesignerError, Result};
pub use exec::{
    list_matching_processes, platform_processes, run, terminate, terminate_matching,
    ExecutionResult, ExecutionStatus, ProcessHandle, ProcessRunner, DEFAULT_TIMEOUT,
    TIMEOUT_MESSAGE,
};
pub use invoke::CommandInvoker;
pub use platform::{
    compute_weight, designer_binary, find_executable, rac_binary, resolve, PlatformLocator,
    PlatformVersion,
};
pub use rac::{parse_records, RacSession, Record};
