//! Cluster administration client support.
//!
//! The admin tool prints results as blocks of `key : value` lines separated
//! by blank lines. Most cluster-scoped operations need a cluster id; when the
//! caller has not set one, [`RacSession::ensure_cluster_id`] fills it in from
//! the first cluster the server reports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{DesignerError, Result};
use crate::exec::runner::ProcessRunner;

/// Default port of the cluster administration server.
pub const DEFAULT_RAS_PORT: u16 = 1545;

/// Admin commands are short; anything longer is treated as hung.
pub const RAC_TIMEOUT: Duration = Duration::from_secs(10);

/// One `key : value` block of admin tool output.
pub type Record = BTreeMap<String, String>;

/// Parse admin tool output into records.
///
/// Keys and values are trimmed; a value may itself contain `:`. A non-empty
/// line without `:` is `InvalidOutput`.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(DesignerError::InvalidOutput(
                "rac".to_string(),
                format!("expected 'key : value', got '{}'", line.trim()),
            ));
        };
        current.insert(key.trim().to_string(), value.trim().to_string());
    }

    if !current.is_empty() {
        records.push(current);
    }
    Ok(records)
}

/// Connection to one cluster administration server.
#[derive(Debug, Clone)]
pub struct RacSession {
    executable: PathBuf,
    server: String,
    port: u16,
    credentials: Credentials,
    runner: ProcessRunner,
    cluster_id: Option<String>,
}

impl RacSession {
    pub fn new(executable: impl Into<PathBuf>, server: impl Into<String>, port: u16) -> Self {
        RacSession {
            executable: executable.into(),
            server: server.into(),
            port,
            credentials: Credentials::default(),
            runner: ProcessRunner::new(),
            cluster_id: None,
        }
    }

    /// Infobase credentials passed as `--infobase-user` / `--infobase-pwd`.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// `server:port` as the admin tool expects it.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn cluster_id(&self) -> Option<&str> {
        self.cluster_id.as_deref()
    }

    fn credential_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.credentials.user.is_empty() {
            args.push(format!("--infobase-user={}", self.credentials.user));
        }
        if !self.credentials.password.is_empty() {
            args.push(format!("--infobase-pwd={}", self.credentials.password));
        }
        args
    }

    /// Run `<rac> <server:port> <mode> [credentials] <args...>` and parse the output.
    pub async fn execute(&self, mode: &str, args: &[String]) -> Result<Vec<Record>> {
        let mut params = vec![self.address(), mode.to_string()];
        params.extend(self.credential_args());
        params.extend(args.iter().cloned());

        tracing::debug!(
            executable = %self.executable.display(),
            command = %self.credentials.redact(&params.join(" ")),
            "running cluster admin command"
        );

        // The admin tool writes UTF-8 regardless of the console code page
        let result = self
            .runner
            .preferring_utf8()
            .run(&self.executable, &params, Some(RAC_TIMEOUT), true)
            .await?;

        if !result.is_success() {
            let details = self.credentials.redact(&result.message);
            tracing::error!(
                executable = %self.executable.display(),
                mode = %mode,
                details = %details,
                "cluster admin command failed"
            );
            return Err(DesignerError::CommandFailed(
                self.executable.display().to_string(),
                details,
            ));
        }

        parse_records(&result.message)
    }

    /// Cluster id for cluster-scoped commands, discovering it on first use.
    ///
    /// Runs `cluster list` when no id is set and keeps the first record's
    /// `cluster` field.
    pub async fn ensure_cluster_id(&mut self) -> Result<&str> {
        if self.cluster_id.is_none() {
            let records = self.execute("cluster", &["list".to_string()]).await?;
            let cluster_id = records
                .first()
                .and_then(|record| record.get("cluster"))
                .cloned()
                .ok_or_else(|| {
                    DesignerError::MissingContext(
                        "cluster id".to_string(),
                        format!("no cluster reported by {}", self.address()),
                    )
                })?;
            tracing::debug!(cluster = %cluster_id, "using first reported cluster");
            self.cluster_id = Some(cluster_id);
        }
        Ok(self.cluster_id.as_deref().unwrap_or_default())
    }

    /// Run a cluster-scoped command, appending `--cluster=<id>`.
    pub async fn execute_in_cluster(&mut self, mode: &str, args: &[String]) -> Result<Vec<Record>> {
        let cluster_id = self.ensure_cluster_id().await?.to_string();
        let mut params = args.to_vec();
        params.push(format!("--cluster={}", cluster_id));
        self.execute(mode, &params).await
    }
}
