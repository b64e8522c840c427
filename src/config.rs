//! designer-cmd configuration — deserialization and validation.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DesignerError, Result};
use crate::exec::encoding::{encoding_for_label, unknown_encoding};
use crate::exec::runner::ProcessRunner;
use crate::platform::{PlatformLocator, PlatformVersion};

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` if the value is not a
/// valid env-var reference.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Expand every `${VAR}` reference embedded in `value`.
///
/// Unlike shell expansion, an unset variable is an error: a root such as
/// `${ProgramFiles}/1cv8` silently becoming `/1cv8` would search the wrong
/// place.
pub fn expand_env_refs(key: &str, value: &str) -> Result<String> {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            return Err(DesignerError::InvalidConfig(
                key.to_string(),
                format!("unterminated env reference in '{}'", value),
            ));
        };
        let reference = &rest[start..start + len + 1];
        let var_name = parse_env_ref(reference).unwrap_or_default();
        if var_name.is_empty() {
            return Err(DesignerError::InvalidConfig(
                key.to_string(),
                format!("empty env reference in '{}'", value),
            ));
        }
        let resolved = std::env::var(var_name).map_err(|_| {
            DesignerError::InvalidConfig(
                key.to_string(),
                format!("environment variable '{}' is not set", var_name),
            )
        })?;
        expanded.push_str(&resolved);
        rest = &rest[start + len + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesignerConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Where to look for installed platform versions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    /// Requested version; empty means the newest installed.
    #[serde(default)]
    pub version: String,
    /// Installation roots searched in order, with `${VAR}` references.
    /// Empty means the host's standard roots.
    #[serde(default)]
    pub roots: Vec<String>,
}

/// How child processes are run.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Per-command timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Output encoding label (`cp866`, `utf-8`, `1251`). Unset means the host
    /// console encoding.
    pub encoding: Option<String>,
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            timeout_secs: default_timeout_secs(),
            encoding: None,
        }
    }
}

impl DesignerConfig {
    /// Parse a `designer-cmd.toml` document. Does not validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DesignerError::InvalidConfig("designer-cmd.toml".to_string(), e.to_string()))
    }

    /// Validate the config, failing fast on misconfigurations before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        // 1. Version must parse
        self.version()?;

        // 2. Roots must expand to non-empty paths
        self.roots()?;

        // 3. Timeout must be positive
        if self.execution.timeout_secs == 0 {
            return Err(DesignerError::InvalidConfig(
                "execution.timeout_secs".to_string(),
                "must be > 0".to_string(),
            ));
        }

        // 4. Encoding label must be known
        self.runner()?;

        Ok(())
    }

    pub fn version(&self) -> Result<PlatformVersion> {
        self.platform.version.parse()
    }

    /// Configured roots with env references expanded.
    pub fn roots(&self) -> Result<Vec<PathBuf>> {
        self.platform
            .roots
            .iter()
            .map(|root| {
                let expanded = expand_env_refs("platform.roots", root)?;
                if expanded.trim().is_empty() {
                    return Err(DesignerError::InvalidConfig(
                        "platform.roots".to_string(),
                        format!("root '{}' expands to an empty path", root),
                    ));
                }
                Ok(PathBuf::from(expanded))
            })
            .collect()
    }

    /// Locator over the configured roots, or the host's standard roots.
    pub fn locator(&self) -> Result<PlatformLocator> {
        let roots = self.roots()?;
        if roots.is_empty() {
            PlatformLocator::from_host()
        } else {
            Ok(PlatformLocator::new(roots))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.execution.timeout_secs)
    }

    /// Runner using the configured encoding, or the host console encoding.
    pub fn runner(&self) -> Result<ProcessRunner> {
        match &self.execution.encoding {
            Some(label) => encoding_for_label(label)
                .map(ProcessRunner::with_encoding)
                .ok_or_else(|| unknown_encoding("execution.encoding", label)),
            None => Ok(ProcessRunner::new()),
        }
    }
}
