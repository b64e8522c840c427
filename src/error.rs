//! Error types for platform resolution and process execution.

use thiserror::Error;

/// Main error type for designer-cmd operations
#[derive(Error, Debug)]
pub enum DesignerError {
    /// Malformed version string (too many components, non-numeric or over-long component)
    #[error("invalid platform version '{0}': {1}")]
    InvalidVersionFormat(String, String),

    /// No installation directory matches the requested version
    #[error("platform not found: {0}")]
    PlatformNotFound(String),

    /// Operation is only implemented for Windows hosts
    #[error("unsupported platform: {0} is only implemented on Windows")]
    UnsupportedPlatform(String),

    /// External process exited unsuccessfully; details are already redacted
    #[error("command '{0}' failed: {1}")]
    CommandFailed(String, String),

    /// Executable could not be launched at all
    #[error("failed to spawn '{0}': {1}")]
    SpawnFailed(String, String),

    /// Process could not be terminated
    #[error("failed to terminate process {0}: {1}")]
    TerminationFailed(u32, String),

    /// Invalid configuration value for a named key
    #[error("invalid config for '{0}': {1}")]
    InvalidConfig(String, String),

    /// Process output could not be parsed
    #[error("invalid output from '{0}': {1}")]
    InvalidOutput(String, String),

    /// An operation needs context that could not be determined
    #[error("missing {0}: {1}")]
    MissingContext(String, String),

    /// Filesystem or pipe error on a named path
    #[error("I/O error on '{0}': {1}")]
    Io(String, String),
}

/// Result type alias for designer-cmd operations
pub type Result<T> = std::result::Result<T, DesignerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_version_display() {
        let err = DesignerError::InvalidVersionFormat(
            "8.3.14.123212".to_string(),
            "component '123212' is longer than 4 digits".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "invalid platform version '8.3.14.123212': component '123212' is longer than 4 digits"
        );
    }

    #[test]
    fn test_platform_not_found_display() {
        let err = DesignerError::PlatformNotFound("version 8.3.99.0 is not installed".to_string());
        assert_eq!(
            err.to_string(),
            "platform not found: version 8.3.99.0 is not installed"
        );
    }

    #[test]
    fn test_unsupported_platform_display() {
        let err = DesignerError::UnsupportedPlatform("platform path resolution".to_string());
        assert_eq!(
            err.to_string(),
            "unsupported platform: platform path resolution is only implemented on Windows"
        );
    }
}
