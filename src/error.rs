// Error types for parsing and driving iproute2

use std::io;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum IpError {
    #[error("No match found for {kind}: {line:?}")]
    NoMatch { kind: &'static str, line: String },

    #[error("Failed to cast field {field} value {value:?} to {target}")]
    CastFailure {
        field: String,
        value: String,
        target: &'static str,
    },

    #[error("{kind} has no attribute {name:?}")]
    NoSuchAttribute { kind: &'static str, name: String },

    #[error("{kind} is missing required field {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    ExternalProcess {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("Failed to execute command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using IpError
pub type IpResult<T> = Result<T, IpError>;

impl IpError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            IpError::NoMatch { kind, .. } => {
                format!("Unrecognized {} output. The installed iproute2 may print a format this library does not know.", kind)
            }
            IpError::CastFailure { field, .. } => {
                format!("Field '{}' in iproute2 output had an unexpected value.", field)
            }
            IpError::NoSuchAttribute { name, .. } => {
                format!("Unknown attribute '{}'.", name)
            }
            IpError::MissingField { kind, field } => {
                format!("The {} has no {} to act on.", kind, field)
            }
            IpError::ExternalProcess { exit_code, .. } => {
                format!("iproute2 rejected the command (exit code {}).", exit_code)
            }
            IpError::Spawn { command, .. } => {
                format!("Failed to execute command. Make sure {} is installed.", command)
            }
            IpError::Config(_) => {
                "Configuration error. Check your config file.".to_string()
            }
        }
    }

    /// Whether the error came from running the external tool rather than from parsing
    pub fn is_external(&self) -> bool {
        matches!(self, IpError::ExternalProcess { .. } | IpError::Spawn { .. })
    }
}
