//! Error types for satchel-core

use std::fmt;
use thiserror::Error;

/// Result type alias using satchel-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by every satchel crate
#[derive(Error, Debug)]
pub enum Error {
    /// Status is not part of the closed status set
    #[error("Unknown status: {status}")]
    UnknownStatus { status: String },

    /// Structural or checksum validation failure
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// A required resource does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Network or remote service failure
    #[error("Transport failure ({context}): {message}")]
    Transport { context: String, message: String },

    /// Operation is part of the transport interface but this variant does not provide it
    #[error("{operation} is not supported by the {transport} transport")]
    Unsupported {
        transport: String,
        operation: String,
    },

    /// Packaging or unpacking failure
    #[error("Archive operation failed: {message}")]
    Archive { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], used by failure boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownStatus,
    Validation,
    NotFound,
    Transport,
    Archive,
    Config,
    Parse,
    Io,
}

impl ErrorKind {
    /// Name recorded in status notes
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownStatus => "UnknownStatus",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Archive => "ArchiveError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Io => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error
    ///
    /// `Unsupported` is a transport-level refusal and is reported as
    /// [`ErrorKind::Transport`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownStatus { .. } => ErrorKind::UnknownStatus,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Transport { .. } | Error::Unsupported { .. } => ErrorKind::Transport,
            Error::Archive { .. } => ErrorKind::Archive,
            Error::ConfigNotFound { .. } | Error::InvalidConfig { .. } => ErrorKind::Config,
            Error::YamlParse(_) | Error::JsonParse(_) => ErrorKind::Parse,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a delivery attempt records this error as `failed` instead of propagating it
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Archive | ErrorKind::Validation
        )
    }

    /// Create an unknown status error
    pub fn unknown_status(status: impl Into<String>) -> Self {
        Self::UnknownStatus {
            status: status.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a transport error carrying the remote's diagnostic
    pub fn transport(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(transport: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            transport: transport.into(),
            operation: operation.into(),
        }
    }

    /// Create an archive error
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
