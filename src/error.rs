//! Error types for the conversion pipeline

use serde::Serialize;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or converting a resume
#[derive(Error, Debug)]
pub enum Error {
    /// The request did not name exactly one markup source
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A caller-supplied value could not be interpreted
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failed to start a single engine instance (one launch attempt)
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Engine acquisition exhausted its retry budget
    #[error("Failed to launch browser after {attempts} attempts: {cause}")]
    EngineLaunch { attempts: u32, cause: String },

    /// Markup did not finish loading before the load ceiling
    #[error("Markup load timed out after {0}ms")]
    LoadTimeout(u64),

    /// Engine rejected or failed to load the markup
    #[error("Failed to load markup: {0}")]
    LoadError(String),

    /// Paginated export failed or timed out
    #[error("PDF export failed: {0}")]
    ExportError(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], suitable for callers that map
/// failures onto transport-level signals (status codes, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingParameter,
    InvalidParameter,
    /// The engine could not be started; the caller should back off and retry.
    EngineBusy,
    LoadTimeout,
    Load,
    Export,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::EngineBusy => "engine_busy",
            ErrorKind::LoadTimeout => "load_timeout",
            ErrorKind::Load => "load",
            ErrorKind::Export => "export",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }

    /// True for failures caused by the request itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ErrorKind::MissingParameter | ErrorKind::InvalidParameter)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingParameter(_) => ErrorKind::MissingParameter,
            Error::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Error::EngineLaunch { .. } => ErrorKind::EngineBusy,
            Error::LoadTimeout(_) => ErrorKind::LoadTimeout,
            Error::LoadError(_) => ErrorKind::Load,
            Error::ExportError(_) => ErrorKind::Export,
            Error::ConfigError(_) => ErrorKind::Config,
            Error::InitializationError(_) | Error::Other(_) => ErrorKind::Internal,
            #[cfg(feature = "cdp")]
            Error::CdpError(_) => ErrorKind::Internal,
        }
    }

    /// Engine acquisition gave up; distinct from a generic conversion failure.
    pub fn is_busy(&self) -> bool {
        self.kind() == ErrorKind::EngineBusy
    }

    /// Structured form of this error for transport adapters.
    pub fn to_failure(&self) -> ConversionFailure {
        ConversionFailure {
            error: self.kind(),
            details: self.to_string(),
        }
    }
}

/// Error kind plus human readable detail, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionFailure {
    pub error: ErrorKind,
    pub details: String,
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidParameter(err.to_string())
    }
}
