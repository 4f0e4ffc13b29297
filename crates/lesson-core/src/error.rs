//! Error types for the lesson catalog.

use thiserror::Error;

/// Result type alias using LessonError.
pub type Result<T> = std::result::Result<T, LessonError>;

/// Errors that can occur in the lesson catalog.
#[derive(Error, Debug)]
pub enum LessonError {
    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Form field failed validation.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Backend answered with a non-success status.
    #[error("Request for {resource} failed with status {status}: {body}")]
    Request {
        resource: String,
        status: u16,
        body: String,
    },

    /// Backend could not be reached or the response could not be read.
    #[error("Transport error for {resource}: {message}")]
    Transport { resource: String, message: String },

    /// Insert collided with an existing unique key.
    #[error("Duplicate {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Object storage rejected an upload.
    #[error("Upload of {path} failed: {message}")]
    Upload { path: String, message: String },

    /// Backend returned no curriculum groups.
    #[error("No course data available")]
    NoData,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LessonError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a validation error for a form field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the backend rejected an insert because the key already exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Request { status, body, .. } => *status == 409 || body.contains("23505"),
            _ => false,
        }
    }

    /// Get a stable error code for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Request { .. } => "REQUEST_FAILED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::Upload { .. } => "UPLOAD_FAILED",
            Self::NoData => "NO_DATA",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
