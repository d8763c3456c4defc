//! Application error taxonomy for directory operations.
//!
//! Every failure surfaced by the directory client is one of six application errors, each tied
//! to an HTTP-style status code so callers can forward them over an API without re-mapping.

use serde::Serialize;
use thiserror::Error;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or invalid input, including incomplete configuration.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The bind identity or credential was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The bind identity lacks the rights for the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The entity being created already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Anything unclassified, carrying the underlying failure text.
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// HTTP status equivalent
    pub status: u16,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Builds a [`Error::BadRequest`] for a list of missing mandatory parameters.
    #[must_use]
    pub fn missing_parameters<S: AsRef<str>>(params: &[S]) -> Self {
        let names = params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        Self::BadRequest(format!("missing mandatory parameter(s): [{names}]"))
    }

    /// Returns the HTTP status code equivalent of this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::InternalServerError(_) => 500,
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Returns the message without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::InternalServerError(msg) => msg,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                status: self.status_code(),
                message: self.message().to_string(),
            },
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(self, Self::InternalServerError(_))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::BadRequest(format!("invalid directory URL: {err}"))
    }
}
