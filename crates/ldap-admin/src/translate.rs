//! Maps protocol-level failures onto the application error taxonomy.

use crate::protocol::{DirectoryError, ResultCode};
use ldap_admin_core::Error;
use tracing::error;

/// Translates a protocol failure into an application error. First match wins; anything
/// unclassified is logged and surfaced verbatim as [`Error::InternalServerError`].
#[must_use]
pub fn translate(err: DirectoryError) -> Error {
    match err.result_code() {
        Some(ResultCode::InvalidCredentials | ResultCode::InvalidDnSyntax) => {
            Error::Unauthorized(ResultCode::InvalidCredentials.to_string())
        }
        Some(ResultCode::InsufficientAccessRights) => {
            Error::Forbidden(ResultCode::InsufficientAccessRights.to_string())
        }
        // Operations that create entries upgrade this to a conflict.
        Some(ResultCode::EntryAlreadyExists) => {
            Error::BadRequest(ResultCode::EntryAlreadyExists.to_string())
        }
        Some(ResultCode::NoSuchObject) => Error::NotFound(ResultCode::NoSuchObject.to_string()),
        _ => {
            error!(error = %err, "unclassified directory failure");
            Error::InternalServerError(err.to_string())
        }
    }
}

/// True when `err` is the translation of an "entry already exists" failure.
#[must_use]
pub fn is_entry_already_exists(err: &Error) -> bool {
    matches!(err, Error::BadRequest(message) if *message == ResultCode::EntryAlreadyExists.to_string())
}
