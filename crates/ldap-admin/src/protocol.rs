//! Directory protocol seam.
//!
//! Request, entry and result-code types exchanged with the transport, plus the object-safe
//! connector/session traits the connection manager drives. The ldap3-backed implementation
//! lives in [`crate::transport`]; tests substitute their own.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

/// LDAP entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserve server order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an attribute with its values.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.insert(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute (empty when absent).
    #[must_use]
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Search request issued against a base DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base.
    pub base_dn: String,
    /// Search scope.
    pub scope: SearchScope,
    /// RFC 4515 filter string.
    pub filter: String,
    /// Attributes to return.
    pub attributes: &'static [&'static str],
}

/// Request to add a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    /// DN of the new entry.
    pub dn: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, Vec<String>)>,
}

impl AddRequest {
    /// Creates an add request without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute with its values.
    #[must_use]
    pub fn attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Returns the values of an attribute if it was set.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// LDAP modification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryModification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes attribute).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

/// Request to modify an existing entry; modifications apply in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRequest {
    /// DN of the entry to modify.
    pub dn: String,
    /// Ordered modifications.
    pub modifications: Vec<DirectoryModification>,
}

/// Password modify extended operation (RFC 3062).
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordModifyRequest {
    /// DN of the user whose password changes.
    pub user_dn: String,
    /// Current password, if supplied.
    pub old_password: Option<String>,
    /// New password; `None` asks the server to generate one.
    pub new_password: Option<String>,
}

impl fmt::Debug for PasswordModifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PasswordModifyRequest")
            .field("user_dn", &self.user_dn)
            .field("old_password", &redact(&self.old_password))
            .field("new_password", &redact(&self.new_password))
            .finish()
    }
}

/// LDAP result codes the client distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// `noSuchObject` (32).
    NoSuchObject,
    /// `invalidDNSyntax` (34).
    InvalidDnSyntax,
    /// `invalidCredentials` (49).
    InvalidCredentials,
    /// `insufficientAccessRights` (50).
    InsufficientAccessRights,
    /// `entryAlreadyExists` (68).
    EntryAlreadyExists,
    /// Any other non-success code.
    Other(u32),
}

impl ResultCode {
    /// Maps a numeric result code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            32 => Self::NoSuchObject,
            34 => Self::InvalidDnSyntax,
            49 => Self::InvalidCredentials,
            50 => Self::InsufficientAccessRights,
            68 => Self::EntryAlreadyExists,
            other => Self::Other(other),
        }
    }

    /// Numeric result code.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::NoSuchObject => 32,
            Self::InvalidDnSyntax => 34,
            Self::InvalidCredentials => 49,
            Self::InsufficientAccessRights => 50,
            Self::EntryAlreadyExists => 68,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchObject => f.write_str("No Such Object"),
            Self::InvalidDnSyntax => f.write_str("Invalid DN Syntax"),
            Self::InvalidCredentials => f.write_str("Invalid Credentials"),
            Self::InsufficientAccessRights => f.write_str("Insufficient Access Rights"),
            Self::EntryAlreadyExists => f.write_str("Entry Already Exists"),
            Self::Other(code) => write!(f, "Result Code {code}"),
        }
    }
}

/// Protocol-level failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The server answered with a non-success result code.
    #[error("LDAP Result Code {} \"{}\": {}", .code.code(), .code, .message)]
    Result {
        /// Result code.
        code: ResultCode,
        /// Diagnostic message from the server.
        message: String,
    },
    /// Network, TLS or protocol failure without a result code.
    #[error("LDAP transport error: {0}")]
    Transport(String),
}

impl DirectoryError {
    /// Builds a result-code failure.
    #[must_use]
    pub fn result(code: ResultCode, message: impl Into<String>) -> Self {
        Self::Result {
            code,
            message: message.into(),
        }
    }

    /// Returns the result code, if the failure carries one.
    #[must_use]
    pub const fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Result { code, .. } => Some(*code),
            Self::Transport(_) => None,
        }
    }
}

/// Authenticated (or about to be) directory connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapSession: Send {
    /// Performs a simple bind.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Runs a search and returns the matching entries.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<LdapEntry>, DirectoryError>;

    /// Adds an entry.
    async fn add(&mut self, request: &AddRequest) -> Result<(), DirectoryError>;

    /// Deletes the entry at `dn`.
    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;

    /// Applies the modifications of `request`.
    async fn modify(&mut self, request: &ModifyRequest) -> Result<(), DirectoryError>;

    /// Runs the password modify extended operation, returning a server-generated password
    /// when one was requested.
    async fn password_modify(
        &mut self,
        request: &PasswordModifyRequest,
    ) -> Result<Option<String>, DirectoryError>;

    /// Closes the connection.
    async fn unbind(&mut self) -> Result<(), DirectoryError>;
}

/// Dials the directory and hands out sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapConnector: Send + Sync {
    /// Opens a transport connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn LdapSession>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_round_trip_known_values() {
        for code in [32, 34, 49, 50, 68, 80] {
            assert_eq!(ResultCode::from_code(code).code(), code);
        }
        assert_eq!(ResultCode::from_code(80), ResultCode::Other(80));
    }

    #[test]
    fn directory_error_display_names_the_code() {
        let err = DirectoryError::result(ResultCode::NoSuchObject, "entry missing");
        assert_eq!(
            err.to_string(),
            "LDAP Result Code 32 \"No Such Object\": entry missing"
        );
        assert_eq!(err.result_code(), Some(ResultCode::NoSuchObject));
        assert_eq!(
            DirectoryError::Transport("reset".to_string()).result_code(),
            None
        );
    }

    #[test]
    fn entry_accessors() {
        let entry = LdapEntry::new("uid=C00001,ou=users,o=company")
            .with_attribute("uid", ["C00001"])
            .with_attribute("mail", ["a@company.com", "b@company.com"]);

        assert_eq!(entry.first("uid"), Some("C00001"));
        assert_eq!(entry.values("mail").len(), 2);
        assert!(entry.values("cn").is_empty());
        assert_eq!(entry.first("cn"), None);
    }

    #[test]
    fn password_request_debug_redacts_secrets() {
        let request = PasswordModifyRequest {
            user_dn: "uid=C00001,ou=users,o=company".to_string(),
            old_password: None,
            new_password: Some("hunter2".to_string()),
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
