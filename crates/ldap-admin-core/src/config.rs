//! Connection configuration for the directory client.
//!
//! The configuration is validated before every connection attempt rather than at construction,
//! so a client can be built from partial settings and completed later through the `with_*`
//! setters.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
/// Default pattern recognizing personal-account uid conventions.
pub const DEFAULT_PERSONAL_UID_PATTERN: &str =
    "^[A-Za-z]{1,2}[0-9]{4,5}[A-Za-z]{0,1}|^[A-Za-z]{4,5}$|^[A-Za-z]{2,3}[0-9]{1,2}$";

/// Required fields, in declaration order.
const REQUIRED_FIELDS: &[&str] = &[
    "hostname",
    "port",
    "base_dn",
    "user_base_dn",
    "group_base_dn",
    "bind_dn",
    "bind_password",
];

/// Directory transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Protocol {
    /// Plain LDAP.
    Ldap,
    /// LDAP over TLS.
    #[default]
    Ldaps,
}

impl Protocol {
    /// Parses a protocol name, falling back to [`Protocol::Ldaps`] for anything unrecognized.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "ldap" => Self::Ldap,
            _ => Self::Ldaps,
        }
    }

    /// URL scheme for the protocol.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::Ldap => "ldap",
            Self::Ldaps => "ldaps",
        }
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Configuration for connecting to the directory.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Transport protocol
    #[serde(default)]
    pub protocol: Protocol,

    /// Directory server hostname
    #[validate(length(min = 1))]
    #[serde(default)]
    pub hostname: String,

    /// Directory server port
    #[validate(required)]
    #[serde(default)]
    pub port: Option<u16>,

    /// Base DN of the directory tree
    #[validate(length(min = 1))]
    #[serde(default)]
    pub base_dn: String,

    /// Subtree holding user entries
    #[validate(length(min = 1))]
    #[serde(default)]
    pub user_base_dn: String,

    /// Subtree holding organizational units and groups
    #[validate(length(min = 1))]
    #[serde(default)]
    pub group_base_dn: String,

    /// Bind identity
    #[validate(length(min = 1))]
    #[serde(default)]
    pub bind_dn: String,

    /// Bind credential
    #[serde(
        default = "empty_secret",
        skip_serializing,
        deserialize_with = "deserialize_secret"
    )]
    pub bind_password: SecretString,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a PEM-encoded CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Regular expression recognizing personal-account uids
    #[serde(default = "default_personal_uid_pattern")]
    pub personal_uid_pattern: String,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

fn default_personal_uid_pattern() -> String {
    DEFAULT_PERSONAL_UID_PATTERN.to_string()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            hostname: String::new(),
            port: None,
            base_dn: String::new(),
            user_base_dn: String::new(),
            group_base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: empty_secret(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            personal_uid_pattern: default_personal_uid_pattern(),
        }
    }
}

impl DirectoryConfig {
    /// Loads the configuration from `LDAP_*` environment variables.
    ///
    /// Absent variables leave the corresponding field empty; they are reported by
    /// [`DirectoryConfig::check`] when a connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `LDAP_PORT` is not a valid port number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `LDAP_PORT` is not a valid port number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("LDAP_PORT").filter(|value| !value.is_empty()) {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|err| Error::BadRequest(format!("invalid LDAP_PORT `{raw}`: {err}")))?,
            ),
            None => None,
        };

        let mut config = Self {
            protocol: Protocol::parse_lenient(&lookup("LDAP_PROTOCOL").unwrap_or_default()),
            hostname: lookup("LDAP_HOSTNAME").unwrap_or_default(),
            port,
            base_dn: lookup("LDAP_BASE_DN").unwrap_or_default(),
            user_base_dn: lookup("LDAP_USER_BASE_DN").unwrap_or_default(),
            group_base_dn: lookup("LDAP_GROUP_BASE_DN").unwrap_or_default(),
            bind_dn: lookup("LDAP_BIND_DN").unwrap_or_default(),
            bind_password: SecretString::from(lookup("LDAP_BIND_PASSWORD").unwrap_or_default()),
            ..Self::default()
        };
        if let Some(pattern) = lookup("LDAP_PERSONAL_UID_PATTERN") {
            config.personal_uid_pattern = pattern;
        }
        Ok(config)
    }

    /// Returns the names of the required fields that are empty, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let errors = self.validate().err().unwrap_or_default();
        let invalid = errors.errors();
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| match *field {
                "bind_password" => self.bind_password.expose_secret().is_empty(),
                name => invalid.contains_key(name),
            })
            .collect()
    }

    /// Verifies that every required field is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] listing every missing field by name.
    pub fn check(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::missing_parameters(&missing))
        }
    }

    /// Composes the `protocol://hostname:port` connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the port is unset or the URL does not parse.
    pub fn url(&self) -> Result<String> {
        let port = self
            .port
            .ok_or_else(|| Error::missing_parameters(&["port"]))?;
        let raw = format!("{}://{}:{}", self.protocol, self.hostname, port);
        Url::parse(&raw)?;
        Ok(raw)
    }

    /// Returns the bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Sets the protocol; unrecognized values fall back to `ldaps`.
    #[must_use]
    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = Protocol::parse_lenient(protocol);
        self
    }

    /// Sets the server hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the base DN.
    #[must_use]
    pub fn with_base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = dn.into();
        self
    }

    /// Sets the user subtree DN.
    #[must_use]
    pub fn with_user_base_dn(mut self, dn: impl Into<String>) -> Self {
        self.user_base_dn = dn.into();
        self
    }

    /// Sets the group subtree DN.
    #[must_use]
    pub fn with_group_base_dn(mut self, dn: impl Into<String>) -> Self {
        self.group_base_dn = dn.into();
        self
    }

    /// Sets the bind identity and credential.
    #[must_use]
    pub fn with_bind_credentials(
        mut self,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        self.bind_dn = bind_dn.into();
        self.bind_password = SecretString::from(bind_password.into());
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }

    /// Overrides the personal-account uid pattern.
    #[must_use]
    pub fn with_personal_uid_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.personal_uid_pattern = pattern.into();
        self
    }
}
