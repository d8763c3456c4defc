//! User type classification.
//!
//! Personal accounts are recognised by the configured uid pattern, builder accounts by the
//! reserved `_BUILDER` suffix. Everything else is a non-personnel account.

use crate::users::User;
use crate::Result;
use ldap_admin_core::Error;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Reserved uid suffix of builder accounts.
pub const BUILDER_ACCOUNT_SUFFIX: &str = "_BUILDER";

/// Category a user account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserType {
    /// Account of an individual.
    Personal,
    /// Build automation account.
    Builder,
    /// Non-personnel account.
    Npa,
}

impl UserType {
    /// All recognised types.
    pub const ALL: [Self; 3] = [Self::Personal, Self::Builder, Self::Npa];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Builder => "builder",
            Self::Npa => "npa",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                Error::BadRequest(format!(
                    "Invalid type '{value}'. Valid types are [{}]",
                    valid.join(", ")
                ))
            })
    }
}

/// Classifies users by uid.
///
/// A pattern that fails to compile is kept as an error and reported on every classification
/// that needs it, so builder detection keeps working.
#[derive(Debug)]
pub struct UserClassifier {
    personal: std::result::Result<Regex, regex::Error>,
}

impl UserClassifier {
    /// Compiles the personal-account pattern.
    #[must_use]
    pub fn new(personal_pattern: &str) -> Self {
        Self {
            personal: Regex::new(personal_pattern),
        }
    }

    /// True when `uid` carries the builder suffix.
    #[must_use]
    pub fn is_builder(uid: &str) -> bool {
        uid.contains(BUILDER_ACCOUNT_SUFFIX)
    }

    /// Verifies that the personal pattern compiled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalServerError`] carrying the compilation error.
    pub fn check(&self) -> Result<()> {
        self.personal_pattern().map(|_| ())
    }

    /// Classifies a single uid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalServerError`] when the personal pattern is malformed.
    pub fn classify(&self, uid: &str) -> Result<UserType> {
        if self.personal_pattern()?.is_match(uid) {
            return Ok(UserType::Personal);
        }
        if Self::is_builder(uid) {
            return Ok(UserType::Builder);
        }
        Ok(UserType::Npa)
    }

    /// Keeps the users of `kind`, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalServerError`] when the personal pattern is malformed.
    pub fn select(&self, users: Vec<User>, kind: UserType) -> Result<Vec<User>> {
        self.check()?;
        let mut selected = Vec::with_capacity(users.len());
        for user in users {
            if self.classify(&user.uid)? == kind {
                selected.push(user);
            }
        }
        Ok(selected)
    }

    fn personal_pattern(&self) -> Result<&Regex> {
        self.personal.as_ref().map_err(|err| {
            Error::InternalServerError(format!("invalid personal uid pattern: {err}"))
        })
    }
}
