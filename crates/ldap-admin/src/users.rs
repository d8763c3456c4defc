//! User entries.

use crate::classify::{UserClassifier, UserType, BUILDER_ACCOUNT_SUFFIX};
use crate::connection::Connection;
use crate::dn::DistinguishedName;
use crate::protocol::{AddRequest, LdapEntry, PasswordModifyRequest, SearchRequest, SearchScope};
use crate::translate::is_entry_already_exists;
use crate::Result;
use async_trait::async_trait;
use ldap_admin_core::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

const UID_ATTRIBUTE: &str = "uid";
const ALT_UID_ATTRIBUTE: &str = "altUid";
const CN_ATTRIBUTE: &str = "cn";
const SN_ATTRIBUTE: &str = "sn";
const DISPLAY_NAME_ATTRIBUTE: &str = "displayName";
const EMPLOYEE_NUMBER_ATTRIBUTE: &str = "employeeNumber";
const MAIL_ATTRIBUTE: &str = "mail";
const PASSWORD_ATTRIBUTE: &str = "userPassword";
const STATUS_ATTRIBUTE: &str = "status";

/// Attributes returned for user entries; also the keys accepted by [`Users::filter`].
pub const USER_ATTRIBUTES: &[&str] = &[
    UID_ATTRIBUTE,
    ALT_UID_ATTRIBUTE,
    CN_ATTRIBUTE,
    SN_ATTRIBUTE,
    DISPLAY_NAME_ATTRIBUTE,
    EMPLOYEE_NUMBER_ATTRIBUTE,
    MAIL_ATTRIBUTE,
    STATUS_ATTRIBUTE,
];

const USER_OBJECT_CLASSES: [&str; 6] = [
    "person",
    "organizationalPerson",
    "inetOrgPerson",
    "top",
    "userExtras",
    "alternativeLogonUid",
];
const USER_FILTER: &str = "(&(objectClass=inetOrgPerson))";

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserStatus {
    /// Account in use.
    Active,
    /// Temporarily disabled.
    Disabled,
    /// Access revoked.
    Revoked,
    /// Marked as deleted.
    Deleted,
}

impl UserStatus {
    /// All recognised statuses.
    pub const ALL: [Self; 4] = [Self::Active, Self::Disabled, Self::Revoked, Self::Deleted];

    /// Directory representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Disabled => "Disabled",
            Self::Revoked => "Revoked",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                Error::BadRequest(format!(
                    "Invalid status '{value}'. Valid status's are [{}]",
                    valid.join(", ")
                ))
            })
    }
}

/// Representation of a user entry.
///
/// The password is write-only: it is accepted on input, sent on creation, and never
/// serialized or read back.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Primary identifier.
    pub uid: String,
    /// Alternate logon identifier.
    #[serde(default)]
    pub alt_uid: String,
    /// Common name.
    #[serde(default)]
    pub cn: String,
    /// Family name.
    #[serde(default)]
    pub sn: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Employee number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_number: Option<String>,
    /// Mail address.
    #[serde(default)]
    pub mail: String,
    /// Initial password.
    #[serde(
        rename = "userPassword",
        default,
        skip_serializing,
        deserialize_with = "deserialize_password"
    )]
    pub password: Option<SecretString>,
    /// Account status.
    #[serde(default)]
    pub status: Option<UserStatus>,
}

impl User {
    fn password(&self) -> Option<&str> {
        self.password
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|password| !password.trim().is_empty())
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = [
            (UID_ATTRIBUTE, self.uid.as_str()),
            (ALT_UID_ATTRIBUTE, self.alt_uid.as_str()),
            (CN_ATTRIBUTE, self.cn.as_str()),
            (SN_ATTRIBUTE, self.sn.as_str()),
            (DISPLAY_NAME_ATTRIBUTE, self.display_name.as_str()),
            (MAIL_ATTRIBUTE, self.mail.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if self.password().is_none() {
            missing.push(PASSWORD_ATTRIBUTE);
        }
        if self.status.is_none() {
            missing.push(STATUS_ATTRIBUTE);
        }
        missing
    }
}

fn deserialize_password<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// User operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Users: Send + Sync {
    /// Lists every user under the user base DN.
    async fn get_all(&self) -> Result<Vec<User>>;

    /// Fetches a single user.
    async fn get(&self, uid: &str) -> Result<User>;

    /// Lists users whose `key` attribute matches `value` (`*` wildcards allowed).
    async fn filter(&self, key: &str, value: &str) -> Result<Vec<User>>;

    /// Lists users with the given status.
    async fn filter_by_status(&self, status: &str) -> Result<Vec<User>>;

    /// Lists users of the given type (`personal`, `builder` or `npa`).
    async fn filter_by_type(&self, user_type: &str) -> Result<Vec<User>>;

    /// Creates a user and assigns its initial password.
    async fn create(&self, user: &User) -> Result<()>;

    /// Deletes a user.
    async fn delete(&self, uid: &str) -> Result<()>;

    /// Checks that the configured bind identity can authenticate.
    async fn authenticate(&self) -> Result<()>;

    /// Sets a new password and returns it. An empty `new_password` asks the directory to
    /// generate one.
    async fn set_new_password(&self, uid: &str, new_password: &str) -> Result<String>;
}

/// Directory-backed [`Users`].
pub struct DirectoryUsers {
    connection: Arc<Connection>,
    classifier: UserClassifier,
}

impl DirectoryUsers {
    /// Creates the manager. The personal uid pattern is taken from the configuration.
    #[must_use]
    pub fn new(connection: Arc<Connection>) -> Self {
        let classifier = UserClassifier::new(&connection.config().personal_uid_pattern);
        Self {
            connection,
            classifier,
        }
    }

    fn user_dn(&self, uid: &str) -> String {
        DistinguishedName::under(&self.connection.config().user_base_dn, UID_ATTRIBUTE, uid)
            .into()
    }

    async fn search(&self, base_dn: String, scope: SearchScope, filter: String) -> Result<Vec<User>> {
        let request = SearchRequest {
            base_dn,
            scope,
            filter,
            attributes: USER_ATTRIBUTES,
        };
        let entries = self.connection.search(&request).await?;
        Ok(entries.iter().map(parse_user_entry).collect())
    }

    async fn search_subtree(&self, filter: String) -> Result<Vec<User>> {
        let base = self.connection.config().user_base_dn.clone();
        self.search(base, SearchScope::Subtree, filter).await
    }

    async fn modify_password(
        &self,
        uid: &str,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<Option<String>> {
        let request = PasswordModifyRequest {
            user_dn: self.user_dn(uid),
            old_password: old_password.map(str::to_owned),
            new_password: new_password.map(str::to_owned),
        };
        self.connection
            .password_modify(&request)
            .await
            .map_err(|err| remap_not_found(err, uid))
    }

    async fn select(&self, kind: UserType) -> Result<Vec<User>> {
        self.classifier.check()?;
        let users = self.get_all().await?;
        self.classifier.select(users, kind)
    }
}

#[async_trait]
impl Users for DirectoryUsers {
    async fn get_all(&self) -> Result<Vec<User>> {
        self.search_subtree(USER_FILTER.to_string()).await
    }

    async fn get(&self, uid: &str) -> Result<User> {
        validate_uid(uid)?;
        self.search(self.user_dn(uid), SearchScope::Base, USER_FILTER.to_string())
            .await
            .map_err(|err| remap_not_found(err, uid))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(uid))
    }

    async fn filter(&self, key: &str, value: &str) -> Result<Vec<User>> {
        validate_filter(key, value)?;
        let filter = format!(
            "(&({key}={})(objectClass=inetOrgPerson))",
            escape_filter_value(value)
        );
        self.search_subtree(filter).await
    }

    async fn filter_by_status(&self, status: &str) -> Result<Vec<User>> {
        let status = status.parse::<UserStatus>()?;
        self.filter(STATUS_ATTRIBUTE, status.as_str()).await
    }

    async fn filter_by_type(&self, user_type: &str) -> Result<Vec<User>> {
        match user_type.parse::<UserType>()? {
            UserType::Builder => {
                self.filter(UID_ATTRIBUTE, &format!("*{BUILDER_ACCOUNT_SUFFIX}"))
                    .await
            }
            kind => self.select(kind).await,
        }
    }

    async fn create(&self, user: &User) -> Result<()> {
        let missing = user.missing_fields();
        if !missing.is_empty() {
            return Err(Error::missing_parameters(&missing));
        }
        let (Some(password), Some(status)) = (user.password(), user.status) else {
            return Err(Error::missing_parameters(&[PASSWORD_ATTRIBUTE, STATUS_ATTRIBUTE]));
        };

        let mut request = AddRequest::new(self.user_dn(&user.uid))
            .attribute("objectClass", USER_OBJECT_CLASSES)
            .attribute(UID_ATTRIBUTE, [user.uid.as_str()])
            .attribute(ALT_UID_ATTRIBUTE, [user.alt_uid.as_str()])
            .attribute(CN_ATTRIBUTE, [user.cn.as_str()])
            .attribute(SN_ATTRIBUTE, [user.sn.as_str()])
            .attribute(DISPLAY_NAME_ATTRIBUTE, [user.display_name.as_str()]);
        if let Some(number) = user.employee_number.as_deref().filter(|n| !n.is_empty()) {
            request = request.attribute(EMPLOYEE_NUMBER_ATTRIBUTE, [number]);
        }
        let request = request
            .attribute(MAIL_ATTRIBUTE, [user.mail.as_str()])
            .attribute(PASSWORD_ATTRIBUTE, [password])
            .attribute(STATUS_ATTRIBUTE, [status.as_str()]);

        self.connection.add(&request).await.map_err(|err| {
            if is_entry_already_exists(&err) {
                Error::Conflict(format!("User with uid = '{}' already exists", user.uid))
            } else {
                err
            }
        })?;

        // Initial assignment uses the same value as old and new password.
        self.modify_password(&user.uid, Some(password), Some(password))
            .await?;
        Ok(())
    }

    async fn delete(&self, uid: &str) -> Result<()> {
        validate_uid(uid)?;
        self.connection
            .delete(&self.user_dn(uid))
            .await
            .map_err(|err| remap_not_found(err, uid))
    }

    async fn authenticate(&self) -> Result<()> {
        self.connection.authenticate().await
    }

    async fn set_new_password(&self, uid: &str, new_password: &str) -> Result<String> {
        validate_uid(uid)?;
        if !new_password.is_empty() {
            self.modify_password(uid, None, Some(new_password)).await?;
            return Ok(new_password.to_string());
        }

        self.modify_password(uid, None, None)
            .await?
            .ok_or_else(|| {
                Error::InternalServerError(format!(
                    "directory returned no generated password for uid '{uid}'"
                ))
            })
    }
}

fn validate_uid(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        return Err(Error::missing_parameters(&[UID_ATTRIBUTE]));
    }
    Ok(())
}

fn validate_filter(key: &str, value: &str) -> Result<()> {
    let missing: Vec<&str> = [("key", key), ("value", value)]
        .into_iter()
        .filter(|(_, given)| given.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        return Err(Error::missing_parameters(&missing));
    }

    if !USER_ATTRIBUTES.contains(&key) {
        return Err(Error::BadRequest(format!(
            "Invalid filter key '{key}'. Valid filter keys are [{}]",
            USER_ATTRIBUTES.join(", ")
        )));
    }
    Ok(())
}

fn not_found(uid: &str) -> Error {
    Error::NotFound(format!("User with uid = '{uid}' was not found"))
}

fn remap_not_found(err: Error, uid: &str) -> Error {
    match err {
        Error::NotFound(_) => not_found(uid),
        other => other,
    }
}

fn parse_user_entry(entry: &LdapEntry) -> User {
    let text = |attribute: &str| entry.first(attribute).unwrap_or_default().to_string();

    let status = entry
        .first(STATUS_ATTRIBUTE)
        .and_then(|raw| match raw.parse::<UserStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(dn = %entry.dn, status = raw, "ignoring unrecognized user status");
                None
            }
        });

    User {
        uid: text(UID_ATTRIBUTE),
        alt_uid: text(ALT_UID_ATTRIBUTE),
        cn: text(CN_ATTRIBUTE),
        sn: text(SN_ATTRIBUTE),
        display_name: text(DISPLAY_NAME_ATTRIBUTE),
        employee_number: entry
            .first(EMPLOYEE_NUMBER_ATTRIBUTE)
            .filter(|number| !number.is_empty())
            .map(str::to_owned),
        mail: text(MAIL_ATTRIBUTE),
        password: None,
        status,
    }
}

/// Escapes RFC 4515 special characters, leaving `*` wildcards intact.
fn escape_filter_value(value: &str) -> String {
    value
        .chars()
        .flat_map(|ch| match ch {
            '(' => "\\28".chars().collect::<Vec<_>>(),
            ')' => "\\29".chars().collect(),
            '\\' => "\\5c".chars().collect(),
            '\0' => "\\00".chars().collect(),
            _ => vec![ch],
        })
        .collect()
}
