//! In-memory directory used by the integration tests.
//!
//! Implements just enough of LDAP for the client: exact-DN entries, base/one-level/subtree
//! scopes, `(&(attr=value)...)` filters with `*` wildcards, and the result codes the client
//! distinguishes.

#![allow(dead_code)]

use async_trait::async_trait;
use ldap_admin::{
    AddRequest, DirectoryConfig, DirectoryError, DirectoryModification, LdapConnector, LdapEntry,
    LdapSession, ModifyRequest, PasswordModifyRequest, ResultCode, SearchRequest, SearchScope,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const BASE_DN: &str = "o=company";
pub const USER_BASE_DN: &str = "ou=users,o=company";
pub const GROUP_BASE_DN: &str = "ou=projects,o=company";
pub const BIND_DN: &str = "cn=root,o=company";
pub const BIND_PASSWORD: &str = "somePassword";

const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const NO_SUCH_ATTRIBUTE: u32 = 16;

type Attributes = HashMap<String, Vec<String>>;

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Attributes>,
    connections: usize,
    modifies: usize,
    generated: usize,
}

/// Shared in-memory directory tree.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl InMemoryDirectory {
    /// Directory seeded with the base containers and the given organizational units.
    pub fn with_units(units: &[&str]) -> Self {
        let directory = Self::default();
        directory.insert(BASE_DN, [("objectClass", vec!["organization"])]);
        for (dn, ou) in [(USER_BASE_DN, "users"), (GROUP_BASE_DN, "projects")] {
            directory.insert(
                dn,
                [("objectClass", vec!["organizationalUnit"]), ("ou", vec![ou])],
            );
        }
        for unit in units {
            directory.insert(
                &format!("ou={unit},{GROUP_BASE_DN}"),
                [("objectClass", vec!["organizationalUnit"]), ("ou", vec![*unit])],
            );
        }
        directory
    }

    /// Inserts or replaces an entry.
    pub fn insert<'a, I>(&self, dn: &str, attributes: I)
    where
        I: IntoIterator<Item = (&'a str, Vec<&'a str>)>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        self.lock().entries.insert(dn.to_string(), attributes);
    }

    /// Adds a user entry with the usual attributes.
    pub fn insert_user(&self, uid: &str) {
        self.insert(
            &user_dn(uid),
            [
                ("objectClass", vec!["inetOrgPerson"]),
                ("uid", vec![uid]),
                ("cn", vec![uid]),
                ("sn", vec!["Doe"]),
                ("mail", vec!["someone@company.com"]),
                ("status", vec!["Active"]),
            ],
        );
    }

    /// Values of `attribute` on the entry at `dn`.
    pub fn values(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.lock()
            .entries
            .get(dn)
            .and_then(|attributes| attributes.get(attribute).cloned())
            .unwrap_or_default()
    }

    /// Number of connections opened so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Number of modify requests applied so far.
    pub fn modifies(&self) -> usize {
        self.lock().modifies
    }

    /// Connector dialing this directory.
    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            directory: self.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// Configuration matching the seeded directory.
pub fn config() -> DirectoryConfig {
    DirectoryConfig::default()
        .with_protocol("ldap")
        .with_hostname("ldap.company.com")
        .with_port(389)
        .with_base_dn(BASE_DN)
        .with_user_base_dn(USER_BASE_DN)
        .with_group_base_dn(GROUP_BASE_DN)
        .with_bind_credentials(BIND_DN, BIND_PASSWORD)
}

pub fn user_dn(uid: &str) -> String {
    format!("uid={uid},{USER_BASE_DN}")
}

pub fn group_dn(cn: &str, ou: &str) -> String {
    format!("cn={cn},ou={ou},{GROUP_BASE_DN}")
}

/// Connector handing out sessions on an [`InMemoryDirectory`].
pub struct InMemoryConnector {
    directory: InMemoryDirectory,
}

#[async_trait]
impl LdapConnector for InMemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn LdapSession>, DirectoryError> {
        self.directory.lock().connections += 1;
        Ok(Box::new(InMemorySession {
            directory: self.directory.clone(),
            bound: false,
        }))
    }
}

struct InMemorySession {
    directory: InMemoryDirectory,
    bound: bool,
}

impl InMemorySession {
    fn ensure_bound(&self) -> Result<(), DirectoryError> {
        if self.bound {
            Ok(())
        } else {
            Err(DirectoryError::result(
                ResultCode::InsufficientAccessRights,
                "anonymous access denied",
            ))
        }
    }
}

#[async_trait]
impl LdapSession for InMemorySession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        if dn != BIND_DN || password != BIND_PASSWORD {
            return Err(DirectoryError::result(ResultCode::InvalidCredentials, ""));
        }
        self.bound = true;
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<LdapEntry>, DirectoryError> {
        self.ensure_bound()?;
        let state = self.directory.lock();
        if !state.entries.contains_key(&request.base_dn) {
            return Err(no_such_object(&request.base_dn));
        }

        let terms = parse_filter(&request.filter);
        Ok(state
            .entries
            .iter()
            .filter(|(dn, _)| in_scope(dn, &request.base_dn, request.scope))
            .filter(|(_, attributes)| matches_filter(attributes, &terms))
            .map(|(dn, attributes)| {
                let mut entry = LdapEntry::new(dn.clone());
                for name in request.attributes {
                    if let Some(values) = attributes.get(*name) {
                        entry = entry.with_attribute(*name, values.iter().cloned());
                    }
                }
                entry
            })
            .collect())
    }

    async fn add(&mut self, request: &AddRequest) -> Result<(), DirectoryError> {
        self.ensure_bound()?;
        let mut state = self.directory.lock();
        if state.entries.contains_key(&request.dn) {
            return Err(DirectoryError::result(ResultCode::EntryAlreadyExists, ""));
        }
        let parent = parent_dn(&request.dn);
        if !state.entries.contains_key(parent) {
            return Err(no_such_object(parent));
        }
        state
            .entries
            .insert(request.dn.clone(), request.attributes.iter().cloned().collect());
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        self.ensure_bound()?;
        self.directory
            .lock()
            .entries
            .remove(dn)
            .map(|_| ())
            .ok_or_else(|| no_such_object(dn))
    }

    async fn modify(&mut self, request: &ModifyRequest) -> Result<(), DirectoryError> {
        self.ensure_bound()?;
        let mut state = self.directory.lock();
        let mut attributes = state
            .entries
            .get(&request.dn)
            .cloned()
            .ok_or_else(|| no_such_object(&request.dn))?;

        for modification in &request.modifications {
            match modification {
                DirectoryModification::Add { attribute, values } => {
                    let current = attributes.entry(attribute.clone()).or_default();
                    for value in values {
                        if current.contains(value) {
                            return Err(DirectoryError::result(
                                ResultCode::Other(ATTRIBUTE_OR_VALUE_EXISTS),
                                format!("{attribute} already holds {value}"),
                            ));
                        }
                        current.push(value.clone());
                    }
                }
                DirectoryModification::Delete { attribute, values } => {
                    let current = attributes.entry(attribute.clone()).or_default();
                    for value in values {
                        let Some(position) = current.iter().position(|v| v == value) else {
                            return Err(DirectoryError::result(
                                ResultCode::Other(NO_SUCH_ATTRIBUTE),
                                format!("{attribute} does not hold {value}"),
                            ));
                        };
                        current.remove(position);
                    }
                }
                DirectoryModification::Replace { attribute, values } => {
                    attributes.insert(attribute.clone(), values.clone());
                }
            }
        }

        state.entries.insert(request.dn.clone(), attributes);
        state.modifies += 1;
        Ok(())
    }

    async fn password_modify(
        &mut self,
        request: &PasswordModifyRequest,
    ) -> Result<Option<String>, DirectoryError> {
        self.ensure_bound()?;
        let mut state = self.directory.lock();
        if !state.entries.contains_key(&request.user_dn) {
            return Err(no_such_object(&request.user_dn));
        }

        let (password, generated) = match &request.new_password {
            Some(password) => (password.clone(), None),
            None => {
                state.generated += 1;
                let password = format!("generated-{}", state.generated);
                (password.clone(), Some(password))
            }
        };
        if let Some(attributes) = state.entries.get_mut(&request.user_dn) {
            attributes.insert("userPassword".to_string(), vec![password]);
        }
        Ok(generated)
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.bound = false;
        Ok(())
    }
}

fn no_such_object(dn: &str) -> DirectoryError {
    DirectoryError::result(ResultCode::NoSuchObject, format!("{dn} does not exist"))
}

fn parent_dn(dn: &str) -> &str {
    dn.split_once(',').map_or("", |(_, parent)| parent)
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => parent_dn(dn) == base,
        SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{base}")),
    }
}

/// Splits `(&(a=b)(c=d))` into `[("a", "b"), ("c", "d")]`.
fn parse_filter(filter: &str) -> Vec<(String, String)> {
    filter
        .trim_start_matches("(&")
        .split(|ch| ch == '(' || ch == ')')
        .filter_map(|term| term.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn matches_filter(attributes: &Attributes, terms: &[(String, String)]) -> bool {
    terms.iter().all(|(name, pattern)| {
        attributes
            .get(name)
            .is_some_and(|values| values.iter().any(|value| glob_match(pattern, value)))
    })
}

fn glob_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = value.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = rest.split_last().map_or(("", &[][..]), |(l, m)| (*l, m));
    for part in middle {
        match remaining.find(part) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}
