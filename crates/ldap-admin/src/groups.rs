//! Group entries and membership management.

use crate::connection::Connection;
use crate::dn::{component_value, DistinguishedName};
use crate::membership::{plan_additions, plan_removals, MembershipChange};
use crate::org_units::{OrganizationalUnits, OU_ATTRIBUTE};
use crate::protocol::{AddRequest, LdapEntry, ModifyRequest, SearchRequest, SearchScope};
use crate::translate::is_entry_already_exists;
use crate::Result;
use async_trait::async_trait;
use ldap_admin_core::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Placeholder member identifier occupying otherwise empty groups.
pub const SENTINEL_MEMBER_ID: &str = "NO_SUCH_USER";

const MEMBER_ATTRIBUTE: &str = "uniqueMember";
const CN_ATTRIBUTE: &str = "cn";
const GROUP_OBJECT_CLASSES: [&str; 2] = ["groupOfUniqueNames", "top"];
const GROUP_FILTER: &str = "(&(objectClass=groupOfUniqueNames))";
const GROUP_ATTRIBUTES: &[&str] = &[CN_ATTRIBUTE, MEMBER_ATTRIBUTE];

/// Representation of a group entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Distinguished name of the group.
    pub dn: String,
    /// Organizational unit the group lives in.
    pub ou: String,
    /// Common name.
    pub cn: String,
    /// Member DNs, sentinel included when present.
    #[serde(default)]
    pub members: Vec<String>,
}

impl Group {
    /// Returns the number of member values, sentinel included.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Checks whether `member_dn` is a member (exact match).
    #[must_use]
    pub fn has_member(&self, member_dn: &str) -> bool {
        self.members.iter().any(|dn| dn == member_dn)
    }
}

/// Builds the wildcard filter matching groups whose common name starts with `prefix`.
#[must_use]
pub fn cn_prefix_filter(prefix: &str) -> String {
    format!("(&(cn={prefix}*)(objectClass=groupOfUniqueNames))")
}

/// Group operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Groups: Send + Sync {
    /// Lists every group under the group base DN.
    async fn get_all(&self) -> Result<Vec<Group>>;

    /// Lists groups below the DN resolved from `cn`/`ou`. Either may be empty.
    async fn get(&self, cn: &str, ou: &str) -> Result<Vec<Group>>;

    /// Lists groups under the group base DN matching a raw filter.
    async fn get_by_filter(&self, filter: &str) -> Result<Vec<Group>>;

    /// Creates a group. Blank identifiers are skipped; without members, the sentinel member is
    /// used.
    async fn create(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()>;

    /// Deletes a group.
    async fn delete(&self, cn: &str, ou: &str) -> Result<()>;

    /// Adds members by identifier; identifiers already present are ignored.
    async fn add_members(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()>;

    /// Removes members by identifier; identifiers not present are ignored.
    async fn remove_members(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()>;
}

/// Directory-backed [`Groups`].
pub struct DirectoryGroups {
    connection: Arc<Connection>,
    org_units: Arc<dyn OrganizationalUnits>,
}

impl DirectoryGroups {
    /// Creates the manager. `org_units` validates every supplied `ou`.
    #[must_use]
    pub fn new(connection: Arc<Connection>, org_units: Arc<dyn OrganizationalUnits>) -> Self {
        Self {
            connection,
            org_units,
        }
    }

    fn group_dn(&self, cn: &str, ou: &str) -> String {
        let base = &self.connection.config().group_base_dn;
        match (cn.is_empty(), ou.is_empty()) {
            (false, false) => {
                let unit = DistinguishedName::under(base, OU_ATTRIBUTE, ou);
                DistinguishedName::under(unit.as_str(), CN_ATTRIBUTE, cn).into()
            }
            (_, false) => DistinguishedName::under(base, OU_ATTRIBUTE, ou).into(),
            _ => base.clone(),
        }
    }

    /// Member DN for an identifier: uppercased and qualified under the user base.
    fn member_dn(&self, id: &str) -> String {
        DistinguishedName::under(
            &self.connection.config().user_base_dn,
            "uid",
            &id.to_uppercase(),
        )
        .into()
    }

    /// Member DNs for the non-blank identifiers, each once, in request order.
    fn member_dns(&self, ids: &[String]) -> Vec<String> {
        let mut dns: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            let dn = self.member_dn(id);
            if !dns.contains(&dn) {
                dns.push(dn);
            }
        }
        dns
    }

    async fn validate_ou(&self, ou: &str) -> Result<()> {
        let units = self.org_units.list_all().await?;
        if units.iter().any(|unit| unit == ou) {
            return Ok(());
        }
        Err(Error::BadRequest(format!(
            "Invalid organizational unit '{ou}'. Valid values are [{}]",
            units.join(", ")
        )))
    }

    async fn validate_target(&self, cn: &str, ou: &str) -> Result<()> {
        let missing: Vec<&str> = [(CN_ATTRIBUTE, cn), (OU_ATTRIBUTE, ou)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::missing_parameters(&missing));
        }
        self.validate_ou(ou).await
    }

    async fn search(&self, base_dn: String, filter: String) -> Result<Vec<Group>> {
        let request = SearchRequest {
            base_dn,
            scope: SearchScope::Subtree,
            filter,
            attributes: GROUP_ATTRIBUTES,
        };
        let entries = self.connection.search(&request).await?;
        Ok(entries.iter().map(parse_group_entry).collect())
    }

    async fn fetch(&self, cn: &str, ou: &str) -> Result<Vec<Group>> {
        self.search(self.group_dn(cn, ou), GROUP_FILTER.to_string())
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => not_found(cn, ou),
                other => other,
            })
    }

    async fn current_members(&self, cn: &str, ou: &str) -> Result<Vec<String>> {
        self.fetch(cn, ou)
            .await?
            .into_iter()
            .next()
            .map(|group| group.members)
            .ok_or_else(|| not_found(cn, ou))
    }

    async fn apply(&self, cn: &str, ou: &str, change: MembershipChange) -> Result<()> {
        if change.is_empty() {
            debug!(cn, ou, "group membership already up to date");
            return Ok(());
        }

        let request = ModifyRequest {
            dn: self.group_dn(cn, ou),
            modifications: change.modifications(MEMBER_ATTRIBUTE),
        };
        self.connection.modify(&request).await
    }
}

#[async_trait]
impl Groups for DirectoryGroups {
    async fn get_all(&self) -> Result<Vec<Group>> {
        self.fetch("", "").await
    }

    async fn get(&self, cn: &str, ou: &str) -> Result<Vec<Group>> {
        if !ou.is_empty() {
            self.validate_ou(ou).await?;
        }
        self.fetch(cn, ou).await
    }

    async fn get_by_filter(&self, filter: &str) -> Result<Vec<Group>> {
        let base = self.connection.config().group_base_dn.clone();
        self.search(base, filter.to_string()).await
    }

    async fn create(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()> {
        self.validate_target(cn, ou).await?;

        let mut members = self.member_dns(member_ids);
        if members.is_empty() {
            members.push(self.member_dn(SENTINEL_MEMBER_ID));
        }

        let request = AddRequest::new(self.group_dn(cn, ou))
            .attribute("objectClass", GROUP_OBJECT_CLASSES)
            .attribute(CN_ATTRIBUTE, [cn])
            .attribute(MEMBER_ATTRIBUTE, members);

        self.connection.add(&request).await.map_err(|err| {
            if is_entry_already_exists(&err) {
                Error::Conflict(format!(
                    "Group with cn = '{cn}' and ou = '{ou}' already exists"
                ))
            } else {
                err
            }
        })
    }

    async fn delete(&self, cn: &str, ou: &str) -> Result<()> {
        self.validate_target(cn, ou).await?;
        self.connection
            .delete(&self.group_dn(cn, ou))
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => not_found(cn, ou),
                other => other,
            })
    }

    async fn add_members(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()> {
        self.validate_target(cn, ou).await?;
        let current = self.current_members(cn, ou).await?;

        let requested = self.member_dns(member_ids);
        let sentinel = self.member_dn(SENTINEL_MEMBER_ID);
        let change = plan_additions(&current, &requested, &sentinel);
        for dn in &change.additions {
            info!("UniqueMember '{dn}' will be added to the group '{cn}'");
        }

        self.apply(cn, ou, change).await
    }

    async fn remove_members(&self, cn: &str, ou: &str, member_ids: &[String]) -> Result<()> {
        self.validate_target(cn, ou).await?;
        let current = self.current_members(cn, ou).await?;

        let requested = self.member_dns(member_ids);
        let sentinel = self.member_dn(SENTINEL_MEMBER_ID);
        let change = plan_removals(&current, &requested, &sentinel);
        for dn in &change.removals {
            info!("UniqueMember '{dn}' will be removed from the group '{cn}'");
        }

        self.apply(cn, ou, change).await
    }
}

fn not_found(cn: &str, ou: &str) -> Error {
    Error::NotFound(format!(
        "Group with cn = '{cn}' and ou = '{ou}' was not found"
    ))
}

fn parse_group_entry(entry: &LdapEntry) -> Group {
    let cn = entry
        .first(CN_ATTRIBUTE)
        .map(str::to_owned)
        .or_else(|| component_value(&entry.dn, 0, CN_ATTRIBUTE))
        .unwrap_or_default();

    Group {
        dn: entry.dn.clone(),
        ou: component_value(&entry.dn, 1, OU_ATTRIBUTE).unwrap_or_default(),
        cn,
        members: entry.values(MEMBER_ATTRIBUTE).to_vec(),
    }
}
