//! Organizational units under the group base DN.
//!
//! Units are provisioned out of band; the client only lists them, mainly to validate the `ou`
//! argument of group operations.

use crate::connection::Connection;
use crate::protocol::{LdapEntry, SearchRequest, SearchScope};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub(crate) const OU_ATTRIBUTE: &str = "ou";
const ORG_UNIT_FILTER: &str = "(&(objectClass=organizationalUnit))";
const ORG_UNIT_ATTRIBUTES: &[&str] = &[OU_ATTRIBUTE];

/// Read-only access to organizational units.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrganizationalUnits: Send + Sync {
    /// Lists the names of the units one level below the group base DN, in directory order.
    async fn list_all(&self) -> Result<Vec<String>>;
}

/// Directory-backed [`OrganizationalUnits`].
pub struct DirectoryOrganizationalUnits {
    connection: Arc<Connection>,
}

impl DirectoryOrganizationalUnits {
    /// Creates the manager on top of a shared connection manager.
    #[must_use]
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    fn search_request(&self) -> SearchRequest {
        SearchRequest {
            base_dn: self.connection.config().group_base_dn.clone(),
            scope: SearchScope::OneLevel,
            filter: ORG_UNIT_FILTER.to_string(),
            attributes: ORG_UNIT_ATTRIBUTES,
        }
    }
}

#[async_trait]
impl OrganizationalUnits for DirectoryOrganizationalUnits {
    async fn list_all(&self) -> Result<Vec<String>> {
        let entries = self.connection.search(&self.search_request()).await?;
        Ok(parse_entries(&entries))
    }
}

fn parse_entries(entries: &[LdapEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| entry.first(OU_ATTRIBUTE).map(str::to_owned))
        .collect()
}
