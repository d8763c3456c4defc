//! Directory client facade wiring the entity managers together.

use crate::connection::Connection;
use crate::groups::{DirectoryGroups, Groups};
use crate::org_units::{DirectoryOrganizationalUnits, OrganizationalUnits};
use crate::protocol::LdapConnector;
use crate::transport::Ldap3Connector;
use crate::users::{DirectoryUsers, Users};
use ldap_admin_core::DirectoryConfig;
use std::sync::Arc;

/// Builder for [`DirectoryClient`].
pub struct DirectoryClientBuilder {
    config: Arc<DirectoryConfig>,
    connector: Option<Box<dyn LdapConnector>>,
    org_units: Option<Arc<dyn OrganizationalUnits>>,
    groups: Option<Arc<dyn Groups>>,
    users: Option<Arc<dyn Users>>,
}

impl DirectoryClientBuilder {
    /// Create a new builder from a [`DirectoryConfig`].
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config: Arc::new(config),
            connector: None,
            org_units: None,
            groups: None,
            users: None,
        }
    }

    /// Dial through `connector` instead of the ldap3 transport.
    #[must_use]
    pub fn connector(mut self, connector: impl LdapConnector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Replace the organizational unit manager. Group validation uses it as well.
    #[must_use]
    pub fn org_units(mut self, manager: Arc<dyn OrganizationalUnits>) -> Self {
        self.org_units = Some(manager);
        self
    }

    /// Replace the group manager.
    #[must_use]
    pub fn groups(mut self, manager: Arc<dyn Groups>) -> Self {
        self.groups = Some(manager);
        self
    }

    /// Replace the user manager.
    #[must_use]
    pub fn users(mut self, manager: Arc<dyn Users>) -> Self {
        self.users = Some(manager);
        self
    }

    /// Finalise the builder and create the [`DirectoryClient`].
    #[must_use]
    pub fn build(self) -> DirectoryClient {
        let config = self.config;
        let connector = self
            .connector
            .unwrap_or_else(|| Box::new(Ldap3Connector::new(Arc::clone(&config))));
        let connection = Arc::new(Connection::new(Arc::clone(&config), connector));

        let org_units = self.org_units.unwrap_or_else(|| {
            Arc::new(DirectoryOrganizationalUnits::new(Arc::clone(&connection)))
        });
        let groups = self.groups.unwrap_or_else(|| {
            Arc::new(DirectoryGroups::new(
                Arc::clone(&connection),
                Arc::clone(&org_units),
            ))
        });
        let users = self
            .users
            .unwrap_or_else(|| Arc::new(DirectoryUsers::new(Arc::clone(&connection))));

        DirectoryClient {
            config,
            org_units,
            groups,
            users,
        }
    }
}

/// Entry point for directory administration.
///
/// Holds no directory state: every call goes to the server over its own connection.
#[derive(Clone)]
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    org_units: Arc<dyn OrganizationalUnits>,
    groups: Arc<dyn Groups>,
    users: Arc<dyn Users>,
}

impl DirectoryClient {
    /// Construct a client using the ldap3 transport.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        DirectoryClientBuilder::new(config).build()
    }

    /// Start a builder pre-populated with the provided configuration.
    #[must_use]
    pub fn builder(config: DirectoryConfig) -> DirectoryClientBuilder {
        DirectoryClientBuilder::new(config)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Organizational unit operations.
    #[must_use]
    pub fn org_units(&self) -> &dyn OrganizationalUnits {
        self.org_units.as_ref()
    }

    /// Group operations.
    #[must_use]
    pub fn groups(&self) -> &dyn Groups {
        self.groups.as_ref()
    }

    /// User operations.
    #[must_use]
    pub fn users(&self) -> &dyn Users {
        self.users.as_ref()
    }
}
