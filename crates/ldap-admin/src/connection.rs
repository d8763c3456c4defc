//! Connection manager.
//!
//! Every operation opens its own connection: the configuration is checked, the transport is
//! dialed, the configured identity binds, the operation runs, and the connection is released
//! on every exit path. There is no pooling and no retry.

use crate::protocol::{
    AddRequest, LdapConnector, LdapEntry, LdapSession, ModifyRequest, PasswordModifyRequest,
    SearchRequest,
};
use crate::translate::translate;
use crate::Result;
use ldap_admin_core::DirectoryConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes directory operations over short-lived, authenticated connections.
pub struct Connection {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
}

impl Connection {
    /// Creates a connection manager using `connector` to dial the directory.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>, connector: Box<dyn LdapConnector>) -> Self {
        Self { config, connector }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Connects and binds with the configured identity, then releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ldap_admin_core::Error::BadRequest`] for incomplete configuration, or the
    /// translated dial/bind failure.
    pub async fn authenticate(&self) -> Result<()> {
        let session = self.open().await?;
        release(session).await;
        Ok(())
    }

    /// Runs a search.
    ///
    /// # Errors
    ///
    /// Returns the translated connection or search failure.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<LdapEntry>> {
        let mut session = self.open().await?;
        let outcome = session.search(request).await;
        release(session).await;
        outcome.map_err(translate)
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// Returns the translated connection or add failure.
    pub async fn add(&self, request: &AddRequest) -> Result<()> {
        let mut session = self.open().await?;
        let outcome = session.add(request).await;
        release(session).await;
        outcome.map_err(translate)
    }

    /// Deletes the entry at `dn`.
    ///
    /// # Errors
    ///
    /// Returns the translated connection or delete failure.
    pub async fn delete(&self, dn: &str) -> Result<()> {
        let mut session = self.open().await?;
        let outcome = session.delete(dn).await;
        release(session).await;
        outcome.map_err(translate)
    }

    /// Modifies an entry.
    ///
    /// # Errors
    ///
    /// Returns the translated connection or modify failure.
    pub async fn modify(&self, request: &ModifyRequest) -> Result<()> {
        let mut session = self.open().await?;
        let outcome = session.modify(request).await;
        release(session).await;
        outcome.map_err(translate)
    }

    /// Runs the password modify extended operation.
    ///
    /// # Errors
    ///
    /// Returns the translated connection or password modify failure.
    pub async fn password_modify(&self, request: &PasswordModifyRequest) -> Result<Option<String>> {
        let mut session = self.open().await?;
        let outcome = session.password_modify(request).await;
        release(session).await;
        outcome.map_err(translate)
    }

    async fn open(&self) -> Result<Box<dyn LdapSession>> {
        self.config.check()?;
        let url = self.config.url()?;
        debug!(url = %url, "connecting to directory");

        let mut session = self.connector.connect(&url).await.map_err(translate)?;
        if let Err(err) = session
            .simple_bind(&self.config.bind_dn, self.config.bind_password())
            .await
        {
            release(session).await;
            return Err(translate(err));
        }

        debug!(bind_dn = %self.config.bind_dn, "bound to directory");
        Ok(session)
    }
}

async fn release(mut session: Box<dyn LdapSession>) {
    if let Err(err) = session.unbind().await {
        warn!(error = %err, "failed to release directory connection");
    }
}
