//! ldap3-backed transport.

use crate::protocol::{
    AddRequest, DirectoryError, DirectoryModification, LdapConnector, LdapEntry, LdapSession,
    ModifyRequest, PasswordModifyRequest, ResultCode, SearchRequest, SearchScope,
};
use async_trait::async_trait;
use ldap3::exop::{PasswordModify, PasswordModifyResp};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use ldap_admin_core::DirectoryConfig;
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Connector that dials the configured server with ldap3.
pub struct Ldap3Connector {
    config: Arc<DirectoryConfig>,
}

impl Ldap3Connector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for Ldap3Connector {
    async fn connect(&self, url: &str) -> Result<Box<dyn LdapSession>, DirectoryError> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(map_ldap_error)?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "LDAP connection driver error");
            }
        });

        Ok(Box::new(Ldap3Session {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct Ldap3Session {
    inner: Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for Ldap3Session {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        bounded(
            self.operation_timeout,
            "bind",
            self.inner.simple_bind(dn, password),
        )
        .await?
        .success()
        .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<LdapEntry>, DirectoryError> {
        let (entries, _) = bounded(
            self.operation_timeout,
            "search",
            self.inner.search(
                &request.base_dn,
                request.scope.into(),
                &request.filter,
                request.attributes.to_vec(),
            ),
        )
        .await?
        .success()
        .map_err(map_ldap_error)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn add(&mut self, request: &AddRequest) -> Result<(), DirectoryError> {
        let attributes = request
            .attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect::<HashSet<_>>()))
            .collect::<Vec<_>>();

        bounded(
            self.operation_timeout,
            "add",
            self.inner.add(&request.dn, attributes),
        )
        .await?
        .success()
        .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        bounded(self.operation_timeout, "delete", self.inner.delete(dn))
            .await?
            .success()
            .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn modify(&mut self, request: &ModifyRequest) -> Result<(), DirectoryError> {
        let mods = request
            .modifications
            .iter()
            .map(|modification| match modification {
                DirectoryModification::Add { attribute, values } => {
                    Mod::Add(attribute.clone(), values.iter().cloned().collect())
                }
                DirectoryModification::Delete { attribute, values } => {
                    Mod::Delete(attribute.clone(), values.iter().cloned().collect())
                }
                DirectoryModification::Replace { attribute, values } => {
                    Mod::Replace(attribute.clone(), values.iter().cloned().collect())
                }
            })
            .collect::<Vec<Mod<String>>>();

        bounded(
            self.operation_timeout,
            "modify",
            self.inner.modify(&request.dn, mods),
        )
        .await?
        .success()
        .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn password_modify(
        &mut self,
        request: &PasswordModifyRequest,
    ) -> Result<Option<String>, DirectoryError> {
        let exop = PasswordModify {
            user_id: Some(request.user_dn.as_str()),
            old_pass: request.old_password.as_deref(),
            new_pass: request.new_password.as_deref(),
        };

        let (response, _) = bounded(
            self.operation_timeout,
            "password modify",
            self.inner.extended(exop),
        )
        .await?
        .success()
        .map_err(map_ldap_error)?;

        if request.new_password.is_some() || response.val.is_none() {
            return Ok(None);
        }
        Ok(Some(response.parse::<PasswordModifyResp>().gen_pass))
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        bounded(self.operation_timeout, "unbind", self.inner.unbind()).await
    }
}

async fn bounded<F, T>(limit: Duration, operation: &str, fut: F) -> Result<T, DirectoryError>
where
    F: Future<Output = ldap3::result::Result<T>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| DirectoryError::Transport(format!("LDAP {operation} timed out")))?
        .map_err(map_ldap_error)
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings, DirectoryError> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify {
        warn!("TLS verification disabled for directory connections");
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                DirectoryError::Transport(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert.as_ref() {
        debug!("loading directory CA certificate from {}", cert_path.display());
        let pem = fs::read(cert_path).map_err(|err| {
            DirectoryError::Transport(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| DirectoryError::Transport(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                DirectoryError::Transport(format!("failed to load CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } => DirectoryError::Result {
            code: ResultCode::from_code(result.rc),
            message: result.text,
        },
        other => DirectoryError::Transport(other.to_string()),
    }
}
