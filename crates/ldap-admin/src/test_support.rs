//! Fixtures shared by the unit tests.

use crate::protocol::{LdapSession, MockLdapConnector, MockLdapSession};
use ldap_admin_core::DirectoryConfig;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) const USER_BASE_DN: &str = "ou=users,o=company";
pub(crate) const GROUP_BASE_DN: &str = "ou=projects,o=company";

pub(crate) fn sample_config() -> DirectoryConfig {
    DirectoryConfig::default()
        .with_protocol("ldaps")
        .with_hostname("ldap.company.com")
        .with_port(636)
        .with_base_dn("o=company")
        .with_user_base_dn(USER_BASE_DN)
        .with_group_base_dn(GROUP_BASE_DN)
        .with_bind_credentials("cn=root,o=company", "somePassword")
}

/// Session that expects exactly one bind and one release.
pub(crate) fn bound_session() -> MockLdapSession {
    let mut session = MockLdapSession::new();
    session.expect_simple_bind().times(1).returning(|_, _| Ok(()));
    session.expect_unbind().times(1).returning(|| Ok(()));
    session
}

/// Connector handing out `sessions` in order, one per connect.
pub(crate) fn connector_with(sessions: Vec<MockLdapSession>) -> MockLdapConnector {
    let count = sessions.len();
    let queue = Mutex::new(VecDeque::from(sessions));
    let mut connector = MockLdapConnector::new();
    connector.expect_connect().times(count).returning(move |_| {
        let session = queue
            .lock()
            .unwrap()
            .pop_front()
            .expect("more connections than scripted sessions");
        Ok(Box::new(session) as Box<dyn LdapSession>)
    });
    connector
}
