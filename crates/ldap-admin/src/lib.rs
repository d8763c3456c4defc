//! Directory administration client.
//!
//! This crate manages organizational units, groups and users held in an LDAP directory. Every
//! operation opens its own authenticated connection, and protocol failures are translated into
//! the [`ldap_admin_core::Error`] taxonomy.

#![deny(missing_docs)]

mod classify;
mod client;
mod connection;
mod dn;
mod groups;
mod membership;
mod org_units;
mod protocol;
mod transport;
mod translate;
mod users;

#[cfg(test)]
mod test_support;

pub use classify::{UserClassifier, UserType, BUILDER_ACCOUNT_SUFFIX};
pub use client::{DirectoryClient, DirectoryClientBuilder};
pub use connection::Connection;
pub use dn::DistinguishedName;
pub use groups::{cn_prefix_filter, DirectoryGroups, Group, Groups, SENTINEL_MEMBER_ID};
pub use membership::{plan_additions, plan_removals, MembershipChange, SentinelChange};
pub use org_units::{DirectoryOrganizationalUnits, OrganizationalUnits};
pub use protocol::{
    AddRequest, DirectoryError, DirectoryModification, LdapConnector, LdapEntry, LdapSession,
    ModifyRequest, PasswordModifyRequest, ResultCode, SearchRequest, SearchScope,
};
pub use transport::Ldap3Connector;
pub use translate::translate;
pub use users::{DirectoryUsers, User, UserStatus, Users, USER_ATTRIBUTES};

pub use ldap_admin_core::{DirectoryConfig, Error, Protocol};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = ldap_admin_core::Result<T>;
