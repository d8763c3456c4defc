//! # ldap-admin-core
//!
//! Shared building blocks for the `ldap-admin` directory client.
//!
//! ## Modules
//!
//! - [`error`] - Application error taxonomy and status code mapping
//! - [`config`] - Connection configuration, validation and environment loading

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{DirectoryConfig, Protocol};
pub use error::{Error, Result};
