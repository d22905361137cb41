//! Namespace, account, and role configuration types.
//!
//! Loading namespace/account definitions from TOML or `.env` is an external collaborator's
//! job; this crate only models the resolved shape and the inheritance/validation rules a
//! caller needs once those definitions are in memory.

pub mod account;
pub mod namespace;
pub mod resolve;

pub use account::{Account, AccountRef};
pub use namespace::{Namespace, NamespaceRoles};
pub use resolve::{ConfigError, ResolvedAccounts, Resolver};
