//! Static catalogs: roles, permission keys, feature keys, menu items.
//!
//! Everything in here is a closed, compile-time enumeration. Tenants never
//! add rows to these catalogs; the dynamic RBAC surface mirrors the
//! permission catalog into the database via the sync operation in
//! `store::dynamic`.

pub mod features;
pub mod menu;
pub mod permissions;
pub mod roles;

pub use permissions::{Category, PermissionKey};
pub use roles::{RoleDefinition, RoleKey};
