//! Authorization Backend Synchronization
//!
//! Pushes compiled row-level rules to an external authorization backend:
//! - External collaborator contracts (role store, schema introspection)
//! - Wire commands and the HTTP admin client
//! - Check expression building
//! - Bounded-concurrency sync driver
//! - Audit snapshot output

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod check;
pub mod client;
pub mod driver;
pub mod source;

pub use audit::AuditSnapshot;
pub use check::build_check;
pub use client::{AuthorizationBackend, HttpBackend, RuleCommand};
pub use driver::{ApplyFailure, SyncDriver, SyncReport};
pub use source::{
    FileRoleStore, RoleAssignmentStore, SchemaIntrospector, StaticRoleStore, StaticSchema,
};
