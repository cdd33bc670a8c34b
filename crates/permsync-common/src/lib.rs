//! Permsync Common Types and Utilities
//!
//! Shared data model, configuration, and error handling for the row-level
//! permission compiler and its synchronizer.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::PermsyncConfig;
pub use error::{Error, Result};
pub use source::{RoleAssignmentStore, SchemaIntrospector};
pub use types::{
    normalize_role, CheckPredicate, CheckValue, MergedRule, Operation, RoleAssignments, SyncMode,
    TableColumns, TableRef,
};
