//! Row-Level Permission Compiler
//!
//! Turns a declarative policy registry into deployable per-role rules:
//! - Registry loading (JSON or TOML)
//! - Schema resolution for referenced tables
//! - Role expansion into single-operation rules
//! - Grouping by (role, table, operation) slot
//! - Merging conflicting rules into one rule per slot
//! - Lint for unconditional/restricted absorption

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod expander;
pub mod grouper;
pub mod lint;
pub mod merge;
pub mod registry;
pub mod schema;

pub use expander::{expand, role_grants, ResolvedRule};
pub use grouper::{group, SlotKey};
pub use lint::{lint_assignments, lint_registry, AbsorptionFinding};
pub use merge::{merge_all, merge_bucket, MergeOptions};
pub use registry::{ColumnSelector, OperationSet, PermissionSpec, PolicyRegistry};
pub use schema::{referenced_tables, resolve_schema};

use permsync_common::error::Result;
use permsync_common::types::{MergedRule, RoleAssignments, TableColumns};

/// Expand, group and merge in one pass.
///
/// Pure and synchronous; fails before producing anything if a referenced
/// table or column is missing from `columns`.
pub fn compile(
    registry: &PolicyRegistry,
    assignments: &RoleAssignments,
    columns: &TableColumns,
    options: MergeOptions,
) -> Result<Vec<MergedRule>> {
    let resolved = expand(registry, assignments, columns)?;
    let buckets = group(resolved);
    Ok(merge_all(&buckets, options))
}
