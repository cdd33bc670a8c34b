//! Read-only collaborator contracts
//!
//! Role assignments are fetched fresh on every run; schema columns are
//! asked for once per distinct table.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RoleAssignments, TableRef};

/// Source of role label to granted permission names
#[async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    async fn fetch_assignments(&self) -> Result<RoleAssignments>;
}

/// Source of table column lists
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Full column list of a table
    async fn columns(&self, table: &TableRef) -> Result<Vec<String>>;
}
