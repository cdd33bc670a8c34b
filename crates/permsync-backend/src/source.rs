//! Role store and schema adapters: in-memory and JSON file backed

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use permsync_common::error::{Error, Result};
use permsync_common::types::{RoleAssignments, TableColumns, TableRef};

pub use permsync_common::source::{RoleAssignmentStore, SchemaIntrospector};

/// In-memory role assignments
#[derive(Debug, Clone, Default)]
pub struct StaticRoleStore {
    assignments: RoleAssignments,
}

impl StaticRoleStore {
    pub fn new(assignments: RoleAssignments) -> Self {
        Self { assignments }
    }

    /// Grant permission names to a role
    pub fn with_role(mut self, role: &str, permissions: &[&str]) -> Self {
        self.assignments.insert(
            role.to_string(),
            permissions.iter().map(|p| (*p).to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl RoleAssignmentStore for StaticRoleStore {
    async fn fetch_assignments(&self) -> Result<RoleAssignments> {
        Ok(self.assignments.clone())
    }
}

/// Role assignments read from a JSON file (`{"role": ["permission", ...]}`)
#[derive(Debug, Clone)]
pub struct FileRoleStore {
    path: PathBuf,
}

impl FileRoleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RoleAssignmentStore for FileRoleStore {
    async fn fetch_assignments(&self) -> Result<RoleAssignments> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Source(format!("reading {}: {e}", self.path.display()))
        })?;
        let assignments: RoleAssignments = serde_json::from_str(&content)?;
        debug!(roles = assignments.len(), path = %self.path.display(), "Loaded role assignments");
        Ok(assignments)
    }
}

/// In-memory schema, also loadable from a JSON file
/// (`{"schema.table": ["column", ...]}`)
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    tables: TableColumns,
}

impl StaticSchema {
    pub fn new(tables: TableColumns) -> Self {
        Self { tables }
    }

    pub fn with_table(mut self, table: TableRef, columns: &[&str]) -> Self {
        self.tables
            .insert(table, columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(content)?;
        let tables = raw
            .into_iter()
            .map(|(qualified, columns)| (TableRef::parse(&qualified), columns))
            .collect();
        Ok(Self { tables })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Source(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }
}

#[async_trait]
impl SchemaIntrospector for StaticSchema {
    async fn columns(&self, table: &TableRef) -> Result<Vec<String>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::TableNotInSchema(table.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_static_schema_lookup() {
        let schema =
            StaticSchema::default().with_table(TableRef::public("collections"), &["id", "title"]);

        let columns = schema.columns(&TableRef::public("collections")).await.unwrap();
        assert_eq!(columns, vec!["id", "title"]);

        let missing = schema.columns(&TableRef::public("profiles")).await;
        assert!(matches!(missing, Err(Error::TableNotInSchema(_))));
    }

    #[test]
    fn test_schema_from_json() {
        let schema =
            StaticSchema::from_json_str(r#"{"app.collections": ["id"], "profiles": ["id", "name"]}"#)
                .unwrap();
        assert!(schema.tables.contains_key(&TableRef::new("app", "collections")));
        assert_eq!(schema.tables[&TableRef::public("profiles")].len(), 2);
    }

    #[tokio::test]
    async fn test_file_role_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"teacher": ["edit_collections", "view_dashboard"]}}"#).unwrap();

        let store = FileRoleStore::new(file.path());
        let assignments = store.fetch_assignments().await.unwrap();
        assert_eq!(assignments["teacher"], vec!["edit_collections", "view_dashboard"]);
    }

    #[tokio::test]
    async fn test_file_role_store_missing_file() {
        let store = FileRoleStore::new("/nonexistent/roles.json");
        assert!(matches!(
            store.fetch_assignments().await,
            Err(Error::Source(_))
        ));
    }
}
