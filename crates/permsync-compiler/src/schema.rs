//! Schema resolution for the tables a registry references

use std::collections::BTreeSet;
use tracing::debug;

use permsync_common::error::Result;
use permsync_common::source::SchemaIntrospector;
use permsync_common::types::{TableColumns, TableRef};

use crate::registry::PolicyRegistry;

/// Distinct tables referenced by any row-level spec
pub fn referenced_tables(registry: &PolicyRegistry) -> BTreeSet<TableRef> {
    registry
        .iter()
        .flat_map(|(_, specs)| specs.iter().map(|spec| spec.table.clone()))
        .collect()
}

/// Fetch the full column list of every referenced table, once per table
pub async fn resolve_schema(
    registry: &PolicyRegistry,
    introspector: &dyn SchemaIntrospector,
) -> Result<TableColumns> {
    let mut columns = TableColumns::new();

    for table in referenced_tables(registry) {
        let table_columns = introspector.columns(&table).await?;
        debug!(table = %table, columns = table_columns.len(), "Resolved table columns");
        columns.insert(table, table_columns);
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PermissionSpec;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use permsync_common::error::Error;
    use permsync_common::types::Operation;

    struct RecordingSchema {
        asked: Mutex<Vec<TableRef>>,
    }

    #[async_trait]
    impl SchemaIntrospector for RecordingSchema {
        async fn columns(&self, table: &TableRef) -> Result<Vec<String>> {
            self.asked.lock().push(table.clone());
            if table.name == "missing" {
                return Err(Error::TableNotInSchema(table.clone()));
            }
            Ok(vec!["id".to_string()])
        }
    }

    fn registry() -> PolicyRegistry {
        PolicyRegistry::new()
            .with_permission(
                "a",
                vec![
                    PermissionSpec::new(TableRef::public("collections"), Operation::Select),
                    PermissionSpec::new(TableRef::public("profiles"), Operation::Update),
                ],
            )
            .with_permission(
                "b",
                vec![PermissionSpec::new(
                    TableRef::public("collections"),
                    Operation::Update,
                )],
            )
            .governed_elsewhere("c")
    }

    #[tokio::test]
    async fn test_each_table_queried_once() {
        let schema = RecordingSchema {
            asked: Mutex::new(Vec::new()),
        };

        let columns = resolve_schema(&registry(), &schema).await.unwrap();

        assert_eq!(columns.len(), 2);
        assert_eq!(
            *schema.asked.lock(),
            vec![TableRef::public("collections"), TableRef::public("profiles")]
        );
    }

    #[tokio::test]
    async fn test_missing_table_is_fatal() {
        let registry = PolicyRegistry::new().with_permission(
            "x",
            vec![PermissionSpec::new(TableRef::public("missing"), Operation::Select)],
        );
        let schema = RecordingSchema {
            asked: Mutex::new(Vec::new()),
        };

        let err = resolve_schema(&registry, &schema).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
