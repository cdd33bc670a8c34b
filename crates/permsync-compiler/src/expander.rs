//! Role expansion: role grants + registry + schema into single-operation rules

use std::collections::BTreeMap;
use tracing::{debug, warn};

use permsync_common::error::{Error, Result};
use permsync_common::types::{
    normalize_role, CheckPredicate, Operation, RoleAssignments, TableColumns, TableRef,
};

use crate::registry::{ColumnSelector, PolicyRegistry};

/// One permission spec narrowed to a single role and operation, with
/// its columns resolved against the live schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    pub role: String,
    pub table: TableRef,
    pub operation: Operation,
    pub columns: Vec<String>,
    pub check: Option<CheckPredicate>,
}

/// Resolve a column selector against a table's full column list.
///
/// The result is always a subset of `all_columns`: explicit columns that
/// do not exist on the table are a configuration error.
pub fn resolve_columns(
    selector: &ColumnSelector,
    table: &TableRef,
    all_columns: &[String],
) -> Result<Vec<String>> {
    match selector {
        ColumnSelector::All => Ok(all_columns.to_vec()),
        ColumnSelector::Exclude(excluded) => {
            for column in excluded {
                if !all_columns.contains(column) {
                    warn!(table = %table, column = %column, "Excluded column does not exist");
                }
            }
            Ok(all_columns
                .iter()
                .filter(|c| !excluded.contains(*c))
                .cloned()
                .collect())
        }
        ColumnSelector::Explicit(columns) => {
            if let Some(unknown) = columns.iter().find(|c| !all_columns.contains(*c)) {
                return Err(Error::UnknownColumn {
                    table: table.clone(),
                    column: unknown.clone(),
                });
            }
            Ok(columns.clone())
        }
    }
}

/// Granted permission names per normalized role.
///
/// Labels that normalize to the same backend role share one grant list.
/// A name granted more than once to a role counts once, in first-grant order.
pub fn role_grants(assignments: &RoleAssignments) -> Result<BTreeMap<String, Vec<&str>>> {
    let mut grants: BTreeMap<String, Vec<&str>> = BTreeMap::new();

    for (label, granted) in assignments {
        let role = normalize_role(label)?;
        if role != *label {
            debug!(label = %label, role = %role, "Normalized role label");
        }

        let list = grants.entry(role).or_default();
        for permission in granted {
            if !list.contains(&permission.as_str()) {
                list.push(permission.as_str());
            }
        }
    }

    Ok(grants)
}

/// Expand every role's granted permissions into resolved rules.
///
/// Permission names with no registry entry, or a null one, are governed
/// elsewhere and skipped. A table missing from `columns` or an unusable
/// role label aborts the whole expansion; nothing is returned partially.
pub fn expand(
    registry: &PolicyRegistry,
    assignments: &RoleAssignments,
    columns: &TableColumns,
) -> Result<Vec<ResolvedRule>> {
    let mut resolved = Vec::new();

    for (role, granted) in role_grants(assignments)? {
        for permission in granted {
            let Some(specs) = registry.get(permission) else {
                debug!(role = %role, permission = %permission, "No row-level specs, skipping");
                continue;
            };

            for spec in specs {
                let all_columns = columns
                    .get(&spec.table)
                    .ok_or_else(|| Error::TableNotInSchema(spec.table.clone()))?;
                let allowed = resolve_columns(&spec.columns, &spec.table, all_columns)?;

                for operation in spec.operation.operations() {
                    resolved.push(ResolvedRule {
                        role: role.clone(),
                        table: spec.table.clone(),
                        operation,
                        columns: allowed.clone(),
                        check: spec.check.clone(),
                    });
                }
            }
        }
    }

    debug!(rules = resolved.len(), roles = assignments.len(), "Expanded role grants");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PermissionSpec;
    use permsync_common::types::CheckValue;
    use proptest::prelude::*;

    fn columns() -> TableColumns {
        TableColumns::from([(
            TableRef::public("collections"),
            vec![
                "id".to_string(),
                "title".to_string(),
                "owner_profile_id".to_string(),
                "is_deleted".to_string(),
            ],
        )])
    }

    fn assignments(role: &str, permissions: &[&str]) -> RoleAssignments {
        RoleAssignments::from([(
            role.to_string(),
            permissions.iter().map(|p| (*p).to_string()).collect(),
        )])
    }

    #[test]
    fn test_operation_set_expands_per_operation() {
        let registry = PolicyRegistry::new().with_permission(
            "manage",
            vec![PermissionSpec::new(
                TableRef::public("collections"),
                vec![Operation::Insert, Operation::Update, Operation::Delete],
            )],
        );

        let rules = expand(&registry, &assignments("teacher", &["manage"]), &columns()).unwrap();

        let ops: Vec<_> = rules.iter().map(|r| r.operation).collect();
        assert_eq!(ops, vec![Operation::Insert, Operation::Update, Operation::Delete]);
        assert!(rules.iter().all(|r| r.columns.len() == 4));
    }

    #[test]
    fn test_governed_elsewhere_skipped() {
        let registry = PolicyRegistry::new().governed_elsewhere("view_dashboard");

        let rules = expand(
            &registry,
            &assignments("teacher", &["view_dashboard", "never_registered"]),
            &columns(),
        )
        .unwrap();

        assert!(rules.is_empty());
    }

    #[test]
    fn test_missing_table_aborts() {
        let registry = PolicyRegistry::new()
            .with_permission(
                "ok",
                vec![PermissionSpec::new(TableRef::public("collections"), Operation::Select)],
            )
            .with_permission(
                "broken",
                vec![PermissionSpec::new(TableRef::public("profiles"), Operation::Select)],
            );

        let err = expand(&registry, &assignments("teacher", &["ok", "broken"]), &columns())
            .unwrap_err();
        assert!(matches!(err, Error::TableNotInSchema(t) if t == TableRef::public("profiles")));
    }

    #[test]
    fn test_selectors() {
        let table = TableRef::public("collections");
        let schema = columns();
        let all = &schema[&table];

        let excluded = resolve_columns(&ColumnSelector::exclude(&["is_deleted"]), &table, all)
            .unwrap();
        assert_eq!(excluded, vec!["id", "title", "owner_profile_id"]);

        let explicit =
            resolve_columns(&ColumnSelector::explicit(&["title", "id"]), &table, all).unwrap();
        assert_eq!(explicit, vec!["title", "id"]);

        let unknown = resolve_columns(&ColumnSelector::explicit(&["nope"]), &table, all);
        assert!(matches!(unknown, Err(Error::UnknownColumn { .. })));
    }

    #[test]
    fn test_check_carried_through() {
        let check = CheckPredicate::unconditional()
            .with("owner_profile_id", CheckValue::session("x-user-id"));
        let registry = PolicyRegistry::new().with_permission(
            "own",
            vec![PermissionSpec::new(TableRef::public("collections"), Operation::Update)
                .with_check(check.clone())],
        );

        let rules = expand(&registry, &assignments("teacher", &["own", "own"]), &columns())
            .unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].check, Some(check));
    }

    fn two_editors() -> PolicyRegistry {
        let collections = TableRef::public("collections");
        PolicyRegistry::new()
            .with_permission(
                "edit_own",
                vec![PermissionSpec::new(collections.clone(), Operation::Update).with_check(
                    CheckPredicate::unconditional()
                        .with("owner_profile_id", CheckValue::session("x-user-id")),
                )],
            )
            .with_permission(
                "edit_titles",
                vec![PermissionSpec::new(collections, Operation::Update)
                    .with_columns(ColumnSelector::explicit(&["id", "title"]))],
            )
    }

    #[test]
    fn test_labels_normalizing_to_one_role_merge_into_one_rule() {
        let assignments = RoleAssignments::from([
            ("Teacher".to_string(), vec!["edit_own".to_string(), "edit_titles".to_string()]),
            ("teacher".to_string(), vec!["edit_own".to_string(), "edit_titles".to_string()]),
            ("Teacher Assistant".to_string(), vec!["edit_own".to_string()]),
            ("teacher_assistant".to_string(), vec!["edit_titles".to_string()]),
        ]);

        let rules = crate::compile(
            &two_editors(),
            &assignments,
            &columns(),
            crate::MergeOptions::default(),
        )
        .unwrap();

        let roles: Vec<&str> = rules.iter().map(|r| r.role.as_str()).collect();
        assert_eq!(roles, vec!["teacher", "teacher_assistant"]);
        assert!(rules.iter().all(|r| r.operation == Operation::Update));
    }

    #[test]
    fn test_unusable_role_label_rejected() {
        let err = expand(&two_editors(), &assignments("--", &["edit_own"]), &columns())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRole(label) if label == "--"));
    }

    #[test]
    fn test_repeated_grant_is_still_a_single_member_slot() {
        // Granting the same name twice does not make a slot multi-member,
        // so the default policy still drops it.
        let registry = PolicyRegistry::new().with_permission(
            "edit_own",
            vec![PermissionSpec::new(TableRef::public("collections"), Operation::Update)],
        );
        let twice = assignments("teacher", &["edit_own", "edit_own"]);

        let dropped =
            crate::compile(&registry, &twice, &columns(), crate::MergeOptions::default()).unwrap();
        assert!(dropped.is_empty());

        let emitted = crate::compile(
            &registry,
            &twice,
            &columns(),
            crate::MergeOptions {
                single_member: permsync_common::config::SingleMemberPolicy::Emit,
            },
        )
        .unwrap();
        assert_eq!(emitted.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_resolved_columns_subset_of_table(
            all in proptest::collection::vec("[a-z]{1,6}", 0..12),
            excluded in proptest::collection::vec("[a-z]{1,6}", 0..6),
        ) {
            let table = TableRef::public("t");
            let selector = ColumnSelector::Exclude(excluded.clone());
            let resolved = resolve_columns(&selector, &table, &all).unwrap();

            for column in &resolved {
                prop_assert!(all.contains(column));
                prop_assert!(!excluded.contains(column));
            }
        }

        #[test]
        fn prop_explicit_columns_never_escape_table(
            all in proptest::collection::vec("[a-z]{1,4}", 0..8),
            requested in proptest::collection::vec("[a-z]{1,4}", 0..8),
        ) {
            let table = TableRef::public("t");
            let selector = ColumnSelector::Explicit(requested);
            if let Ok(resolved) = resolve_columns(&selector, &table, &all) {
                for column in &resolved {
                    prop_assert!(all.contains(column));
                }
            }
        }
    }
}
