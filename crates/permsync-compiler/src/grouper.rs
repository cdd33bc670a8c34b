//! Partition of resolved rules by merge slot

use std::collections::BTreeMap;

use permsync_common::types::{Operation, TableRef};

use crate::expander::ResolvedRule;

/// The backend permits at most one rule per role, table and operation.
///
/// Ordering is role, then schema and table, then operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub role: String,
    pub table: TableRef,
    pub operation: Operation,
}

impl SlotKey {
    pub fn of(rule: &ResolvedRule) -> Self {
        Self {
            role: rule.role.clone(),
            table: rule.table.clone(),
            operation: rule.operation,
        }
    }
}

/// Resolved rules sharing a slot, in slot order
pub type Buckets = BTreeMap<SlotKey, Vec<ResolvedRule>>;

pub fn group(rules: Vec<ResolvedRule>) -> Buckets {
    let mut buckets = Buckets::new();
    for rule in rules {
        buckets.entry(SlotKey::of(&rule)).or_default().push(rule);
    }
    buckets
}
