//! Merge engine: one deployable rule per slot
//!
//! Members of a slot are combined by set union. Columns are the union of
//! every member's columns; checks are the distinct member predicates, which
//! the backend combines with OR. A member without a predicate contributes
//! the unconditional marker, so it makes the whole merged rule unconditional.
//!
//! This is deliberately permissive: two capabilities on the same table and
//! operation grant access when either condition holds, on the union of
//! their columns. That can exceed what any single capability intended; see
//! [`crate::lint`] for flagging such slots at authoring time.

use std::collections::BTreeSet;
use tracing::debug;

use permsync_common::config::SingleMemberPolicy;
use permsync_common::types::{CheckPredicate, MergedRule};

use crate::expander::ResolvedRule;
use crate::grouper::{Buckets, SlotKey};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub single_member: SingleMemberPolicy,
}

/// Merge the members of one slot. The result does not depend on member order.
pub fn merge_bucket(key: &SlotKey, members: &[ResolvedRule]) -> MergedRule {
    let columns: BTreeSet<&String> = members.iter().flat_map(|m| m.columns.iter()).collect();

    // Predicates with the same wire form collapse to one; the full
    // serialization breaks ties.
    let mut checks: Vec<CheckPredicate> = members
        .iter()
        .map(|m| m.check.clone().unwrap_or_else(CheckPredicate::unconditional))
        .collect();
    checks.sort_by_cached_key(|c| {
        (c.canonical_key(), serde_json::to_string(c).unwrap_or_default())
    });
    checks.dedup_by_key(|c| c.canonical_key());

    MergedRule {
        role: key.role.clone(),
        table: key.table.clone(),
        operation: key.operation,
        columns: columns.into_iter().cloned().collect(),
        checks,
    }
}

/// Reduce every bucket to at most one merged rule, in slot order.
///
/// With [`SingleMemberPolicy::Drop`] a slot governed by exactly one spec
/// produces nothing.
pub fn merge_all(buckets: &Buckets, options: MergeOptions) -> Vec<MergedRule> {
    let mut merged = Vec::new();
    let mut dropped = 0usize;

    for (key, members) in buckets {
        match (members.len(), options.single_member) {
            (0, _) => {}
            (1, SingleMemberPolicy::Drop) => dropped += 1,
            _ => merged.push(merge_bucket(key, members)),
        }
    }

    debug!(
        slots = buckets.len(),
        merged = merged.len(),
        dropped_single = dropped,
        "Merged conflicting rules"
    );
    merged
}
