//! Check expression building

use serde_json::{json, Value};

use permsync_common::types::CheckPredicate;

/// Combine a rule's predicates into the backend `check` object.
///
/// - no predicates: no filter, only the column restriction applies
/// - any unconditional predicate: `{}`, since OR with "always" is "always"
/// - one predicate: the predicate itself
/// - several: `{"_or": [...]}` in canonical order, one branch per
///   distinct wire form
pub fn build_check(checks: &[CheckPredicate]) -> Option<Value> {
    match checks {
        [] => None,
        _ if checks.iter().any(CheckPredicate::is_unconditional) => Some(json!({})),
        [single] => Some(single.to_wire()),
        many => {
            let mut sorted: Vec<&CheckPredicate> = many.iter().collect();
            sorted.sort_by_key(|p| p.canonical_key());
            sorted.dedup_by_key(|p| p.canonical_key());

            if let [single] = sorted.as_slice() {
                return Some(single.to_wire());
            }

            let branches: Vec<Value> = sorted.iter().map(|p| p.to_wire()).collect();
            Some(json!({ "_or": branches }))
        }
    }
}
