//! Authoring-time lint for OR-absorption
//!
//! Flags slots where an unconditional spec and a restricted spec would be
//! merged. The merged rule is then unconditional and the restriction has
//! no effect.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use permsync_common::error::Result;
use permsync_common::types::{Operation, RoleAssignments, TableRef};

use crate::expander::role_grants;
use crate::registry::PolicyRegistry;

/// A (table, operation) slot whose restriction would be absorbed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsorptionFinding {
    /// Role the merge happens for; `None` for registry-wide findings
    pub role: Option<String>,
    pub table: TableRef,
    pub operation: Operation,
    /// Permissions granting the slot without a check
    pub unconditional: Vec<String>,
    /// Permissions granting the slot under a check
    pub restricted: Vec<String>,
}

impl fmt::Display for AbsorptionFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(role) = &self.role {
            write!(f, "role {role}: ")?;
        }
        write!(
            f,
            "{} {} is unconditional via [{}], absorbing checks from [{}]",
            self.operation,
            self.table,
            self.unconditional.join(", "),
            self.restricted.join(", ")
        )
    }
}

#[derive(Default)]
struct SlotUsage<'a> {
    unconditional: BTreeSet<&'a str>,
    restricted: BTreeSet<&'a str>,
}

fn scan<'a>(
    registry: &'a PolicyRegistry,
    permissions: impl IntoIterator<Item = &'a str>,
    role: Option<&str>,
) -> Vec<AbsorptionFinding> {
    let mut slots: BTreeMap<(&TableRef, Operation), SlotUsage<'a>> = BTreeMap::new();

    for name in permissions {
        let Some(specs) = registry.get(name) else {
            continue;
        };
        for spec in specs {
            for operation in spec.operation.operations() {
                let usage = slots.entry((&spec.table, operation)).or_default();
                if spec.is_unconditional() {
                    usage.unconditional.insert(name);
                } else {
                    usage.restricted.insert(name);
                }
            }
        }
    }

    slots
        .into_iter()
        .filter(|(_, usage)| !usage.unconditional.is_empty() && !usage.restricted.is_empty())
        .map(|((table, operation), usage)| AbsorptionFinding {
            role: role.map(str::to_string),
            table: table.clone(),
            operation,
            unconditional: usage.unconditional.into_iter().map(str::to_string).collect(),
            restricted: usage.restricted.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

/// Slots where some registry spec is unconditional and another is
/// restricted, regardless of which roles hold them
pub fn lint_registry(registry: &PolicyRegistry) -> Vec<AbsorptionFinding> {
    scan(registry, registry.iter().map(|(name, _)| name), None)
}

/// Slots where absorption actually happens for a role's grants.
///
/// Roles are reported by their normalized backend name.
///
/// # Errors
/// Returns [`permsync_common::Error::InvalidRole`] for an unusable label.
pub fn lint_assignments(
    registry: &PolicyRegistry,
    assignments: &RoleAssignments,
) -> Result<Vec<AbsorptionFinding>> {
    Ok(role_grants(assignments)?
        .into_iter()
        .flat_map(|(role, granted)| scan(registry, granted, Some(role.as_str())))
        .collect())
}
