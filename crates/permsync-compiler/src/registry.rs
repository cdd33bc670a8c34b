//! Policy registry: permission names mapped to row-level permission specs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use permsync_common::error::{Error, Result};
use permsync_common::types::{CheckPredicate, Operation, TableRef};

/// One operation or a list of them, as written in registry files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationSet {
    One(Operation),
    Many(Vec<Operation>),
}

impl OperationSet {
    /// Ordered, deduplicated operations
    pub fn operations(&self) -> BTreeSet<Operation> {
        match self {
            OperationSet::One(op) => BTreeSet::from([*op]),
            OperationSet::Many(ops) => ops.iter().copied().collect(),
        }
    }
}

impl From<Operation> for OperationSet {
    fn from(op: Operation) -> Self {
        OperationSet::One(op)
    }
}

impl From<Vec<Operation>> for OperationSet {
    fn from(ops: Vec<Operation>) -> Self {
        OperationSet::Many(ops)
    }
}

/// Which columns of the table a spec grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "columns", rename_all = "lowercase")]
pub enum ColumnSelector {
    /// Every column of the table
    #[default]
    All,
    /// Exactly these columns
    Explicit(Vec<String>),
    /// Every column except these
    Exclude(Vec<String>),
}

impl ColumnSelector {
    pub fn explicit(columns: &[&str]) -> Self {
        ColumnSelector::Explicit(columns.iter().map(|c| (*c).to_string()).collect())
    }

    pub fn exclude(columns: &[&str]) -> Self {
        ColumnSelector::Exclude(columns.iter().map(|c| (*c).to_string()).collect())
    }
}

/// Declarative grant on one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub table: TableRef,
    pub operation: OperationSet,
    /// Row condition; absent means every row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckPredicate>,
    #[serde(default)]
    pub columns: ColumnSelector,
}

impl PermissionSpec {
    pub fn new(table: TableRef, operation: impl Into<OperationSet>) -> Self {
        Self {
            table,
            operation: operation.into(),
            check: None,
            columns: ColumnSelector::All,
        }
    }

    pub fn with_check(mut self, check: CheckPredicate) -> Self {
        self.check = Some(check);
        self
    }

    pub fn with_columns(mut self, columns: ColumnSelector) -> Self {
        self.columns = columns;
        self
    }

    /// True when the spec admits every row
    pub fn is_unconditional(&self) -> bool {
        self.check.as_ref().map_or(true, CheckPredicate::is_unconditional)
    }
}

/// Immutable permission name to spec table.
///
/// A `None` entry means the permission is enforced somewhere other than
/// row-level rules; it is skipped, same as a name with no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyRegistry {
    permissions: BTreeMap<String, Option<Vec<PermissionSpec>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permission backed by row-level specs
    pub fn with_permission(mut self, name: &str, specs: Vec<PermissionSpec>) -> Self {
        self.permissions.insert(name.to_string(), Some(specs));
        self
    }

    /// Register a permission enforced outside row-level rules
    pub fn governed_elsewhere(mut self, name: &str) -> Self {
        self.permissions.insert(name.to_string(), None);
        self
    }

    /// Specs for a permission; `None` for missing or null entries
    pub fn get(&self, name: &str) -> Option<&[PermissionSpec]> {
        self.permissions.get(name).and_then(|specs| specs.as_deref())
    }

    /// Permissions with row-level specs, in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PermissionSpec])> {
        self.permissions
            .iter()
            .filter_map(|(name, specs)| specs.as_deref().map(|s| (name.as_str(), s)))
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(content)
            .map_err(|e| Error::InvalidRegistry(e.to_string()))?;
        registry.validate()?;
        Ok(registry)
    }

    /// TOML has no null: an empty list marks a permission governed elsewhere
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let registry: Self =
            toml::from_str(content).map_err(|e| Error::InvalidRegistry(e.to_string()))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load from a `.toml` or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            _ => Self::from_json_str(&content)?,
        };
        debug!(
            permissions = registry.len(),
            path = %path.display(),
            "Loaded policy registry"
        );
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        for (name, specs) in self.iter() {
            for spec in specs {
                if spec.operation.operations().is_empty() {
                    return Err(Error::InvalidRegistry(format!(
                        "permission '{}' has a spec on {} with no operations",
                        name, spec.table
                    )));
                }
            }
        }
        Ok(())
    }
}
