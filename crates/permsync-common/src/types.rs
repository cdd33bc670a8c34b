//! Core data model shared by the compiler and the sync driver

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

// ============================================================================
// Tables and Operations
// ============================================================================

/// Identifies a target table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
        }
    }

    /// Table in the `public` schema
    pub fn public(name: &str) -> Self {
        Self::new("public", name)
    }

    /// Parse `schema.table`; a bare name lands in `public`
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::public(qualified),
        }
    }

    /// Get the qualified table name
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Row-level operation a rule governs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Select,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Select => "select",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run creates or drops the compiled rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Create,
    Drop,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Create => "create",
            SyncMode::Drop => "drop",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Check Predicates
// ============================================================================

/// Right-hand side of a predicate column
///
/// Session tokens are opaque: they are resolved by the authorization
/// backend at query time and only passed through here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckValue {
    Session { session: String },
    Literal(serde_json::Value),
}

impl CheckValue {
    pub fn session(token: &str) -> Self {
        CheckValue::Session {
            session: token.to_string(),
        }
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        CheckValue::Literal(value.into())
    }

    /// Value as sent to the authorization backend
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            CheckValue::Session { session } => serde_json::Value::String(session.clone()),
            CheckValue::Literal(value) => value.clone(),
        }
    }
}

/// Column name to value mapping; every pair must hold for a row to pass.
///
/// The empty predicate is the unconditional marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckPredicate(BTreeMap<String, CheckValue>);

impl CheckPredicate {
    /// Predicate every row satisfies
    pub fn unconditional() -> Self {
        Self::default()
    }

    /// Add a column condition
    pub fn with(mut self, column: &str, value: CheckValue) -> Self {
        self.0.insert(column.to_string(), value);
        self
    }

    pub fn is_unconditional(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, column: &str) -> Option<&CheckValue> {
        self.0.get(column)
    }

    /// Stable serialization used for dedup and ordering.
    ///
    /// Built from the wire form, so two predicates share a key exactly when
    /// the backend would receive the same object. A session token and a
    /// literal string with the same text collapse here.
    pub fn canonical_key(&self) -> String {
        self.to_wire().to_string()
    }

    /// Predicate object as sent to the authorization backend
    pub fn to_wire(&self) -> serde_json::Value {
        let map = self
            .0
            .iter()
            .map(|(column, value)| (column.clone(), value.to_wire()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, CheckValue)> for CheckPredicate {
    fn from_iter<I: IntoIterator<Item = (String, CheckValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Compiled Rules
// ============================================================================

/// Canonical backend identifier for a role label.
///
/// Lowercases ASCII alphanumerics and joins every other run of characters
/// into a single `_`: `"Teacher Assistant"` becomes `"teacher_assistant"`.
///
/// # Errors
/// Returns [`Error::InvalidRole`] if the label has no ASCII alphanumerics.
pub fn normalize_role(label: &str) -> Result<String> {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;

    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if out.is_empty() {
        return Err(Error::InvalidRole(label.to_string()));
    }
    Ok(out)
}

/// Role label to granted permission names, as held by the role store
pub type RoleAssignments = BTreeMap<String, Vec<String>>;

/// Full column list per table, as reported by schema introspection
pub type TableColumns = BTreeMap<TableRef, Vec<String>>;

/// Final deployable rule: at most one exists per role, table and operation.
///
/// `role` is already normalized with [`normalize_role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRule {
    pub role: String,
    pub table: TableRef,
    pub operation: Operation,
    /// Sorted, deduplicated
    pub columns: Vec<String>,
    /// Structurally distinct predicates, combined with OR by the backend
    pub checks: Vec<CheckPredicate>,
}

impl MergedRule {
    /// True when any member check admits every row.
    ///
    /// OR with an unconditional predicate is unconditional, so a single
    /// unrestricted member opens the whole slot.
    pub fn is_unconditional(&self) -> bool {
        self.checks.iter().any(CheckPredicate::is_unconditional)
    }
}
