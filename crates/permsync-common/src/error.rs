//! Error types for the permission synchronizer

use thiserror::Error;

use crate::types::{Operation, TableRef};

/// Permsync error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Authorization backend endpoint is not configured")]
    MissingEndpoint,

    #[error("Authorization backend admin credential is not configured")]
    MissingCredential,

    #[error("Table not found in schema: {0}")]
    TableNotInSchema(TableRef),

    #[error("Column {column} not found on table {table}")]
    UnknownColumn { table: TableRef, column: String },

    #[error("Role label {0:?} has no usable characters")]
    InvalidRole(String),

    #[error("Invalid policy registry: {0}")]
    InvalidRegistry(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Apply Errors
    #[error("Failed to apply rule on {table} for role {role} ({operation}): {reason}")]
    Apply {
        table: TableRef,
        role: String,
        operation: Operation,
        reason: String,
    },

    // Collaborator Errors
    #[error("Authorization backend error: {0}")]
    Backend(String),

    #[error("Source error: {0}")]
    Source(String),

    // General Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for permsync operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors raised before any backend mutation
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingEndpoint
                | Self::MissingCredential
                | Self::TableNotInSchema(_)
                | Self::UnknownColumn { .. }
                | Self::InvalidRole(_)
                | Self::InvalidRegistry(_)
                | Self::ConfigError(_)
                | Self::TomlError(_)
        )
    }

    /// Errors that may leave the backend partially applied
    pub fn is_apply(&self) -> bool {
        matches!(self, Self::Apply { .. })
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        if self.is_configuration() {
            2
        } else if self.is_apply() {
            3
        } else {
            1
        }
    }

    /// Stable identifier for log output
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingEndpoint => "missing_endpoint",
            Self::MissingCredential => "missing_credential",
            Self::TableNotInSchema(_) => "table_not_in_schema",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::InvalidRole(_) => "invalid_role",
            Self::InvalidRegistry(_) => "invalid_registry",
            Self::ConfigError(_) => "config_error",
            Self::Apply { .. } => "apply_failed",
            Self::Backend(_) => "backend_error",
            Self::Source(_) => "source_error",
            Self::IoError(_) => "io_error",
            Self::JsonError(_) => "json_error",
            Self::TomlError(_) => "toml_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::MissingEndpoint.exit_code(), 2);
        assert_eq!(
            Error::TableNotInSchema(TableRef::public("collections")).exit_code(),
            2
        );
        assert_eq!(
            Error::Apply {
                table: TableRef::public("collections"),
                role: "teacher".to_string(),
                operation: Operation::Insert,
                reason: "HTTP 500".to_string(),
            }
            .exit_code(),
            3
        );
        assert_eq!(Error::InvalidRole("--".to_string()).exit_code(), 2);
        assert_eq!(Error::Source("unreachable".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_apply_error_carries_context() {
        let err = Error::Apply {
            table: TableRef::public("collections"),
            role: "teacher".to_string(),
            operation: Operation::Update,
            reason: "HTTP 400".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("public.collections"));
        assert!(message.contains("teacher"));
        assert!(message.contains("update"));
        assert_eq!(err.error_code(), "apply_failed");
    }
}
