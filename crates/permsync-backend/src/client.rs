//! Authorization backend admin API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use permsync_common::config::BackendConfig;
use permsync_common::error::{Error, Result};
use permsync_common::types::{MergedRule, Operation, SyncMode, TableRef};

use crate::check::build_check;

/// One create/drop call, in the backend's wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCommand {
    pub action: SyncMode,
    pub operation: Operation,
    pub table: TableRef,
    pub role: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<serde_json::Value>,
}

impl RuleCommand {
    /// Build the command for a merged rule
    pub fn from_rule(rule: &MergedRule, action: SyncMode) -> Self {
        Self {
            action,
            operation: rule.operation,
            table: rule.table.clone(),
            role: rule.role.clone(),
            columns: rule.columns.clone(),
            check: build_check(&rule.checks),
        }
    }
}

/// Write-only admin interface of the authorization backend.
///
/// Calls are keyed by table, role and operation; applying the same command
/// twice must leave the backend in the same state.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    /// Apply one rule command
    async fn apply(&self, command: &RuleCommand) -> Result<()>;
}

/// HTTP admin API client
pub struct HttpBackend {
    endpoint: String,
    secret_header: String,
    secret: String,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a client from validated backend configuration
    ///
    /// # Errors
    /// Returns a configuration error if the endpoint or credential is missing.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let (endpoint, secret) = config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            secret_header: config.admin_secret_header.clone(),
            secret: secret.to_string(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AuthorizationBackend for HttpBackend {
    async fn apply(&self, command: &RuleCommand) -> Result<()> {
        debug!(
            table = %command.table,
            role = %command.role,
            operation = %command.operation,
            action = %command.action,
            "Sending rule command"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(self.secret_header.as_str(), self.secret.as_str())
            .json(command)
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("HTTP {status}: {body}")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsync_common::types::{CheckPredicate, CheckValue};

    fn sample_rule() -> MergedRule {
        MergedRule {
            role: "teacher".to_string(),
            table: TableRef::public("collections"),
            operation: Operation::Update,
            columns: vec!["id".to_string(), "title".to_string()],
            checks: vec![
                CheckPredicate::unconditional().with("owner", CheckValue::session("x-user-id"))
            ],
        }
    }

    #[test]
    fn test_command_wire_shape() {
        let command = RuleCommand::from_rule(&sample_rule(), SyncMode::Create);
        let wire = serde_json::to_value(&command).unwrap();

        assert_eq!(
            wire,
            serde_json::json!({
                "action": "create",
                "operation": "update",
                "table": {"schema": "public", "name": "collections"},
                "role": "teacher",
                "columns": ["id", "title"],
                "check": {"owner": "x-user-id"}
            })
        );
    }

    #[test]
    fn test_command_without_check_omits_field() {
        let mut rule = sample_rule();
        rule.checks.clear();

        let command = RuleCommand::from_rule(&rule, SyncMode::Drop);
        let wire = serde_json::to_value(&command).unwrap();

        assert_eq!(wire["action"], "drop");
        assert!(wire.get("check").is_none());
    }

    #[test]
    fn test_http_backend_requires_configuration() {
        let config = BackendConfig::default();
        assert!(matches!(
            HttpBackend::new(&config),
            Err(Error::MissingEndpoint)
        ));

        let config = BackendConfig {
            endpoint: Some("http://localhost:8080/v1/metadata".to_string()),
            admin_secret: Some("secret".to_string()),
            ..BackendConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/metadata");
    }
}
