//! Audit snapshot of the rules a run pushed
//!
//! The snapshot lives at a fixed path and is fully overwritten every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use permsync_common::error::Result;
use permsync_common::types::{MergedRule, SyncMode};

use crate::driver::{ApplyFailure, SyncReport};

/// Structured record of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub generated_at: DateTime<Utc>,
    pub mode: SyncMode,
    pub total: usize,
    pub applied: usize,
    pub failures: Vec<ApplyFailure>,
    pub rules: Vec<MergedRule>,
}

impl AuditSnapshot {
    pub fn new(rules: &[MergedRule], report: &SyncReport) -> Self {
        Self {
            generated_at: Utc::now(),
            mode: report.mode,
            total: report.total,
            applied: report.applied,
            failures: report.failures.clone(),
            rules: rules.to_vec(),
        }
    }

    /// Replace the snapshot at `path`
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;

        let mut tmp = PathBuf::from(path);
        tmp.as_mut_os_string().push(".tmp");

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), rules = self.rules.len(), "Wrote audit snapshot");
        Ok(())
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsync_common::types::{Operation, TableRef};

    fn report(mode: SyncMode, applied: usize) -> SyncReport {
        SyncReport {
            mode,
            total: applied,
            applied,
            failures: vec![],
            not_dispatched: 0,
        }
    }

    fn rule(table: &str) -> MergedRule {
        MergedRule {
            role: "teacher".to_string(),
            table: TableRef::public(table),
            operation: Operation::Delete,
            columns: vec!["id".to_string()],
            checks: vec![],
        }
    }

    #[tokio::test]
    async fn test_snapshot_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");

        let first = vec![rule("collections"), rule("profiles")];
        AuditSnapshot::new(&first, &report(SyncMode::Create, 2))
            .write(&path)
            .await
            .unwrap();

        let second = vec![rule("lessons")];
        AuditSnapshot::new(&second, &report(SyncMode::Drop, 1))
            .write(&path)
            .await
            .unwrap();

        let snapshot = AuditSnapshot::read(&path).await.unwrap();
        assert_eq!(snapshot.mode, SyncMode::Drop);
        assert_eq!(snapshot.rules, second);
        assert!(!dir.path().join("audit.json.tmp").exists());
    }
}
