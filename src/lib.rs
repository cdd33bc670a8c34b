//! Permsync: row-level permission compiler and synchronizer
//!
//! Compiles a static registry of named permissions into one access rule
//! per (role, table, operation) slot and pushes the result to an external
//! authorization backend.
//!
//! # Pipeline
//!
//! - **Role assignments** are fetched fresh from the role store
//! - **Schema** columns are resolved once per referenced table
//! - **Compilation** expands, groups and merges into deployable rules
//! - **Sync** applies the rules with bounded concurrency
//! - **Audit** writes the applied rule list to a fixed snapshot path

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use permsync_backend as backend;
pub use permsync_common as common;
pub use permsync_compiler as compiler;

use std::sync::Arc;
use tracing::{error, info, warn};

use permsync_backend::{
    AuditSnapshot, AuthorizationBackend, FileRoleStore, HttpBackend, RoleAssignmentStore,
    SchemaIntrospector, StaticSchema, SyncDriver, SyncReport,
};
use permsync_common::config::PermsyncConfig;
use permsync_common::error::Result;
use permsync_common::types::{MergedRule, SyncMode};
use permsync_compiler::{
    compile, lint_assignments, resolve_schema, AbsorptionFinding, MergeOptions, PolicyRegistry,
};

/// Compiled rules for one run, before anything is sent to the backend
#[derive(Debug, Clone)]
pub struct Plan {
    pub rules: Vec<MergedRule>,
    pub findings: Vec<AbsorptionFinding>,
}

/// Outcome of a successful sync run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rules: Vec<MergedRule>,
    pub report: SyncReport,
}

/// Fetch assignments, resolve schema and compile.
///
/// # Errors
/// Returns a configuration error if a referenced table or column is missing.
pub async fn build_plan(
    registry: &PolicyRegistry,
    roles: &dyn RoleAssignmentStore,
    schema: &dyn SchemaIntrospector,
    options: MergeOptions,
) -> Result<Plan> {
    let assignments = roles.fetch_assignments().await?;
    let columns = resolve_schema(registry, schema).await?;

    let rules = compile(registry, &assignments, &columns, options)?;
    let findings = lint_assignments(registry, &assignments)?;

    info!(
        roles = assignments.len(),
        tables = columns.len(),
        rules = rules.len(),
        "Compiled row-level rules"
    );

    Ok(Plan { rules, findings })
}

/// Load the registry and file sources named in the configuration, then plan
///
/// # Errors
/// Returns an error if a source file cannot be read or compilation fails.
pub async fn plan_from_config(config: &PermsyncConfig) -> Result<Plan> {
    let registry = PolicyRegistry::load(&config.sources.registry_path)?;
    let roles = FileRoleStore::new(&config.sources.roles_path);
    let schema = StaticSchema::load(&config.sources.schema_path).await?;

    build_plan(&registry, &roles, &schema, merge_options(config)).await
}

fn merge_options(config: &PermsyncConfig) -> MergeOptions {
    MergeOptions {
        single_member: config.sync.single_member,
    }
}

/// One batch run against the authorization backend
pub struct SyncJob {
    config: PermsyncConfig,
    registry: PolicyRegistry,
    roles: Arc<dyn RoleAssignmentStore>,
    schema: Arc<dyn SchemaIntrospector>,
    backend: Arc<dyn AuthorizationBackend>,
}

impl SyncJob {
    pub fn new(
        config: PermsyncConfig,
        registry: PolicyRegistry,
        roles: Arc<dyn RoleAssignmentStore>,
        schema: Arc<dyn SchemaIntrospector>,
        backend: Arc<dyn AuthorizationBackend>,
    ) -> Self {
        Self {
            config,
            registry,
            roles,
            schema,
            backend,
        }
    }

    /// Build a job wired to the HTTP backend and the configured files.
    ///
    /// # Errors
    /// Returns a configuration error, before any network call, if the
    /// backend endpoint or credential is missing.
    pub async fn from_config(config: PermsyncConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config.backend)?;
        config.sync.validate()?;

        let registry = PolicyRegistry::load(&config.sources.registry_path)?;
        let roles = FileRoleStore::new(&config.sources.roles_path);
        let schema = StaticSchema::load(&config.sources.schema_path).await?;

        Ok(Self::new(
            config,
            registry,
            Arc::new(roles),
            Arc::new(schema),
            Arc::new(backend),
        ))
    }

    /// Compile without touching the backend
    ///
    /// # Errors
    /// Returns an error if a source fails or compilation fails.
    pub async fn plan(&self) -> Result<Plan> {
        build_plan(
            &self.registry,
            self.roles.as_ref(),
            self.schema.as_ref(),
            merge_options(&self.config),
        )
        .await
    }

    /// Compile, apply every rule in `mode`, then write the audit snapshot.
    ///
    /// # Errors
    /// Configuration errors abort before any backend call. Otherwise the
    /// first failed rule is returned with its table, role and operation;
    /// rules already applied stay applied.
    pub async fn run(&self, mode: SyncMode) -> Result<RunSummary> {
        let plan = self.plan().await?;
        for finding in &plan.findings {
            warn!("Unconditional grant absorbs a restricted one: {}", finding);
        }

        let driver =
            SyncDriver::with_concurrency(self.backend.clone(), self.config.sync.concurrency);
        let report = driver.run(&plan.rules, mode).await;

        let audit = AuditSnapshot::new(&plan.rules, &report)
            .write(&self.config.sync.audit_path)
            .await;

        info!(
            mode = %mode,
            total = report.total,
            applied = report.applied,
            failed = report.failures.len(),
            not_dispatched = report.not_dispatched,
            "Sync finished"
        );

        // An apply failure outranks a failed audit write
        if let Err(e) = audit {
            if report.is_success() {
                return Err(e);
            }
            error!("Failed to write audit snapshot: {}", e);
        }

        let report = report.into_result()?;
        Ok(RunSummary {
            rules: plan.rules,
            report,
        })
    }
}
