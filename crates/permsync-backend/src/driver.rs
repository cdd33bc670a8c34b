//! Bounded-concurrency sync driver
//!
//! A fixed pool of workers pulls rule commands from a shared queue, so at
//! most `concurrency` backend calls are in flight at once. The first failure
//! stops workers from taking more work; calls already dispatched run to
//! completion and are not rolled back.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use permsync_common::config::DEFAULT_CONCURRENCY;
use permsync_common::error::{Error, Result};
use permsync_common::types::{MergedRule, Operation, SyncMode, TableRef};

use crate::client::{AuthorizationBackend, RuleCommand};

/// A rule the backend rejected or could not be reached for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub table: TableRef,
    pub role: String,
    pub operation: Operation,
    pub reason: String,
}

impl From<ApplyFailure> for Error {
    fn from(failure: ApplyFailure) -> Self {
        Error::Apply {
            table: failure.table,
            role: failure.role,
            operation: failure.operation,
            reason: failure.reason,
        }
    }
}

/// Outcome of one driver pass
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Rules handed to the driver
    pub total: usize,
    /// Calls the backend accepted
    pub applied: usize,
    /// Calls that failed, in completion order
    pub failures: Vec<ApplyFailure>,
    /// Rules never dispatched because an earlier call failed
    pub not_dispatched: usize,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Surface the first failure with its table, role and operation
    pub fn into_result(self) -> Result<Self> {
        match self.failures.first() {
            Some(first) => Err(first.clone().into()),
            None => Ok(self),
        }
    }
}

struct Job {
    role: String,
    command: RuleCommand,
}

/// Pushes merged rules to the authorization backend
pub struct SyncDriver {
    backend: Arc<dyn AuthorizationBackend>,
    concurrency: usize,
}

impl SyncDriver {
    /// Create a driver with the default cap of 20 in-flight calls
    pub fn new(backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self::with_concurrency(backend, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(backend: Arc<dyn AuthorizationBackend>, concurrency: usize) -> Self {
        Self {
            backend,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Issue one create or drop call per rule and wait for all workers.
    pub async fn run(&self, rules: &[MergedRule], mode: SyncMode) -> SyncReport {
        let queue: VecDeque<Job> = rules
            .iter()
            .map(|rule| Job {
                role: rule.role.clone(),
                command: RuleCommand::from_rule(rule, mode),
            })
            .collect();
        let total = queue.len();

        let queue = Arc::new(Mutex::new(queue));
        let abort = Arc::new(AtomicBool::new(false));
        let applied = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let workers = self.concurrency.min(total);
        info!(total, workers, mode = %mode, "Dispatching rule commands");

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker(
                    worker_id,
                    self.backend.clone(),
                    queue.clone(),
                    abort.clone(),
                    applied.clone(),
                    failures.clone(),
                ))
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Sync worker panicked: {}", e);
                abort.store(true, Ordering::SeqCst);
            }
        }

        let not_dispatched = queue.lock().len();
        let failures = std::mem::take(&mut *failures.lock());

        SyncReport {
            mode,
            total,
            applied: applied.load(Ordering::SeqCst),
            failures,
            not_dispatched,
        }
    }
}

async fn worker(
    worker_id: usize,
    backend: Arc<dyn AuthorizationBackend>,
    queue: Arc<Mutex<VecDeque<Job>>>,
    abort: Arc<AtomicBool>,
    applied: Arc<AtomicUsize>,
    failures: Arc<Mutex<Vec<ApplyFailure>>>,
) {
    loop {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let Some(job) = queue.lock().pop_front() else {
            break;
        };

        let command = &job.command;
        match backend.apply(command).await {
            Ok(()) => {
                applied.fetch_add(1, Ordering::SeqCst);
                debug!(
                    worker_id,
                    table = %command.table,
                    role = %command.role,
                    operation = %command.operation,
                    "Rule applied"
                );
            }
            Err(e) => {
                abort.store(true, Ordering::SeqCst);
                error!(
                    worker_id,
                    table = %command.table,
                    role = %job.role,
                    operation = %command.operation,
                    code = e.error_code(),
                    "Rule failed: {}",
                    e
                );
                failures.lock().push(ApplyFailure {
                    table: command.table.clone(),
                    role: job.role.clone(),
                    operation: command.operation,
                    reason: e.to_string(),
                });
            }
        }
    }
}
