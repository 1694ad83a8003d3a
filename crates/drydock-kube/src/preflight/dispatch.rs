//! Background dispatch of preflight execution
//!
//! Every dispatch spawns one tokio task and returns immediately. An optional
//! semaphore bounds how many executions run at once; tasks beyond the bound
//! wait for a permit inside the task, so the caller never blocks on it.
//!
//! Execution failures are logged and returned through the [`DispatchHandle`].
//! Version status is never touched here: reporting check results is the
//! executor's job. Dropping a handle detaches its task.

use async_trait::async_trait;
use drydock_core::{Preflight, VersionKey};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{KubeError, Result};

/// Runs rendered preflight checks against the cluster
///
/// Implementations record their own results, including version status.
#[async_trait]
pub trait PreflightExecutor: Send + Sync {
    async fn execute(&self, key: &VersionKey, preflight: Preflight) -> Result<()>;
}

/// Spawns preflight executions onto the tokio runtime
#[derive(Clone)]
pub struct PreflightDispatcher {
    executor: Arc<dyn PreflightExecutor>,
    limit: Option<Arc<Semaphore>>,
    in_flight: Arc<AtomicUsize>,
}

impl PreflightDispatcher {
    /// Dispatcher without a concurrency bound
    pub fn new(executor: Arc<dyn PreflightExecutor>) -> Self {
        Self {
            executor,
            limit: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bound concurrent executions; `None` removes the bound
    pub fn with_max_concurrent(mut self, max: Option<usize>) -> Self {
        self.limit = max.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    /// Tasks dispatched and not yet finished, including those waiting for a permit
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Spawn execution of `preflight` for `key`
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, key: VersionKey, preflight: Preflight) -> DispatchHandle {
        let guard = InFlightGuard::new(self.in_flight.clone());
        let executor = self.executor.clone();
        let limit = self.limit.clone();
        let task_key = key.clone();

        debug!(app_id = %key.app_id, sequence = key.sequence, "dispatching preflight checks");

        let task = tokio::spawn(async move {
            let _guard = guard;
            let _permit = match limit {
                Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|e| {
                    KubeError::DispatchAborted {
                        key: task_key.clone(),
                        message: e.to_string(),
                    }
                })?),
                None => None,
            };

            run_checks(executor.as_ref(), task_key, preflight).await
        });

        DispatchHandle { key, task }
    }
}

async fn run_checks(
    executor: &dyn PreflightExecutor,
    key: VersionKey,
    preflight: Preflight,
) -> Result<()> {
    debug!(app_id = %key.app_id, sequence = key.sequence, "preflight checks beginning");

    match executor.execute(&key, preflight).await {
        Ok(()) => {
            debug!(app_id = %key.app_id, sequence = key.sequence, "preflight checks completed");
            Ok(())
        }
        Err(e) => {
            error!(app_id = %key.app_id, sequence = key.sequence, error = %e, "failed to run preflights");
            Err(KubeError::Execution {
                key,
                source: Box::new(e),
            })
        }
    }
}

/// Observable handle on one dispatched execution
#[derive(Debug)]
pub struct DispatchHandle {
    key: VersionKey,
    task: JoinHandle<Result<()>>,
}

impl DispatchHandle {
    pub fn key(&self) -> &VersionKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the execution and return its result
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(KubeError::DispatchAborted {
                key: self.key,
                message: e.to_string(),
            }),
        }
    }
}

/// Counts a task as in flight until dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
