//! Mock store for testing
//!
//! Keeps statuses and registry rows in memory and records every call in
//! order, so tests can assert both how often and in which order the store
//! was used.

use async_trait::async_trait;
use drydock_core::{RegistryRow, VersionKey, VersionStatus};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{RegistryStore, VersionStatusStore};
use crate::error::{KubeError, Result};

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    SetPendingPreflights(VersionKey),
    SetReady(VersionKey),
    RegistryRow(String),
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreCounts {
    pub pending_preflights: usize,
    pub ready: usize,
    pub registry_reads: usize,
}

#[derive(Debug, Default)]
struct State {
    statuses: HashMap<VersionKey, VersionStatus>,
    registries: HashMap<String, RegistryRow>,
    calls: Vec<StoreCall>,
    counts: StoreCounts,
    fail_status_writes: bool,
    fail_registry_reads: bool,
}

/// In-memory store for testing
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<RwLock<State>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application with its registry columns
    pub fn with_app(self, app_id: &str, registry: RegistryRow) -> Self {
        self.write().registries.insert(app_id.to_string(), registry);
        self
    }

    /// Make every status write fail
    pub fn fail_status_writes(&self, fail: bool) {
        self.write().fail_status_writes = fail;
    }

    /// Make every registry read fail
    pub fn fail_registry_reads(&self, fail: bool) {
        self.write().fail_registry_reads = fail;
    }

    /// Last status written for a version
    pub fn status(&self, key: &VersionKey) -> Option<VersionStatus> {
        self.read().statuses.get(key).copied()
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> Vec<StoreCall> {
        self.read().calls.clone()
    }

    /// Get operation counts for assertions
    pub fn counts(&self) -> StoreCounts {
        self.read().counts.clone()
    }

    /// Reset counts and the call log
    pub fn reset(&self) {
        let mut state = self.write();
        state.calls.clear();
        state.counts = StoreCounts::default();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, key: &VersionKey, status: VersionStatus) -> Result<()> {
        let mut state = self.write();
        match status {
            VersionStatus::PendingPreflights => {
                state.counts.pending_preflights += 1;
                state.calls.push(StoreCall::SetPendingPreflights(key.clone()));
            }
            _ => {
                state.counts.ready += 1;
                state.calls.push(StoreCall::SetReady(key.clone()));
            }
        }

        if state.fail_status_writes {
            return Err(KubeError::Storage("status write failed".to_string()));
        }

        state.statuses.insert(key.clone(), status);
        Ok(())
    }
}

#[async_trait]
impl VersionStatusStore for MockStore {
    async fn set_pending_preflights(&self, key: &VersionKey) -> Result<()> {
        self.set_status(key, VersionStatus::PendingPreflights)
    }

    async fn set_ready(&self, key: &VersionKey) -> Result<()> {
        self.set_status(key, VersionStatus::Ready)
    }
}

#[async_trait]
impl RegistryStore for MockStore {
    async fn registry_row(&self, app_id: &str) -> Result<RegistryRow> {
        let mut state = self.write();
        state.counts.registry_reads += 1;
        state.calls.push(StoreCall::RegistryRow(app_id.to_string()));

        if state.fail_registry_reads {
            return Err(KubeError::Storage("registry read failed".to_string()));
        }

        state
            .registries
            .get(app_id)
            .cloned()
            .ok_or_else(|| KubeError::AppNotFound {
                app_id: app_id.to_string(),
            })
    }
}
