//! Persistence for application registry settings and version status
//!
//! Drydock supports two backends:
//! - **SQLite**: the application database (WAL mode)
//! - **Mock**: in-memory, with call recording and failure injection for tests

mod mock;
mod sqlite;

pub use mock::{MockStore, StoreCall, StoreCounts};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use drydock_core::{RegistryRow, VersionKey};

use crate::error::Result;

/// Write-only access to downstream version status
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait VersionStatusStore: Send + Sync {
    /// Mark a version as waiting for preflight checks
    async fn set_pending_preflights(&self, key: &VersionKey) -> Result<()>;

    /// Mark a version as deployable
    async fn set_ready(&self, key: &VersionKey) -> Result<()>;
}

/// Read access to the registry columns of an application
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Raw registry row for `app_id`; a missing application is an error
    async fn registry_row(&self, app_id: &str) -> Result<RegistryRow>;
}
