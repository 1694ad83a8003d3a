//! SQLite application store

use async_trait::async_trait;
use chrono::Utc;
use drydock_core::{RegistryRow, VersionKey, VersionStatus};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{RegistryStore, VersionStatusStore};
use crate::error::{KubeError, Result};

/// Application database backed by SQLite
///
/// The async trait methods run their queries on the blocking thread pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    /// Open or create the database at a specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        debug!(path = %path.display(), "opened application store");

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Get default database path
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            KubeError::InvalidConfig("could not determine data directory".to_string())
        })?;
        Ok(data_dir.join("drydock").join("drydock.db"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
            .await
            .map_err(|e| KubeError::Storage(format!("application store task failed: {}", e)))?
    }

    fn init(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS app (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL,
                registry_hostname TEXT,
                registry_username TEXT,
                registry_password_enc TEXT,
                namespace TEXT
            );

            CREATE TABLE IF NOT EXISTS app_downstream_version (
                app_id TEXT NOT NULL REFERENCES app(id) ON DELETE CASCADE,
                sequence INTEGER NOT NULL,
                status TEXT NOT NULL,
                status_updated_at INTEGER,
                PRIMARY KEY (app_id, sequence)
            );
            "#,
        )?;

        Ok(())
    }

    /// Add or update an application and its registry columns
    pub fn upsert_app(&self, app_id: &str, slug: &str, registry: &RegistryRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO app (id, slug, registry_hostname, registry_username, registry_password_enc, namespace)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                slug = excluded.slug,
                registry_hostname = excluded.registry_hostname,
                registry_username = excluded.registry_username,
                registry_password_enc = excluded.registry_password_enc,
                namespace = excluded.namespace
            "#,
            params![
                app_id,
                slug,
                registry.hostname,
                registry.username,
                registry.password_enc,
                registry.namespace,
            ],
        )?;
        Ok(())
    }

    /// Record a new downstream version
    pub fn insert_version(&self, key: &VersionKey, status: VersionStatus) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_downstream_version (app_id, sequence, status, status_updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![key.app_id, key.sequence, status.as_str(), Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Current status of a version
    pub fn version_status(&self, key: &VersionKey) -> Result<VersionStatus> {
        let conn = self.lock()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM app_downstream_version WHERE app_id = ?1 AND sequence = ?2",
                params![key.app_id, key.sequence],
                |row| row.get(0),
            )
            .optional()?;

        let status = status.ok_or_else(|| KubeError::VersionNotFound { key: key.clone() })?;
        Ok(status.parse::<VersionStatus>()?)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| KubeError::Storage("application store lock poisoned".to_string()))
}

fn update_status(conn: &Connection, key: &VersionKey, status: VersionStatus) -> Result<()> {
    let updated = conn.execute(
        "UPDATE app_downstream_version SET status = ?1, status_updated_at = ?2 WHERE app_id = ?3 AND sequence = ?4",
        params![status.as_str(), Utc::now().timestamp(), key.app_id, key.sequence],
    )?;

    if updated == 0 {
        return Err(KubeError::VersionNotFound { key: key.clone() });
    }

    info!(app_id = %key.app_id, sequence = key.sequence, %status, "updated downstream version status");
    Ok(())
}

fn select_registry_row(conn: &Connection, app_id: &str) -> Result<RegistryRow> {
    let row = conn
        .query_row(
            "SELECT registry_hostname, registry_username, registry_password_enc, namespace FROM app WHERE id = ?1",
            params![app_id],
            |row| {
                Ok(RegistryRow {
                    hostname: row.get(0)?,
                    username: row.get(1)?,
                    password_enc: row.get(2)?,
                    namespace: row.get(3)?,
                })
            },
        )
        .optional()?;

    row.ok_or_else(|| KubeError::AppNotFound {
        app_id: app_id.to_string(),
    })
}

#[async_trait]
impl VersionStatusStore for SqliteStore {
    async fn set_pending_preflights(&self, key: &VersionKey) -> Result<()> {
        let key = key.clone();
        self.with_conn(move |conn| update_status(conn, &key, VersionStatus::PendingPreflights))
            .await
    }

    async fn set_ready(&self, key: &VersionKey) -> Result<()> {
        let key = key.clone();
        self.with_conn(move |conn| update_status(conn, &key, VersionStatus::Ready))
            .await
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn registry_row(&self, app_id: &str) -> Result<RegistryRow> {
        let app_id = app_id.to_string();
        self.with_conn(move |conn| select_registry_row(conn, &app_id))
            .await
    }
}
