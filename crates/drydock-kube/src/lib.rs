//! Drydock Kube - cluster integration and version readiness
//!
//! This crate provides:
//! - Preflight orchestration: ready/pending decisions, rendering and bounded dispatch
//! - Registry settings resolution from the application store
//! - The kURL `Installer` custom resource and installer context building
//! - Storage backends (SQLite and in-memory mock)
//! - Configuration

pub mod config;
pub mod error;
pub mod installer;
pub mod preflight;
pub mod registry;
pub mod storage;

pub use config::PreflightConfig;
pub use error::{KubeError, RenderStage, Result};
pub use installer::{
    ClusterInstallerSource, Installer, InstallerContextBuilder, InstallerSource, InstallerSpec,
};
pub use preflight::{
    ArchiveLoader, DispatchHandle, EngineRenderer, ManifestLoader, PreflightDispatcher,
    PreflightExecutor, PreflightRenderer, PreflightRunner, PreflightRunnerBuilder, RunOutcome,
};
pub use registry::resolve_registry_settings;
pub use storage::{MockStore, RegistryStore, SqliteStore, StoreCall, StoreCounts, VersionStatusStore};
