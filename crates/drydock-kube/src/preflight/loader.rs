//! Manifest loading

use async_trait::async_trait;
use drydock_core::ManifestBundle;
use std::path::Path;

use crate::error::{KubeError, Result};

/// Loads the rendered manifests of a version
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load(&self, archive: &Path) -> Result<ManifestBundle>;
}

/// Reads a manifest directory or `.tar.gz` archive from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveLoader;

#[async_trait]
impl ManifestLoader for ArchiveLoader {
    async fn load(&self, archive: &Path) -> Result<ManifestBundle> {
        let path = archive.to_path_buf();
        let bundle = tokio::task::spawn_blocking(move || ManifestBundle::load_from_path(&path))
            .await
            .map_err(|e| KubeError::Manifest(format!("manifest loader stopped: {}", e)))??;
        Ok(bundle)
    }
}
