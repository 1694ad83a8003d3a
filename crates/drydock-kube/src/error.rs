//! Error types for drydock-kube

use drydock_core::{VersionKey, VersionStatus};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for drydock-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Stage of the synchronous render phase that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Serializing the preflight document out of the bundle
    Marshal,
    /// Looking up the application's registry settings
    RegistrySettings,
    /// Running the template engine
    Template,
    /// Parsing the rendered bytes back into a preflight spec
    Parse,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Marshal => "failed to marshal preflight",
            Self::RegistrySettings => "failed to get registry settings for app",
            Self::Template => "failed to render preflight template",
            Self::Parse => "failed to parse rendered preflight",
        };
        f.write_str(stage)
    }
}

/// Errors that can occur while preparing or dispatching preflight checks
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Manifest bundle could not be loaded
    #[error("failed to load rendered manifests from {}", archive.display())]
    LoadManifests {
        archive: PathBuf,
        #[source]
        source: Box<KubeError>,
    },

    /// Version status could not be written
    #[error("failed to set downstream version {key} to {status}")]
    StatusWrite {
        key: VersionKey,
        status: VersionStatus,
        #[source]
        source: Box<KubeError>,
    },

    /// Preflight could not be rendered; the version stays pending preflight
    #[error("failed to render preflights: {stage}")]
    Render {
        stage: RenderStage,
        #[source]
        source: Box<KubeError>,
    },

    /// Preflight execution failed in the background
    #[error("failed to run preflight checks for {key}")]
    Execution {
        key: VersionKey,
        #[source]
        source: Box<KubeError>,
    },

    /// Background task ended without producing a result
    #[error("preflight task for {key} was aborted: {message}")]
    DispatchAborted { key: VersionKey, message: String },

    /// Installer custom resource could not be fetched
    #[error("failed to get installer '{name}' in namespace '{namespace}'")]
    InstallerFetch {
        name: String,
        namespace: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Registry row could not be read
    #[error("failed to read registry settings for app '{app_id}'")]
    RegistryLookup {
        app_id: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Application not found
    #[error("app '{app_id}' not found")]
    AppNotFound { app_id: String },

    /// Downstream version not found
    #[error("downstream version {key} not found")]
    VersionNotFound { key: VersionKey },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Manifest or preflight document error
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Template rendering error
    #[error("template error: {0}")]
    Template(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<drydock_core::CoreError> for KubeError {
    fn from(e: drydock_core::CoreError) -> Self {
        KubeError::Manifest(e.to_string())
    }
}

impl From<drydock_engine::EngineError> for KubeError {
    fn from(e: drydock_engine::EngineError) -> Self {
        KubeError::Template(e.to_string())
    }
}

impl KubeError {
    pub(crate) fn render(stage: RenderStage, source: KubeError) -> Self {
        KubeError::Render {
            stage,
            source: Box::new(source),
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            KubeError::InstallerFetch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Stage that failed, for render errors
    pub fn render_stage(&self) -> Option<RenderStage> {
        match self {
            KubeError::Render { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
