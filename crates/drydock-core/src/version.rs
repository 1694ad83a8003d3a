//! Downstream version identity and readiness status

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Identifies one rendered revision of an application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionKey {
    /// Application identifier
    pub app_id: String,

    /// Sequence number of the version within the application history
    pub sequence: i64,
}

impl VersionKey {
    pub fn new(app_id: impl Into<String>, sequence: i64) -> Self {
        Self {
            app_id: app_id.into(),
            sequence,
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.app_id, self.sequence)
    }
}

/// Status of a downstream version
///
/// Drydock itself only ever writes `PendingPreflights` and `Ready`; the other
/// states belong to the deployment and preflight-execution machinery.
///
/// Note: This enum is non-exhaustive - new variants may be added in future versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum VersionStatus {
    #[default]
    Unknown,
    PendingConfig,
    /// Waiting for preflight checks to run and report
    #[serde(rename = "pending_preflight")]
    PendingPreflights,
    /// Deployable. Persisted as `pending`: the version waits for a deployment.
    #[serde(rename = "pending")]
    Ready,
    Deployed,
    Failed,
}

impl VersionStatus {
    /// Persisted form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::PendingConfig => "pending_config",
            Self::PendingPreflights => "pending_preflight",
            Self::Ready => "pending",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
        }
    }

    /// Whether the version has left the pre-deployment pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "pending_config" => Ok(Self::PendingConfig),
            "pending_preflight" => Ok(Self::PendingPreflights),
            "pending" => Ok(Self::Ready),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}
