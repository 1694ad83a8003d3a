//! Private registry settings attached to an application

use serde::{Deserialize, Serialize};

/// Registry settings for an application that has a private registry configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySettings {
    pub hostname: String,
    pub username: String,

    /// Encrypted password, passed through untouched
    pub password_enc: String,

    pub namespace: String,
}

/// Raw registry columns stored for an application, each nullable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRow {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password_enc: Option<String>,
    pub namespace: Option<String>,
}

impl RegistrySettings {
    /// Build settings from a stored row
    ///
    /// Returns `None` when the hostname column is null. Once a hostname is
    /// present, the remaining columns read as empty strings when null; partial
    /// credentials are passed through as-is.
    pub fn from_row(row: RegistryRow) -> Option<Self> {
        let hostname = row.hostname?;
        Some(Self {
            hostname,
            username: row.username.unwrap_or_default(),
            password_enc: row.password_enc.unwrap_or_default(),
            namespace: row.namespace.unwrap_or_default(),
        })
    }

    /// `hostname/namespace`, or the bare hostname when no namespace is set
    pub fn address(&self) -> String {
        if self.namespace.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}/{}", self.hostname, self.namespace)
        }
    }

    /// Rewrite an image reference to be pulled through this registry
    ///
    /// Only the final path segment (name plus tag or digest) is kept.
    pub fn image_name(&self, image: &str) -> String {
        let name = image.rsplit('/').next().unwrap_or(image);
        format!("{}/{}", self.address(), name)
    }
}
