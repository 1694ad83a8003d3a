//! Rendered preflight specifications

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Kind of a preflight document
pub const PREFLIGHT_KIND: &str = "Preflight";

/// API versions a preflight document may declare
pub const PREFLIGHT_API_VERSIONS: &[&str] =
    &["troubleshoot.replicated.com/v1beta1", "troubleshoot.sh/v1beta2"];

/// A rendered preflight spec
///
/// Collectors and analyzers are opaque to Drydock and kept as raw YAML for the
/// executor to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preflight {
    pub api_version: String,
    pub kind: String,

    #[serde(default)]
    pub metadata: PreflightMetadata,

    #[serde(default)]
    pub spec: PreflightSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightMetadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightSpec {
    #[serde(default)]
    pub collectors: Vec<serde_yaml::Value>,

    #[serde(default)]
    pub analyzers: Vec<serde_yaml::Value>,
}

impl Preflight {
    /// Parse rendered preflight contents
    pub fn from_slice(contents: &[u8]) -> Result<Self> {
        let preflight: Preflight =
            serde_yaml::from_slice(contents).map_err(|e| CoreError::InvalidPreflight {
                message: e.to_string(),
            })?;

        if preflight.kind != PREFLIGHT_KIND {
            return Err(CoreError::InvalidPreflight {
                message: format!("expected kind {}, got {}", PREFLIGHT_KIND, preflight.kind),
            });
        }

        if !PREFLIGHT_API_VERSIONS.contains(&preflight.api_version.as_str()) {
            return Err(CoreError::InvalidPreflight {
                message: format!("unsupported apiVersion {}", preflight.api_version),
            });
        }

        Ok(preflight)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFLIGHT: &str = r#"
apiVersion: troubleshoot.replicated.com/v1beta1
kind: Preflight
metadata:
  name: app-preflights
spec:
  collectors:
    - clusterInfo: {}
  analyzers:
    - clusterVersion:
        outcomes:
          - fail:
              when: "< 1.16.0"
              message: Kubernetes 1.16 or later is required
"#;

    #[test]
    fn test_parse_preflight() {
        let preflight = Preflight::from_slice(PREFLIGHT.as_bytes()).unwrap();
        assert_eq!(preflight.name(), "app-preflights");
        assert_eq!(preflight.spec.collectors.len(), 1);
        assert_eq!(preflight.spec.analyzers.len(), 1);
    }

    #[test]
    fn test_parse_v1beta2() {
        let yaml = "apiVersion: troubleshoot.sh/v1beta2\nkind: Preflight\n";
        let preflight = Preflight::from_slice(yaml.as_bytes()).unwrap();
        assert!(preflight.spec.collectors.is_empty());
        assert_eq!(preflight.name(), "");
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let yaml = "apiVersion: troubleshoot.sh/v1beta2\nkind: SupportBundle\n";
        let err = Preflight::from_slice(yaml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected kind Preflight"));
    }

    #[test]
    fn test_unknown_api_version_rejected() {
        let yaml = "apiVersion: example.com/v1\nkind: Preflight\n";
        let result = Preflight::from_slice(yaml.as_bytes());
        assert!(matches!(result, Err(CoreError::InvalidPreflight { .. })));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = Preflight::from_slice(b"kind: [unterminated");
        assert!(matches!(result, Err(CoreError::InvalidPreflight { .. })));
    }
}
