//! Preflight rendering

use drydock_core::{InstallerContext, ManifestBundle, RegistrySettings};
use drydock_engine::{Engine, RenderContext};
use std::sync::Arc;

use crate::config::PreflightConfig;
use crate::error::Result;

/// Template name used in render diagnostics
const PREFLIGHT_TEMPLATE_NAME: &str = "preflight.yaml";

/// Substitutes registry, config and installer values into a preflight document
pub trait PreflightRenderer: Send + Sync {
    fn render(
        &self,
        bundle: &ManifestBundle,
        registry: Option<&RegistrySettings>,
        document: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Renders with the MiniJinja engine
#[derive(Debug, Clone, Default)]
pub struct EngineRenderer {
    engine: Engine,
    namespace: Option<String>,
    installer: Option<Arc<InstallerContext>>,
}

impl EngineRenderer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            namespace: None,
            installer: None,
        }
    }

    pub fn from_config(config: &PreflightConfig) -> Self {
        Self::new(Engine::builder().strict(config.strict_templates).build())
    }

    /// Namespace returned by `Namespace()`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Installer settings for `Kurl*` lookups (embedded clusters)
    pub fn with_installer(mut self, installer: InstallerContext) -> Self {
        self.installer = Some(Arc::new(installer));
        self
    }
}

impl PreflightRenderer for EngineRenderer {
    fn render(
        &self,
        bundle: &ManifestBundle,
        registry: Option<&RegistrySettings>,
        document: &[u8],
    ) -> Result<Vec<u8>> {
        let mut context = RenderContext::for_bundle(bundle).with_registry(registry.cloned());
        context.namespace = self.namespace.clone();
        context.installer = self.installer.clone();

        let rendered = self
            .engine
            .render_bytes(document, PREFLIGHT_TEMPLATE_NAME, &context)?;
        Ok(rendered)
    }
}
