//! Template engine based on MiniJinja

use drydock_core::{InstallerContext, ManifestBundle, RegistrySettings};
use indexmap::IndexMap;
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, ErrorKind, Output, State, UndefinedBehavior};
use std::fmt::Write;
use std::sync::Arc;

use crate::error::{Result, TemplateError};
use crate::{bindings, functions};

/// Values available to a document while it renders
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Namespace the application is deployed to
    pub namespace: Option<String>,

    /// Private registry, when one is configured
    pub registry: Option<RegistrySettings>,

    /// Config option values by name
    pub config_values: IndexMap<String, String>,

    /// Flattened installer settings (embedded clusters only)
    pub installer: Option<Arc<InstallerContext>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the config values shipped in a bundle
    pub fn for_bundle(bundle: &ManifestBundle) -> Self {
        Self {
            config_values: bundle.config_values(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_registry(mut self, registry: Option<RegistrySettings>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_installer(mut self, installer: Arc<InstallerContext>) -> Self {
        self.installer = Some(installer);
        self
    }
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    /// Create an environment with every function bound to `context`
    fn create_environment(&self, context: &RenderContext) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(UndefinedBehavior::Lenient);
        }
        env.set_keep_trailing_newline(true);
        env.set_formatter(format_value);

        functions::register(&mut env, context);
        bindings::register(&mut env, context.installer.clone());

        env
    }

    /// Render a single document
    pub fn render_str(&self, source: &str, name: &str, context: &RenderContext) -> Result<String> {
        let mut env = self.create_environment(context);

        env.add_template_owned(name.to_string(), source.to_string())
            .map_err(|e| TemplateError::from_minijinja(e, name, source))?;

        let tmpl = env
            .get_template(name)
            .map_err(|e| TemplateError::from_minijinja(e, name, source))?;

        let ctx = minijinja::context! {
            namespace => &context.namespace,
            registry => &context.registry,
            config => &context.config_values,
        };

        let rendered = tmpl
            .render(ctx)
            .map_err(|e| TemplateError::from_minijinja(e, name, source))?;

        Ok(rendered)
    }

    /// Render a document given as bytes
    pub fn render_bytes(&self, source: &[u8], name: &str, context: &RenderContext) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(source)?;
        Ok(self.render_str(source, name, context)?.into_bytes())
    }
}

/// Write booleans as `true`/`false`, the way YAML spells them
fn format_value(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &Value,
) -> std::result::Result<(), minijinja::Error> {
    if value.kind() == ValueKind::Bool {
        let text = if value.is_true() { "true" } else { "false" };
        return out
            .write_str(text)
            .map_err(|e| minijinja::Error::new(ErrorKind::WriteFailure, e.to_string()));
    }

    minijinja::escape_formatter(out, state, value)
}
