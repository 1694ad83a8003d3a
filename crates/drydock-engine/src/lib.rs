//! Drydock Engine - templating for preflight documents
//!
//! This crate provides a MiniJinja-based engine with:
//! - Registry functions (`LocalRegistryHost()`, `LocalImageName(image)`, ...)
//! - Config functions (`ConfigOption(name)`, `ConfigOptionEquals(name, value)`)
//! - Installer bindings (`KurlString(key)`, `KurlInt(key)`, `KurlBool(key)`, `KurlAll()`)
//! - Human-readable error messages with suggestions

pub mod bindings;
pub mod engine;
pub mod error;
pub mod functions;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder, RenderContext};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use suggestions::AVAILABLE_FUNCTIONS;
