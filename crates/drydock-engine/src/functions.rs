//! Template functions (global functions available in documents)
//!
//! Names follow the application template language, so a document written for
//! the registry-rewriting render stage reads the same here:
//! `{{ LocalImageName("nginx:1.25") }}`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use drydock_core::RegistrySettings;
use indexmap::IndexMap;
use minijinja::{Environment, Error, ErrorKind};
use std::sync::Arc;

use crate::engine::RenderContext;

/// Register registry, config and encoding functions for one render
pub fn register(env: &mut Environment<'static>, context: &RenderContext) {
    let config = Arc::new(context.config_values.clone());
    let namespace = context.namespace.clone().unwrap_or_default();

    let r = context.registry.clone();
    env.add_function("HasLocalRegistry", move || r.is_some());

    let r = context.registry.clone();
    env.add_function("LocalRegistryHost", move || local_registry_host(r.as_ref()));

    let r = context.registry.clone();
    env.add_function("LocalRegistryNamespace", move || {
        local_registry_namespace(r.as_ref())
    });

    let r = context.registry.clone();
    env.add_function("LocalRegistryAddress", move || local_registry_address(r.as_ref()));

    let r = context.registry.clone();
    env.add_function("LocalImageName", move |image: String| {
        local_image_name(r.as_ref(), &image)
    });

    let c = config.clone();
    env.add_function("ConfigOption", move |name: String| config_option(&c, &name));

    let c = config;
    env.add_function("ConfigOptionEquals", move |name: String, expected: String| {
        config_option_equals(&c, &name, &expected)
    });

    env.add_function("Namespace", move || namespace.clone());
    env.add_function("Base64Encode", base64_encode);
    env.add_function("Base64Decode", base64_decode);
}

/// Registry hostname, or empty when no registry is configured
pub fn local_registry_host(registry: Option<&RegistrySettings>) -> String {
    registry.map(|r| r.hostname.clone()).unwrap_or_default()
}

/// Registry namespace, or empty when no registry is configured
pub fn local_registry_namespace(registry: Option<&RegistrySettings>) -> String {
    registry.map(|r| r.namespace.clone()).unwrap_or_default()
}

/// `hostname/namespace` of the registry, or empty when none is configured
pub fn local_registry_address(registry: Option<&RegistrySettings>) -> String {
    registry.map(RegistrySettings::address).unwrap_or_default()
}

/// Rewrite an image to the local registry; unchanged without one
pub fn local_image_name(registry: Option<&RegistrySettings>, image: &str) -> String {
    match registry {
        Some(r) => r.image_name(image),
        None => image.to_string(),
    }
}

/// Value of a config option, empty when unset
pub fn config_option(values: &IndexMap<String, String>, name: &str) -> String {
    values.get(name).cloned().unwrap_or_default()
}

pub fn config_option_equals(values: &IndexMap<String, String>, name: &str, expected: &str) -> bool {
    values.get(name).is_some_and(|v| v == expected)
}

pub fn base64_encode(value: String) -> String {
    STANDARD.encode(value.as_bytes())
}

pub fn base64_decode(value: String) -> Result<String, Error> {
    let bytes = STANDARD.decode(value.as_bytes()).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("invalid base64: {}", e))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("decoded base64 is not UTF-8: {}", e),
        )
    })
}
