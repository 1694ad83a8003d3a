//! Installer bindings for templates
//!
//! A render must not abort because an optional installer field is missing on
//! one cluster distribution. The accessors here therefore fall back to `""`,
//! `0` or `false` on a miss or a type mismatch, logging the miss at `debug`.
//! Callers that need to tell a miss apart from a default use the typed
//! `Option` lookups on [`InstallerContext`] instead.

use drydock_core::{InstallerContext, InstallerValue};
use minijinja::Environment;
use std::sync::Arc;
use tracing::debug;

/// Register `KurlString`, `KurlInt`, `KurlBool` and `KurlAll`
///
/// Without an installer every lookup returns its default.
pub fn register(env: &mut Environment<'static>, installer: Option<Arc<InstallerContext>>) {
    let installer = installer.unwrap_or_default();

    let ctx = installer.clone();
    env.add_function("KurlString", move |key: String| as_string(&ctx, &key));

    let ctx = installer.clone();
    env.add_function("KurlInt", move |key: String| as_int(&ctx, &key));

    let ctx = installer.clone();
    env.add_function("KurlBool", move |key: String| as_bool(&ctx, &key));

    env.add_function("KurlAll", move || all_keys(&installer));
}

/// String setting, or `""`
pub fn as_string(ctx: &InstallerContext, key: &str) -> String {
    lookup(ctx, key, "string", |v| v.as_str().map(str::to_string))
}

/// Integer setting, or `0`
pub fn as_int(ctx: &InstallerContext, key: &str) -> i64 {
    lookup(ctx, key, "int", InstallerValue::as_int)
}

/// Boolean setting, or `false`
pub fn as_bool(ctx: &InstallerContext, key: &str) -> bool {
    lookup(ctx, key, "bool", InstallerValue::as_bool)
}

/// Every known key, space separated, in no particular order
pub fn all_keys(ctx: &InstallerContext) -> String {
    ctx.all_keys()
}

fn lookup<T: Default>(
    ctx: &InstallerContext,
    key: &str,
    expected: &'static str,
    extract: impl Fn(&InstallerValue) -> Option<T>,
) -> T {
    let Some(value) = ctx.get(key) else {
        debug!(key, "installer key not found");
        return T::default();
    };

    match extract(value) {
        Some(v) => v,
        None => {
            debug!(
                key,
                expected,
                found = value.type_name(),
                "installer value has unexpected type"
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, RenderContext};
    use std::collections::HashSet;

    fn context() -> InstallerContext {
        let mut ctx = InstallerContext::new();
        ctx.insert("A.X", 1i64);
        ctx.insert("B.Y", "v");
        ctx.insert("C.Z", true);
        ctx
    }

    #[test]
    fn test_matching_types() {
        let ctx = context();
        assert_eq!(as_string(&ctx, "B.Y"), "v");
        assert_eq!(as_int(&ctx, "A.X"), 1);
        assert!(as_bool(&ctx, "C.Z"));
    }

    #[test]
    fn test_type_mismatch_degrades() {
        let ctx = context();
        assert_eq!(as_string(&ctx, "A.X"), "");
        assert_eq!(as_int(&ctx, "B.Y"), 0);
        assert!(!as_bool(&ctx, "A.X"));
    }

    #[test]
    fn test_missing_key_degrades() {
        let ctx = context();
        assert_eq!(as_string(&ctx, "missing.key"), "");
        assert_eq!(as_int(&ctx, "missing.key"), 0);
        assert!(!as_bool(&ctx, "missing.key"));
    }

    #[test]
    fn test_all_keys() {
        let ctx = context();
        let listed = all_keys(&ctx);
        let keys: HashSet<&str> = listed.split(' ').collect();
        assert_eq!(keys, HashSet::from(["A.X", "B.Y", "C.Z"]));
    }

    #[test]
    fn test_functions_without_installer() {
        let rendered = Engine::default()
            .render_str(
                r#"[{{ KurlString("Kubernetes.Version") }}|{{ KurlInt("Rook.CephReplicaCount") }}|{{ KurlBool("Kurl.Airgap") }}|{{ KurlAll() }}]"#,
                "doc",
                &RenderContext::new(),
            )
            .unwrap();
        assert_eq!(rendered, "[|0|false|]");
    }

    #[test]
    fn test_functions_with_installer() {
        let ctx = RenderContext::new().with_installer(Arc::new(context()));

        let rendered = Engine::default()
            .render_str(
                r#"{{ KurlString("B.Y") }}-{{ KurlInt("A.X") + 1 }}-{{ KurlBool("C.Z") }}-{{ KurlString("A.X") }}"#,
                "doc",
                &ctx,
            )
            .unwrap();
        assert_eq!(rendered, "v-2-true-");
    }
}
