//! Drydock Core - shared types for the application lifecycle manager
//!
//! This crate provides the foundational types used throughout Drydock:
//! - `VersionKey` / `VersionStatus`: downstream version identity and readiness
//! - `RegistrySettings`: optional private registry configured for an application
//! - `ManifestBundle`: rendered manifests loaded from a version archive
//! - `Preflight`: a rendered preflight spec, ready to be executed
//! - `InstallerContext`: an installer specification flattened for templates

pub mod bundle;
pub mod error;
pub mod installer;
pub mod preflight;
pub mod registry;
pub mod version;

pub use bundle::{KindDocument, ManifestBundle};
pub use error::{CoreError, Result};
pub use installer::{InstallerCategory, InstallerContext, InstallerSchema, InstallerValue};
pub use preflight::{Preflight, PreflightMetadata, PreflightSpec};
pub use registry::{RegistryRow, RegistrySettings};
pub use version::{VersionKey, VersionStatus};
