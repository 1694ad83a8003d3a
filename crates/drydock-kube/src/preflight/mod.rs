//! Preflight orchestration
//!
//! - [`PreflightRunner`]: marks versions ready or pending preflight, renders the
//!   preflight synchronously and dispatches execution
//! - [`PreflightDispatcher`]: bounded background execution with observable handles
//! - Collaborators: [`ManifestLoader`], [`PreflightRenderer`], [`PreflightExecutor`]

mod dispatch;
mod loader;
mod render;
mod runner;

pub use dispatch::{DispatchHandle, PreflightDispatcher, PreflightExecutor};
pub use loader::{ArchiveLoader, ManifestLoader};
pub use render::{EngineRenderer, PreflightRenderer};
pub use runner::{PreflightRunner, PreflightRunnerBuilder, RunOutcome};
