//! Version readiness orchestration
//!
//! [`PreflightRunner::run`] decides whether a freshly rendered version needs
//! preflight checks:
//!
//! - no preflight document: the version is marked ready and nothing else runs
//! - otherwise the version is marked pending preflight *before* rendering, the
//!   preflight is rendered synchronously, and execution is dispatched to the
//!   background. `run` returns as soon as the task is spawned.
//!
//! A render failure leaves the version pending preflight. Calling `run` again
//! is safe: it rewrites the same status and renders from scratch.

use drydock_core::preflight::PREFLIGHT_KIND;
use drydock_core::{ManifestBundle, Preflight, VersionKey, VersionStatus};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::dispatch::{DispatchHandle, PreflightDispatcher, PreflightExecutor};
use super::loader::{ArchiveLoader, ManifestLoader};
use super::render::{EngineRenderer, PreflightRenderer};
use crate::config::PreflightConfig;
use crate::error::{KubeError, RenderStage, Result};
use crate::registry::resolve_registry_settings;
use crate::storage::{RegistryStore, VersionStatusStore};

/// What `run` did with a version
#[derive(Debug)]
pub enum RunOutcome {
    /// No preflights; the version was marked ready
    Ready,
    /// Preflights were rendered and handed to the executor
    Dispatched(DispatchHandle),
}

impl RunOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, RunOutcome::Ready)
    }

    /// Handle on the dispatched execution, if any
    pub fn into_handle(self) -> Option<DispatchHandle> {
        match self {
            RunOutcome::Ready => None,
            RunOutcome::Dispatched(handle) => Some(handle),
        }
    }
}

/// Prepares versions for deployment
pub struct PreflightRunner {
    loader: Arc<dyn ManifestLoader>,
    status: Arc<dyn VersionStatusStore>,
    registry: Arc<dyn RegistryStore>,
    renderer: Arc<dyn PreflightRenderer>,
    dispatcher: PreflightDispatcher,
}

impl PreflightRunner {
    pub fn builder() -> PreflightRunnerBuilder {
        PreflightRunnerBuilder::default()
    }

    /// Executions dispatched by this runner that have not finished
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Mark a version ready, or render and dispatch its preflights
    pub async fn run(&self, app_id: &str, sequence: i64, archive: &Path) -> Result<RunOutcome> {
        let key = VersionKey::new(app_id, sequence);

        let bundle = self
            .loader
            .load(archive)
            .await
            .map_err(|e| KubeError::LoadManifests {
                archive: archive.to_path_buf(),
                source: Box::new(e),
            })?;

        let Some(document) = bundle.preflight() else {
            self.status
                .set_ready(&key)
                .await
                .map_err(|e| status_error(&key, VersionStatus::Ready, e))?;
            info!(app_id, sequence, "no preflights, version is ready");
            return Ok(RunOutcome::Ready);
        };
        let (group, version) = (document.group().to_string(), document.version().to_string());

        self.status
            .set_pending_preflights(&key)
            .await
            .map_err(|e| status_error(&key, VersionStatus::PendingPreflights, e))?;
        info!(app_id, sequence, "version is pending preflights");

        let preflight = self.render(&key, &bundle, &group, &version).await?;

        Ok(RunOutcome::Dispatched(self.dispatcher.dispatch(key, preflight)))
    }

    async fn render(
        &self,
        key: &VersionKey,
        bundle: &ManifestBundle,
        group: &str,
        version: &str,
    ) -> Result<Preflight> {
        let document = bundle
            .marshal(group, version, PREFLIGHT_KIND)
            .map_err(|e| KubeError::render(RenderStage::Marshal, e.into()))?;

        let registry = resolve_registry_settings(self.registry.as_ref(), &key.app_id)
            .await
            .map_err(|e| KubeError::render(RenderStage::RegistrySettings, e))?;

        let rendered = self
            .renderer
            .render(bundle, registry.as_ref(), document.as_bytes())
            .map_err(|e| KubeError::render(RenderStage::Template, e))?;

        Preflight::from_slice(&rendered).map_err(|e| KubeError::render(RenderStage::Parse, e.into()))
    }
}

fn status_error(key: &VersionKey, status: VersionStatus, source: KubeError) -> KubeError {
    KubeError::StatusWrite {
        key: key.clone(),
        status,
        source: Box::new(source),
    }
}

/// Builder for [`PreflightRunner`]
///
/// The status store, registry store and executor are required. Manifests are
/// loaded from disk and rendered with a strict engine unless overridden.
#[derive(Default)]
pub struct PreflightRunnerBuilder {
    loader: Option<Arc<dyn ManifestLoader>>,
    status: Option<Arc<dyn VersionStatusStore>>,
    registry: Option<Arc<dyn RegistryStore>>,
    renderer: Option<Arc<dyn PreflightRenderer>>,
    executor: Option<Arc<dyn PreflightExecutor>>,
    max_concurrent_checks: Option<usize>,
}

impl PreflightRunnerBuilder {
    pub fn loader(mut self, loader: Arc<dyn ManifestLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use one backend for both status writes and registry reads
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: VersionStatusStore + RegistryStore + 'static,
    {
        self.status = Some(store.clone());
        self.registry = Some(store);
        self
    }

    pub fn status_store(mut self, store: Arc<dyn VersionStatusStore>) -> Self {
        self.status = Some(store);
        self
    }

    pub fn registry_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.registry = Some(store);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PreflightRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn PreflightExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Bound concurrent executions; `None` (the default) leaves them unbounded
    pub fn max_concurrent_checks(mut self, max: Option<usize>) -> Self {
        self.max_concurrent_checks = max;
        self
    }

    /// Apply the concurrency bound and, unless a renderer is set, template strictness
    pub fn with_config(mut self, config: &PreflightConfig) -> Self {
        self.max_concurrent_checks = config.max_concurrent_checks;
        if self.renderer.is_none() {
            self.renderer = Some(Arc::new(EngineRenderer::from_config(config)));
        }
        self
    }

    pub fn build(self) -> Result<PreflightRunner> {
        let status = self
            .status
            .ok_or_else(|| KubeError::InvalidConfig("a version status store is required".to_string()))?;
        let registry = self
            .registry
            .ok_or_else(|| KubeError::InvalidConfig("a registry store is required".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| KubeError::InvalidConfig("a preflight executor is required".to_string()))?;

        Ok(PreflightRunner {
            loader: self.loader.unwrap_or_else(|| Arc::new(ArchiveLoader)),
            status,
            registry,
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(EngineRenderer::default())),
            dispatcher: PreflightDispatcher::new(executor)
                .with_max_concurrent(self.max_concurrent_checks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MockStore, StoreCall};
    use async_trait::async_trait;
    use drydock_core::{KindDocument, RegistryRow, RegistrySettings};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const PREFLIGHT: &str = r#"apiVersion: troubleshoot.sh/v1beta2
kind: Preflight
metadata:
  name: checks
spec:
  collectors:
    - run:
        image: '{{ LocalImageName("busybox:1.36") }}'
"#;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
"#;

    fn bundle(documents: &[&str]) -> ManifestBundle {
        let documents = documents
            .iter()
            .map(|doc| {
                KindDocument::from_value(serde_yaml::from_str(doc).unwrap(), "manifest.yaml")
                    .unwrap()
            })
            .collect();
        ManifestBundle::new(documents)
    }

    struct StaticLoader(ManifestBundle);

    #[async_trait]
    impl ManifestLoader for StaticLoader {
        async fn load(&self, _archive: &Path) -> Result<ManifestBundle> {
            Ok(self.0.clone())
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl ManifestLoader for FailingLoader {
        async fn load(&self, archive: &Path) -> Result<ManifestBundle> {
            Err(KubeError::Manifest(format!("{} not found", archive.display())))
        }
    }

    /// Records what the store had seen when each render happened
    struct RecordingRenderer {
        store: MockStore,
        output: Option<&'static str>,
        calls_at_render: Mutex<Vec<Vec<StoreCall>>>,
        registries: Mutex<Vec<Option<RegistrySettings>>>,
    }

    impl RecordingRenderer {
        fn new(store: &MockStore) -> Arc<Self> {
            Self::with_output(store, None)
        }

        fn with_output(store: &MockStore, output: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                store: store.clone(),
                output,
                calls_at_render: Mutex::new(Vec::new()),
                registries: Mutex::new(Vec::new()),
            })
        }

        fn renders(&self) -> usize {
            self.calls_at_render.lock().unwrap().len()
        }
    }

    impl PreflightRenderer for RecordingRenderer {
        fn render(
            &self,
            bundle: &ManifestBundle,
            registry: Option<&RegistrySettings>,
            document: &[u8],
        ) -> Result<Vec<u8>> {
            self.calls_at_render.lock().unwrap().push(self.store.calls());
            self.registries.lock().unwrap().push(registry.cloned());

            match self.output {
                Some(output) => Ok(output.as_bytes().to_vec()),
                None => EngineRenderer::default().render(bundle, registry, document),
            }
        }
    }

    struct FailingRenderer;

    impl PreflightRenderer for FailingRenderer {
        fn render(
            &self,
            _bundle: &ManifestBundle,
            _registry: Option<&RegistrySettings>,
            _document: &[u8],
        ) -> Result<Vec<u8>> {
            Err(KubeError::Template("unknown function".to_string()))
        }
    }

    /// Holds every execution until a permit is added to `gate`
    struct GatedExecutor {
        started: AtomicUsize,
        gate: Semaphore,
        executed: Mutex<Vec<(VersionKey, Preflight)>>,
    }

    impl GatedExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                executed: Mutex::new(Vec::new()),
            })
        }

        fn open() -> Arc<Self> {
            let executor = Self::new();
            executor.gate.add_permits(1_000);
            executor
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PreflightExecutor for GatedExecutor {
        async fn execute(&self, key: &VersionKey, preflight: Preflight) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            self.executed.lock().unwrap().push((key.clone(), preflight));
            Ok(())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl PreflightExecutor for FailingExecutor {
        async fn execute(&self, _key: &VersionKey, _preflight: Preflight) -> Result<()> {
            Err(KubeError::Storage("collector failed".to_string()))
        }
    }

    fn registry_row() -> RegistryRow {
        RegistryRow {
            hostname: Some("registry.local".to_string()),
            username: None,
            password_enc: None,
            namespace: Some("myapp".to_string()),
        }
    }

    fn archive() -> PathBuf {
        PathBuf::from("/var/lib/drydock/archives/app-1/3")
    }

    fn runner(
        loader: Arc<dyn ManifestLoader>,
        store: &MockStore,
        renderer: Arc<dyn PreflightRenderer>,
        executor: Arc<dyn PreflightExecutor>,
    ) -> PreflightRunner {
        PreflightRunner::builder()
            .loader(loader)
            .store(Arc::new(store.clone()))
            .renderer(renderer)
            .executor(executor)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_preflight_marks_ready() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let renderer = RecordingRenderer::new(&store);
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[DEPLOYMENT]))),
            &store,
            renderer.clone(),
            executor.clone(),
        );

        let outcome = runner.run("app-1", 3, &archive()).await.unwrap();

        assert!(outcome.is_ready());
        let key = VersionKey::new("app-1", 3);
        assert_eq!(store.calls(), vec![StoreCall::SetReady(key.clone())]);
        assert_eq!(store.status(&key), Some(VersionStatus::Ready));
        assert_eq!(renderer.renders(), 0);
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(executor.started(), 0);
    }

    #[tokio::test]
    async fn test_preflight_marks_pending_before_render() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let renderer = RecordingRenderer::new(&store);
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[DEPLOYMENT, PREFLIGHT]))),
            &store,
            renderer.clone(),
            executor.clone(),
        );

        let handle = runner
            .run("app-1", 3, &archive())
            .await
            .unwrap()
            .into_handle()
            .unwrap();
        handle.wait().await.unwrap();

        let key = VersionKey::new("app-1", 3);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::SetPendingPreflights(key.clone()),
                StoreCall::RegistryRow("app-1".to_string()),
            ]
        );
        assert_eq!(store.counts().ready, 0);
        assert_eq!(store.status(&key), Some(VersionStatus::PendingPreflights));

        let calls_at_render = renderer.calls_at_render.lock().unwrap().clone();
        assert_eq!(calls_at_render.len(), 1);
        assert_eq!(
            calls_at_render[0].first(),
            Some(&StoreCall::SetPendingPreflights(key.clone()))
        );

        let executed = executor.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].0, key);
        assert_eq!(
            executed[0].1.spec.collectors[0]["run"]["image"].as_str(),
            Some("registry.local/myapp/busybox:1.36")
        );
    }

    #[tokio::test]
    async fn test_registry_settings_reach_renderer() {
        let store = MockStore::new().with_app("app-1", RegistryRow::default());
        let renderer = RecordingRenderer::new(&store);
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            renderer.clone(),
            GatedExecutor::open(),
        );

        let outcome = runner.run("app-1", 3, &archive()).await.unwrap();
        outcome.into_handle().unwrap().wait().await.unwrap();

        assert_eq!(*renderer.registries.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_run_returns_before_execution_completes() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let executor = GatedExecutor::new();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            RecordingRenderer::new(&store),
            executor.clone(),
        );

        let handle = runner
            .run("app-1", 3, &archive())
            .await
            .unwrap()
            .into_handle()
            .unwrap();

        assert!(!handle.is_finished());
        assert!(executor.executed.lock().unwrap().is_empty());
        assert_eq!(runner.in_flight(), 1);

        executor.gate.add_permits(1);
        handle.wait().await.unwrap();
        assert_eq!(executor.executed.lock().unwrap().len(), 1);
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_touches_nothing() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let renderer = RecordingRenderer::new(&store);
        let runner = runner(
            Arc::new(FailingLoader),
            &store,
            renderer.clone(),
            GatedExecutor::open(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();

        assert!(matches!(err, KubeError::LoadManifests { .. }));
        assert!(store.calls().is_empty());
        assert_eq!(renderer.renders(), 0);
    }

    #[tokio::test]
    async fn test_pending_write_failure_stops_run() {
        let store = MockStore::new().with_app("app-1", registry_row());
        store.fail_status_writes(true);
        let renderer = RecordingRenderer::new(&store);
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            renderer.clone(),
            executor.clone(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();

        match err {
            KubeError::StatusWrite { key, status, .. } => {
                assert_eq!(key, VersionKey::new("app-1", 3));
                assert_eq!(status, VersionStatus::PendingPreflights);
            }
            other => panic!("expected StatusWrite, got {:?}", other),
        }
        assert_eq!(store.counts().registry_reads, 0);
        assert_eq!(renderer.renders(), 0);
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(executor.started(), 0);
    }

    #[tokio::test]
    async fn test_ready_write_failure() {
        let store = MockStore::new();
        store.fail_status_writes(true);
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[DEPLOYMENT]))),
            &store,
            RecordingRenderer::new(&store),
            GatedExecutor::open(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();
        assert!(matches!(
            err,
            KubeError::StatusWrite {
                status: VersionStatus::Ready,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_registry_failure_aborts_render() {
        let store = MockStore::new().with_app("app-1", registry_row());
        store.fail_registry_reads(true);
        let renderer = RecordingRenderer::new(&store);
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            renderer.clone(),
            executor.clone(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();

        assert_eq!(err.render_stage(), Some(RenderStage::RegistrySettings));
        assert_eq!(renderer.renders(), 0);
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(
            store.status(&VersionKey::new("app-1", 3)),
            Some(VersionStatus::PendingPreflights)
        );
    }

    #[tokio::test]
    async fn test_missing_app_aborts_render() {
        let store = MockStore::new();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            RecordingRenderer::new(&store),
            GatedExecutor::open(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();
        assert_eq!(err.render_stage(), Some(RenderStage::RegistrySettings));
    }

    #[tokio::test]
    async fn test_template_failure_aborts_dispatch() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            Arc::new(FailingRenderer),
            executor.clone(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();

        assert_eq!(err.render_stage(), Some(RenderStage::Template));
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(executor.started(), 0);
        assert_eq!(
            store.status(&VersionKey::new("app-1", 3)),
            Some(VersionStatus::PendingPreflights)
        );
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_dispatch() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let executor = GatedExecutor::open();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            RecordingRenderer::with_output(&store, Some("apiVersion: v1\nkind: ConfigMap\n")),
            executor.clone(),
        );

        let err = runner.run("app-1", 3, &archive()).await.unwrap_err();

        assert_eq!(err.render_stage(), Some(RenderStage::Parse));
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(executor.started(), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_leaves_status_alone() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            RecordingRenderer::new(&store),
            Arc::new(FailingExecutor),
        );

        let handle = runner
            .run("app-1", 3, &archive())
            .await
            .unwrap()
            .into_handle()
            .unwrap();
        let err = handle.wait().await.unwrap_err();

        assert!(matches!(err, KubeError::Execution { .. }));
        assert_eq!(store.counts().pending_preflights, 1);
        assert_eq!(store.counts().ready, 0);
        assert_eq!(
            store.status(&VersionKey::new("app-1", 3)),
            Some(VersionStatus::PendingPreflights)
        );
    }

    #[tokio::test]
    async fn test_each_run_dispatches_independently() {
        let store = MockStore::new().with_app("app-1", registry_row());
        let executor = GatedExecutor::new();
        let runner = runner(
            Arc::new(StaticLoader(bundle(&[PREFLIGHT]))),
            &store,
            RecordingRenderer::new(&store),
            executor.clone(),
        );

        let first = runner.run("app-1", 3, &archive()).await.unwrap();
        let second = runner.run("app-1", 3, &archive()).await.unwrap();
        assert_eq!(runner.in_flight(), 2);
        assert_eq!(store.counts().pending_preflights, 2);

        executor.gate.add_permits(2);
        first.into_handle().unwrap().wait().await.unwrap();
        second.into_handle().unwrap().wait().await.unwrap();
        assert_eq!(executor.executed.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = PreflightRunner::builder()
            .store(Arc::new(MockStore::new()))
            .build();
        assert!(matches!(result, Err(KubeError::InvalidConfig(_))));

        let result = PreflightRunner::builder()
            .executor(GatedExecutor::open())
            .build();
        assert!(matches!(result, Err(KubeError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_with_config() {
        let config = PreflightConfig {
            max_concurrent_checks: Some(2),
            strict_templates: false,
            database: None,
        };

        let runner = PreflightRunner::builder()
            .store(Arc::new(MockStore::new()))
            .executor(GatedExecutor::open())
            .with_config(&config)
            .build()
            .unwrap();
        assert_eq!(runner.in_flight(), 0);
    }
}
