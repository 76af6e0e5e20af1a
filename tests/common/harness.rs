//! Compilation fixtures built from inline manifests

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use symbol_completion::symbols::local::ConstantContext;
use symbol_completion::{
    AttributeTarget, Bound, CancellationToken, Compilation, CompilationServices, Completable,
    ConstantValue, DiagnosticBag, EngineConfig, LocalSymbol, LocationFilter, LookupScope, Manifest,
    ManifestBinder, MethodSymbol, ModuleSymbol, NamespaceSymbol, RecordingNotifier, SemanticBinder,
    Signature, Symbol, WellKnownAttributeData,
};

/// A compilation plus handles on everything it publishes to
pub struct TestCompilation {
    pub compilation: Compilation,
    pub sink: Arc<DiagnosticBag>,
    pub events: Arc<RecordingNotifier>,
    pub binder: Arc<ManifestBinder>,
}

impl TestCompilation {
    pub fn from_toml(manifest: &str) -> Self {
        Self::with_config(manifest, EngineConfig::default())
    }

    pub fn with_config(manifest: &str, config: EngineConfig) -> Self {
        Self::with_binder(manifest, config, |binder| binder as Arc<dyn SemanticBinder>)
    }

    /// Build with the manifest binder wrapped by `wrap`
    pub fn with_binder(
        manifest: &str,
        config: EngineConfig,
        wrap: impl FnOnce(Arc<ManifestBinder>) -> Arc<dyn SemanticBinder>,
    ) -> Self {
        let manifest = Manifest::from_toml_str(manifest).expect("manifest should parse");
        let (binder, modules) = manifest.lower().expect("manifest should lower");
        let binder = Arc::new(binder);

        let sink = Arc::new(DiagnosticBag::new());
        let events = Arc::new(RecordingNotifier::new());
        let services = CompilationServices::new(
            wrap(Arc::clone(&binder)),
            sink.clone(),
            events.clone(),
            config,
        );

        Self {
            compilation: Compilation::new(services, modules),
            sink,
            events,
            binder,
        }
    }

    pub fn module(&self) -> &Arc<ModuleSymbol> {
        &self.compilation.modules()[0]
    }

    pub fn find(&self, path: &str) -> Symbol {
        self.compilation
            .find(path, &CancellationToken::none())
            .expect("lookup should not be cancelled")
            .unwrap_or_else(|| panic!("no symbol at '{}'", path))
    }

    pub fn method(&self, path: &str) -> Arc<MethodSymbol> {
        match self.find(path) {
            Symbol::Method(method) => method,
            other => panic!("'{}' is not a method: {:?}", path, other),
        }
    }

    pub fn namespace(&self, path: &str) -> Arc<NamespaceSymbol> {
        match self.find(path) {
            Symbol::Namespace(namespace) => namespace,
            other => panic!("'{}' is not a namespace: {:?}", path, other),
        }
    }

    pub fn local(&self, path: &str) -> Arc<LocalSymbol> {
        match self.find(path) {
            Symbol::Local(local) => local,
            other => panic!("'{}' is not a local: {:?}", path, other),
        }
    }

    pub fn complete(&self) {
        self.compilation
            .force_complete(None, &CancellationToken::none())
            .expect("completion should not fail");
    }

    pub fn complete_filtered(&self, filter: &LocationFilter) {
        self.compilation
            .force_complete(Some(filter), &CancellationToken::none())
            .expect("filtered completion should not fail");
    }

    /// Run `f` on `threads` threads at once and wait for all of them
    pub fn race<F>(&self, threads: usize, f: F)
    where
        F: Fn(&Self, usize) + Sync,
    {
        thread::scope(|scope| {
            for index in 0..threads {
                let f = &f;
                scope.spawn(move || f(self, index));
            }
        });
    }
}

/// Delays every signature and constant binding to widen race windows
pub struct SlowBinder {
    pub inner: Arc<ManifestBinder>,
    pub delay: Duration,
}

impl SemanticBinder for SlowBinder {
    fn bind_attributes(&self, target: AttributeTarget<'_>) -> Bound<WellKnownAttributeData> {
        self.inner.bind_attributes(target)
    }

    fn bind_signature(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Bound<Signature> {
        thread::sleep(self.delay);
        self.inner.bind_signature(method, scope)
    }

    fn override_candidates(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Vec<Signature> {
        self.inner.override_candidates(method, scope)
    }

    fn bind_constant(&self, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
        thread::sleep(self.delay);
        self.inner.bind_constant(local, context)
    }
}

/// Cancels `token` the first time the method named `method` is bound
pub struct CancellingBinder {
    pub inner: Arc<ManifestBinder>,
    pub token: CancellationToken,
    pub method: String,
}

impl SemanticBinder for CancellingBinder {
    fn bind_attributes(&self, target: AttributeTarget<'_>) -> Bound<WellKnownAttributeData> {
        self.inner.bind_attributes(target)
    }

    fn bind_signature(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Bound<Signature> {
        if method.name() == self.method {
            self.token.cancel();
        }
        self.inner.bind_signature(method, scope)
    }

    fn override_candidates(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Vec<Signature> {
        self.inner.override_candidates(method, scope)
    }

    fn bind_constant(&self, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
        self.inner.bind_constant(local, context)
    }
}

/// Records which threads bound attributes
pub struct ThreadRecordingBinder {
    pub inner: Arc<ManifestBinder>,
    pub threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl SemanticBinder for ThreadRecordingBinder {
    fn bind_attributes(&self, target: AttributeTarget<'_>) -> Bound<WellKnownAttributeData> {
        self.threads.lock().unwrap().push(thread::current().id());
        self.inner.bind_attributes(target)
    }

    fn bind_signature(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Bound<Signature> {
        self.inner.bind_signature(method, scope)
    }

    fn override_candidates(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Vec<Signature> {
        self.inner.override_candidates(method, scope)
    }

    fn bind_constant(&self, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
        self.inner.bind_constant(local, context)
    }
}
