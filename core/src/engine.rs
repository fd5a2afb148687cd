//! Process-wide closure machinery: specialization cache, compile lock and the
//! collaborator services used while constructing closures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::alloc::ClosureAllocator;
use crate::code::{ClosureCompiler, CodeBody, Codegen, Expr, Inference, TypeInference};
use crate::config::RuntimeOptions;
use crate::hooks::{PrecompileHook, TraceCompile};
use crate::method::{Namespace, SpecializationTable, Template};

/// Counters describing what an engine has done so far.
#[derive(Debug, Default)]
pub struct EngineStats {
    inferences: AtomicU64,
    compilations: AtomicU64,
    generic_wrappers: AtomicU64,
}

impl EngineStats {
    pub(crate) fn bump_inferences(&self) {
        self.inferences.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_compilations(&self) {
        self.compilations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bump_generic_wrappers(&self) {
        self.generic_wrappers.fetch_add(1, Ordering::Relaxed);
    }

    /// Inference runs started by closure construction.
    pub fn inferences(&self) -> u64 {
        self.inferences.load(Ordering::Relaxed)
    }

    /// Specializations that were compiled and installed.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Generic wrapper entries compiled.
    pub fn generic_wrappers(&self) -> u64 {
        self.generic_wrappers.load(Ordering::Relaxed)
    }
}

pub struct Engine {
    options: RuntimeOptions,
    table: SpecializationTable,
    codegen_lock: Mutex<()>,
    inference: Arc<dyn Inference>,
    codegen: Arc<dyn Codegen>,
    precompile: Arc<dyn PrecompileHook>,
    allocator: ClosureAllocator,
    generic_template: Arc<Template>,
    stats: EngineStats,
}

static GLOBAL_ENGINE: Lazy<Arc<Engine>> = Lazy::new(|| Arc::new(Engine::new(RuntimeOptions::from_env())));

impl Engine {
    /// Engine with the default collaborators configured from `options`.
    pub fn new(options: RuntimeOptions) -> Self {
        EngineBuilder::new().options(options).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The process-wide engine, configured from `OCRT_*` environment variables
    /// on first use.
    pub fn global() -> &'static Arc<Engine> {
        &GLOBAL_ENGINE
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn table(&self) -> &SpecializationTable {
        &self.table
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn allocator(&self) -> &ClosureAllocator {
        &self.allocator
    }

    pub(crate) fn inference(&self) -> &dyn Inference {
        self.inference.as_ref()
    }

    pub(crate) fn codegen(&self) -> &dyn Codegen {
        self.codegen.as_ref()
    }

    pub(crate) fn precompile_hook(&self) -> &dyn PrecompileHook {
        self.precompile.as_ref()
    }

    /// The shared dispatcher method every generic wrapper specializes.
    pub fn generic_template(&self) -> &Arc<Template> {
        &self.generic_template
    }

    /// Serializes infer-then-compile across threads.
    pub(crate) fn lock_codegen(&self) -> MutexGuard<'_, ()> {
        self.codegen_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("specializations", &self.table.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Assembles an [`Engine`], substituting any collaborator left unset with
/// its default.
#[derive(Default)]
pub struct EngineBuilder {
    options: RuntimeOptions,
    inference: Option<Arc<dyn Inference>>,
    codegen: Option<Arc<dyn Codegen>>,
    precompile: Option<Arc<dyn PrecompileHook>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn inference(mut self, inference: Arc<dyn Inference>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn codegen(mut self, codegen: Arc<dyn Codegen>) -> Self {
        self.codegen = Some(codegen);
        self
    }

    pub fn precompile_hook(mut self, hook: Arc<dyn PrecompileHook>) -> Self {
        self.precompile = Some(hook);
        self
    }

    pub fn build(self) -> Engine {
        let options = self.options;
        debug!(
            target: "ocrt::config",
            compile = %options.compile,
            trace_compile = ?options.trace_compile,
            max_native_body_nodes = options.max_native_body_nodes,
            "engine configured"
        );
        let codegen = self
            .codegen
            .unwrap_or_else(|| Arc::new(ClosureCompiler::new(options.max_native_body_nodes)));
        let precompile = self
            .precompile
            .unwrap_or_else(|| Arc::new(TraceCompile::new(options.trace_compile.clone())));
        let generic_template = Arc::new(Template::new(
            Namespace::new("Core"),
            "opaque_closure_call",
            2,
            true,
            CodeBody::new(Expr::InterpretCallee),
        ));
        Engine {
            table: SpecializationTable::new(),
            codegen_lock: Mutex::new(()),
            inference: self.inference.unwrap_or_else(|| Arc::new(TypeInference)),
            codegen,
            precompile,
            allocator: ClosureAllocator::new(),
            generic_template,
            stats: EngineStats::default(),
            options,
        }
    }
}
