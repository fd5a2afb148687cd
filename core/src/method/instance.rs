use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use anyhow::Result;

use crate::closure::OpaqueClosure;
use crate::code::CodeBody;
use crate::era::ALL_FUTURE_ERAS;
use crate::typ::Type;
use crate::val::Val;

use super::Template;

type EntryFn = dyn Fn(&Arc<OpaqueClosure>, &[Val]) -> Result<Val> + Send + Sync;

/// Compiled entry taking the callee and its boxed argument array.
#[derive(Clone)]
pub struct NativeEntry(Arc<EntryFn>);

impl NativeEntry {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Arc<OpaqueClosure>, &[Val]) -> Result<Val> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, callee: &Arc<OpaqueClosure>, args: &[Val]) -> Result<Val> {
        (self.0)(callee, args)
    }

    pub fn ptr_eq(&self, other: &NativeEntry) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeEntry({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// How an artifact expects to be invoked.
#[derive(Debug, Clone)]
pub enum CallConv {
    /// Run the source through the interpreter
    Interpret,
    /// The native entry itself takes the boxed argument array
    Args,
    /// A dedicated adapter in front of a specialized native entry
    Specialized(NativeEntry),
    /// Shared entry returning a fixed value
    ConstReturn(Val),
    /// Needs static parameters beyond the declared signature
    StaticParams,
}

impl CallConv {
    pub fn name(&self) -> &'static str {
        match self {
            CallConv::Interpret => "interpreter",
            CallConv::Args => "boxed arguments",
            CallConv::Specialized(_) => "specialized",
            CallConv::ConstReturn(_) => "constant return",
            CallConv::StaticParams => "static parameter",
        }
    }
}

/// Inferred and possibly compiled result for one (template, signature).
///
/// Mutated in place only under the engine's compile lock. `native_entry` is
/// published once; the era range is widened last.
#[derive(Debug)]
pub struct Artifact {
    template: Arc<Template>,
    signature: Type,
    /// Inferred return type, before any caller's bounds are applied
    rettype: Type,
    source: Option<Arc<CodeBody>>,
    invoke: RwLock<Option<CallConv>>,
    native: OnceLock<NativeEntry>,
    min_era: AtomicU64,
    max_era: AtomicU64,
}

impl Artifact {
    pub fn new(
        template: Arc<Template>,
        signature: Type,
        rettype: Type,
        source: Option<Arc<CodeBody>>,
        min_era: u64,
        max_era: u64,
    ) -> Self {
        Self {
            template,
            signature,
            rettype,
            source,
            invoke: RwLock::new(None),
            native: OnceLock::new(),
            min_era: AtomicU64::new(min_era),
            max_era: AtomicU64::new(max_era),
        }
    }

    pub fn with_invoke(self, conv: CallConv) -> Self {
        *self.invoke.write().unwrap_or_else(PoisonError::into_inner) = Some(conv);
        self
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn signature(&self) -> &Type {
        &self.signature
    }

    pub fn source(&self) -> Option<&Arc<CodeBody>> {
        self.source.as_ref()
    }

    pub fn rettype(&self) -> Type {
        self.rettype.clone()
    }

    pub fn invoke(&self) -> Option<CallConv> {
        self.invoke.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn native_entry(&self) -> Option<NativeEntry> {
        self.native.get().cloned()
    }

    /// Publish a native entry and its calling convention. Returns false if an
    /// entry was already installed.
    pub fn install_native(&self, entry: NativeEntry, conv: CallConv) -> bool {
        if self.native.set(entry).is_err() {
            return false;
        }
        *self.invoke.write().unwrap_or_else(PoisonError::into_inner) = Some(conv);
        true
    }

    /// Drop a constant-return convention so codegen produces a real body.
    pub(crate) fn clear_const_return(&self) -> bool {
        let mut invoke = self.invoke.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*invoke, Some(CallConv::ConstReturn(_))) {
            *invoke = None;
            true
        } else {
            false
        }
    }

    /// Whether codegen has published a native entry.
    pub fn is_compiled(&self) -> bool {
        self.native.get().is_some()
    }

    pub fn min_era(&self) -> u64 {
        self.min_era.load(Ordering::Acquire)
    }

    pub fn max_era(&self) -> u64 {
        self.max_era.load(Ordering::Acquire)
    }

    pub fn valid_at(&self, era: u64) -> bool {
        self.min_era() <= era && era <= self.max_era()
    }

    pub(crate) fn widen_to_all_eras(&self) {
        self.max_era.store(ALL_FUTURE_ERAS, Ordering::Release);
    }
}

/// A template specialized to one signature; owns the artifacts produced for it.
#[derive(Debug)]
pub struct MethodInstance {
    template: Arc<Template>,
    signature: Type,
    cache: RwLock<Vec<Arc<Artifact>>>,
}

impl MethodInstance {
    pub fn new(template: Arc<Template>, signature: Type) -> Self {
        Self {
            template,
            signature,
            cache: RwLock::new(Vec::new()),
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn signature(&self) -> &Type {
        &self.signature
    }

    fn find(&self, pred: impl Fn(&Artifact) -> bool) -> Option<Arc<Artifact>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.iter().find(|a| pred(a)).cloned()
    }

    /// A compiled artifact valid at `era`.
    pub fn lookup_compiled(&self, era: u64) -> Option<Arc<Artifact>> {
        self.find(|a| a.valid_at(era) && a.is_compiled())
    }

    /// An artifact carrying inferred source, valid at `era`, compiled or not.
    pub fn lookup_inferred(&self, era: u64) -> Option<Arc<Artifact>> {
        self.find(|a| a.valid_at(era) && a.source().is_some())
    }

    /// An era-independent artifact with exactly this return type, created
    /// without source when missing.
    pub fn get_or_create_artifact(&self, rettype: &Type, min_era: u64, max_era: u64) -> Arc<Artifact> {
        let matches = |a: &Artifact| a.min_era() <= min_era && a.max_era() >= max_era && a.rettype() == *rettype;
        if let Some(found) = self.find(matches) {
            return found;
        }
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.iter().find(|a| matches(a)) {
            return found.clone();
        }
        let artifact = Arc::new(Artifact::new(
            self.template.clone(),
            self.signature.clone(),
            rettype.clone(),
            None,
            min_era,
            max_era,
        ));
        cache.push(artifact.clone());
        artifact
    }

    pub fn insert(&self, artifact: Arc<Artifact>) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if !cache.iter().any(|a| Arc::ptr_eq(a, &artifact)) {
            cache.push(artifact);
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
