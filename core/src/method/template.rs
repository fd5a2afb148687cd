use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::code::{CodeBody, SourceLocation};
use crate::config::CompilePolicy;
use crate::era::{ALL_FUTURE_ERAS, current_era};

/// Owner of templates; carries a per-namespace compile setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    name: Arc<str>,
    compile: CompilePolicy,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            compile: CompilePolicy::Default,
        }
    }

    pub fn with_compile(mut self, compile: CompilePolicy) -> Self {
        self.compile = compile;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compile(&self) -> CompilePolicy {
        self.compile
    }
}

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(1);

/// Source of a closure family: arity, variance and the (possibly uninferred)
/// body. Immutable after construction.
#[derive(Debug)]
pub struct Template {
    id: u64,
    name: Arc<str>,
    namespace: Arc<Namespace>,
    /// Declared slot count, including the callee slot
    nargs: usize,
    is_va: bool,
    body: Arc<CodeBody>,
    location: Option<SourceLocation>,
    primary_era: u64,
    deleted_era: u64,
    is_inferred: bool,
}

impl Template {
    pub fn new(namespace: impl Into<Arc<Namespace>>, name: &str, nargs: usize, is_va: bool, body: CodeBody) -> Self {
        Self {
            id: NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            namespace: namespace.into(),
            nargs,
            is_va,
            body: Arc::new(body),
            location: None,
            primary_era: current_era(),
            deleted_era: ALL_FUTURE_ERAS,
            is_inferred: false,
        }
    }

    /// A template that anchors a single closure family. It is only legal in
    /// `era` because it is never entered into any lookup table.
    pub fn synthetic(
        namespace: Arc<Namespace>,
        nargs: usize,
        is_va: bool,
        body: Arc<CodeBody>,
        location: Option<SourceLocation>,
        era: u64,
        is_inferred: bool,
    ) -> Self {
        Self {
            id: NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from("opaque closure"),
            namespace,
            nargs,
            is_va,
            body,
            location,
            primary_era: era,
            deleted_era: era,
            is_inferred,
        }
    }

    /// A template must at least declare the callee slot, plus the collecting
    /// slot when variadic.
    pub fn validate(&self) -> Result<(), String> {
        if self.nargs == 0 {
            return Err(format!("{} declares no callee slot", self.name));
        }
        if self.is_va && self.nargs < 2 {
            return Err(format!("variadic {} declares no slot for the trailing arguments", self.name));
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn nargs(&self) -> usize {
        self.nargs
    }

    pub fn is_va(&self) -> bool {
        self.is_va
    }

    /// Slots that must be filled by fixed arguments, callee included.
    pub fn required_nargs(&self) -> usize {
        self.nargs.saturating_sub(usize::from(self.is_va))
    }

    pub fn body(&self) -> &Arc<CodeBody> {
        &self.body
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn primary_era(&self) -> u64 {
        self.primary_era
    }

    pub fn deleted_era(&self) -> u64 {
        self.deleted_era
    }

    pub fn is_inferred(&self) -> bool {
        self.is_inferred
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace.name(), self.name)?;
        if let Some(loc) = &self.location {
            write!(f, " @ {}", loc)?;
        }
        Ok(())
    }
}
