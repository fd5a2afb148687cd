use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::closure::OpaqueClosure;
use crate::method::{Artifact, MethodInstance, Template};
use crate::typ::Type;
use crate::val::Val;

/// Hands out closure objects and keeps running totals of what it handed out.
#[derive(Debug, Default)]
pub struct ClosureAllocator {
    objects: AtomicU64,
    bytes: AtomicU64,
}

impl ClosureAllocator {
    pub const fn new() -> Self {
        Self {
            objects: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn allocate(&self, closure: OpaqueClosure) -> Arc<OpaqueClosure> {
        let len = mem::size_of::<OpaqueClosure>() as u64;
        let objects = self.objects.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.bytes.fetch_add(len, Ordering::Relaxed) + len;
        trace!(
            target: "ocrt::alloc",
            bytes = len,
            total_bytes = total,
            objects,
            closure_type = %closure.runtime_type(),
            "closure_allocator.alloc"
        );
        Arc::new(closure)
    }

    pub fn objects(&self) -> u64 {
        self.objects.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Something a construction keeps alive until it finishes.
#[derive(Debug, Clone)]
pub enum Root {
    Template(Arc<Template>),
    Instance(Arc<MethodInstance>),
    Artifact(Arc<Artifact>),
    Type(Type),
    Val(Val),
}

impl From<Arc<Template>> for Root {
    fn from(t: Arc<Template>) -> Self {
        Root::Template(t)
    }
}

impl From<Arc<MethodInstance>> for Root {
    fn from(mi: Arc<MethodInstance>) -> Self {
        Root::Instance(mi)
    }
}

impl From<Arc<Artifact>> for Root {
    fn from(a: Arc<Artifact>) -> Self {
        Root::Artifact(a)
    }
}

impl From<Type> for Root {
    fn from(t: Type) -> Self {
        Root::Type(t)
    }
}

impl From<Val> for Root {
    fn from(v: Val) -> Self {
        Root::Val(v)
    }
}

/// Scoped retention of construction intermediates.
///
/// Everything held is released together when the scope is dropped, so a
/// value pushed here outlives any inference or compilation started while the
/// scope is open.
#[derive(Debug, Default)]
pub struct RootScope {
    roots: Vec<Root>,
}

impl RootScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `value` for the rest of the scope and hand back a clone of it.
    pub fn hold<T>(&mut self, value: T) -> T
    where
        T: Clone + Into<Root>,
    {
        self.roots.push(value.clone().into());
        value
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
