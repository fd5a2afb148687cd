use anyhow::Result;
use tracing::debug;

use crate::engine::Engine;
use crate::era::ALL_FUTURE_ERAS;
use crate::error::ClosureError;
use crate::method::{Artifact, CallConv, NativeEntry};
use crate::typ::{Type, signature_type};

use super::object::Invoke;

/// Invoke entry plus the raw native entry a closure will carry.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub invoke: Invoke,
    pub native: Option<NativeEntry>,
}

impl Entry {
    fn interpreter(native: Option<NativeEntry>) -> Self {
        Self {
            invoke: Invoke::Interpreter,
            native,
        }
    }
}

/// Map an artifact's calling convention onto a closure entry point.
pub(crate) fn select_invoke(artifact: Option<&Artifact>) -> Result<Entry> {
    let Some(artifact) = artifact else {
        return Ok(Entry::interpreter(None));
    };
    let Some(native) = artifact.native_entry() else {
        return Ok(Entry::interpreter(None));
    };
    match artifact.invoke() {
        Some(CallConv::Interpret) | None => Ok(Entry::interpreter(Some(native))),
        Some(CallConv::Args) => Ok(Entry {
            invoke: Invoke::Native(native.clone()),
            native: Some(native),
        }),
        Some(CallConv::Specialized(adapter)) => Ok(Entry {
            invoke: Invoke::Native(adapter),
            native: Some(native),
        }),
        Some(conv @ (CallConv::ConstReturn(_) | CallConv::StaticParams)) => {
            Err(ClosureError::UnsupportedEntry(conv.name()).into())
        }
    }
}

impl Engine {
    /// Native entry of the shared dispatcher specialized to `closure_type`.
    ///
    /// Wrappers do not depend on the era, so one is compiled per closure type
    /// and return type and reused from then on.
    pub(crate) fn generic_wrapper(&self, closure_type: &Type, argt: &Type, rettype: &Type) -> Option<NativeEntry> {
        let sig = signature_type(closure_type, argt);
        let instance = self.table().get_or_create(self.generic_template(), sig);
        let artifact = instance.get_or_create_artifact(rettype, 1, ALL_FUTURE_ERAS);
        if artifact.native_entry().is_none() {
            let _guard = self.lock_codegen();
            if artifact.native_entry().is_some() {
                return artifact.native_entry();
            }
            if self.codegen().compile(&artifact) {
                self.stats().bump_generic_wrappers();
                debug!(target: "ocrt::entry", signature = %instance.signature(), "generic wrapper compiled");
            }
        }
        artifact.native_entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CodeBody, Expr};
    use crate::method::{Namespace, Template};
    use crate::val::Val;
    use std::sync::Arc;

    fn artifact() -> Artifact {
        let t = Arc::new(Template::new(Namespace::new("Test"), "t", 1, false, CodeBody::new(Expr::constant(1i64))));
        Artifact::new(t, Type::tuple([Type::Nil]), Type::Int, None, 1, 1)
    }

    fn entry() -> NativeEntry {
        NativeEntry::new(|_, _| Ok(Val::Int(1)))
    }

    #[test]
    fn missing_artifact_or_native_entry_interprets() {
        assert!(matches!(select_invoke(None).unwrap().invoke, Invoke::Interpreter));
        let uncompiled = artifact().with_invoke(CallConv::Args);
        let selected = select_invoke(Some(&uncompiled)).unwrap();
        assert!(matches!(selected.invoke, Invoke::Interpreter));
        assert!(selected.native.is_none());
    }

    #[test]
    fn boxed_argument_convention_uses_the_native_entry_directly() {
        let a = artifact();
        let native = entry();
        a.install_native(native.clone(), CallConv::Args);
        let selected = select_invoke(Some(&a)).unwrap();
        match selected.invoke {
            Invoke::Native(e) => assert!(e.ptr_eq(&native)),
            other => panic!("unexpected invoke {:?}", other),
        }
        assert!(selected.native.unwrap().ptr_eq(&native));
    }

    #[test]
    fn specialized_convention_keeps_adapter_and_native_apart() {
        let a = artifact();
        let (native, adapter) = (entry(), entry());
        a.install_native(native.clone(), CallConv::Specialized(adapter.clone()));
        let selected = select_invoke(Some(&a)).unwrap();
        match selected.invoke {
            Invoke::Native(e) => assert!(e.ptr_eq(&adapter)),
            other => panic!("unexpected invoke {:?}", other),
        }
        assert!(selected.native.unwrap().ptr_eq(&native));
    }

    #[test]
    fn interpret_convention_normalizes_to_the_interpreter() {
        let a = artifact();
        a.install_native(entry(), CallConv::Interpret);
        let selected = select_invoke(Some(&a)).unwrap();
        assert!(matches!(selected.invoke, Invoke::Interpreter));
        assert!(selected.native.is_some());
    }

    #[test]
    fn constant_and_static_parameter_conventions_are_unsupported() {
        for conv in [CallConv::ConstReturn(Val::Int(1)), CallConv::StaticParams] {
            let a = artifact();
            a.install_native(entry(), conv);
            let err = select_invoke(Some(&a)).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ClosureError>(),
                Some(ClosureError::UnsupportedEntry(_))
            ));
        }
    }
}
