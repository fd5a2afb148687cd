use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::alloc::RootScope;
use crate::config::CompilePolicy;
use crate::engine::Engine;
use crate::error::{ClosureError, ConstructionError};
use crate::method::{Artifact, Template};
use crate::typ::{Type, is_subtype, signature_type, type_intersection, type_union};

/// Caller-declared bounds on a closure's return type.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnBounds {
    pub lower: Type,
    pub upper: Type,
}

impl ReturnBounds {
    pub fn new(lower: Type, upper: Type) -> Self {
        Self { lower, upper }
    }

    /// `Union{}` up to `Any`: whatever inference finds is kept.
    pub fn unbounded() -> Self {
        Self::new(Type::Bottom, Type::Any)
    }

    /// Only an upper bound.
    pub fn upper(upper: Type) -> Self {
        Self::new(Type::Bottom, upper)
    }

    pub(crate) fn check_well_formed(&self) -> Result<(), ConstructionError> {
        for (which, bound) in [("lower", &self.lower), ("upper", &self.upper)] {
            bound
                .check_well_formed()
                .map_err(|reason| ConstructionError::MalformedBound { which, reason })?;
        }
        Ok(())
    }
}

impl Default for ReturnBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Widen `rettype` to cover `bounds.lower`, then narrow it into `bounds.upper`.
///
/// Narrowing an inhabited type down to `Union{}` means no value could satisfy
/// both the body and the caller, which is a construction error. A body that was
/// already inferred as `Union{}` (it always throws) is left alone.
pub fn tighten_return(rettype: &Type, bounds: &ReturnBounds) -> Result<Type, ConstructionError> {
    let mut rt = rettype.clone();
    if !is_subtype(&bounds.lower, &rt) {
        rt = type_union(&bounds.lower, &rt);
    }
    if !is_subtype(&rt, &bounds.upper) {
        let narrowed = type_intersection(&bounds.upper, &rt);
        if narrowed == Type::Bottom {
            return Err(ConstructionError::UnsatisfiableReturn {
                inferred: rettype.clone(),
                lower: bounds.lower.clone(),
                upper: bounds.upper.clone(),
            });
        }
        rt = narrowed;
    }
    Ok(rt)
}

/// Outcome of looking up or producing a specialization.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub artifact: Option<Arc<Artifact>>,
    /// Return type of `artifact` after tightening to the caller's bounds
    pub rettype: Option<Type>,
}

impl Resolution {
    fn found(artifact: Arc<Artifact>, rettype: Type) -> Self {
        Self {
            artifact: Some(artifact),
            rettype: Some(rettype),
        }
    }
}

pub(crate) struct ResolveRequest<'a> {
    pub template: &'a Arc<Template>,
    pub env_type: &'a Type,
    pub argt: &'a Type,
    pub bounds: &'a ReturnBounds,
    pub era: u64,
    pub do_compile: bool,
}

impl Engine {
    /// Global setting restricted by the template's namespace setting.
    pub fn effective_policy(&self, template: &Template) -> CompilePolicy {
        self.options().compile.restricted_by(template.namespace().compile())
    }

    /// Find a compiled specialization of `req.template` for the environment and
    /// argument types, or infer and compile one under the codegen lock.
    ///
    /// The artifact keeps its inferred return type; `req.bounds` only shape the
    /// returned `rettype`. Inference producing nothing and codegen failing both
    /// yield an empty resolution; only unsatisfiable return bounds are an error.
    pub(crate) fn resolve(&self, req: &ResolveRequest<'_>, scope: &mut RootScope) -> Result<Resolution> {
        let sig = scope.hold(signature_type(req.env_type, req.argt));
        let instance = scope.hold(self.table().get_or_create(req.template, sig));
        let policy = self.effective_policy(req.template);

        if let Some(artifact) = instance.lookup_compiled(req.era) {
            let rettype = tighten_return(&artifact.rettype(), req.bounds).map_err(ClosureError::from)?;
            debug!(target: "ocrt::resolve", signature = %instance.signature(), %rettype, "cached specialization");
            return Ok(Resolution::found(scope.hold(artifact), rettype));
        }
        if !req.do_compile {
            return Ok(Resolution::default());
        }
        if !policy.allows_specialization() {
            debug!(target: "ocrt::resolve", template = %req.template, %policy, "specialization disabled");
            return Ok(Resolution::default());
        }

        let _guard = self.lock_codegen();
        if let Some(artifact) = instance.lookup_compiled(req.era) {
            let rettype = tighten_return(&artifact.rettype(), req.bounds).map_err(ClosureError::from)?;
            debug!(target: "ocrt::resolve", signature = %instance.signature(), %rettype, "compiled while waiting for the lock");
            return Ok(Resolution::found(scope.hold(artifact), rettype));
        }

        let candidate = match instance.lookup_inferred(req.era) {
            Some(artifact) => Some(artifact),
            None => {
                self.stats().bump_inferences();
                self.inference().infer(&instance, req.era)
            }
        };
        let Some(artifact) = candidate else {
            debug!(target: "ocrt::resolve", signature = %instance.signature(), "inference produced nothing");
            return Ok(Resolution::default());
        };
        let artifact = scope.hold(artifact);

        let rettype = tighten_return(&artifact.rettype(), req.bounds).map_err(ClosureError::from)?;
        artifact.clear_const_return();

        let did_compile = self.codegen().compile(&artifact);
        if artifact.native_entry().is_none() {
            warn!(
                target: "ocrt::resolve",
                template = %req.template,
                signature = %instance.signature(),
                "no native entry after codegen; falling back to the interpreter"
            );
            return Ok(Resolution::default());
        }

        artifact.widen_to_all_eras();
        if did_compile {
            self.stats().bump_compilations();
            self.precompile_hook().record(&instance);
        }
        instance.insert(artifact.clone());
        debug!(
            target: "ocrt::resolve",
            signature = %instance.signature(),
            %rettype,
            did_compile,
            "specialization compiled"
        );
        Ok(Resolution::found(artifact, rettype))
    }
}
