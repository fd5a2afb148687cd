use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::alloc::RootScope;
use crate::code::{CodeBody, Expr, SourceLocation};
use crate::engine::Engine;
use crate::era::current_era;
use crate::error::{ClosureError, ConstructionError};
use crate::method::{Artifact, Namespace, Template};
use crate::typ::{Type, signature_type};
use crate::val::Val;

use super::entry::{Entry, select_invoke};
use super::object::{Invoke, OpaqueClosure};
use super::resolve::{ResolveRequest, ReturnBounds};
use super::validate::check_argtype;

/// Everything needed to build a closure straight from a code body.
#[derive(Debug, Clone)]
pub struct CodeBodyRequest {
    pub argt: Type,
    pub bounds: ReturnBounds,
    pub namespace: Arc<Namespace>,
    pub body: CodeBody,
    pub location: Option<SourceLocation>,
    /// Declared slot count, callee included
    pub nargs: usize,
    pub is_va: bool,
    pub env: Val,
    pub do_compile: bool,
    /// `body` is already inferred; cache it as-is instead of running inference
    pub is_inferred: bool,
}

impl CodeBodyRequest {
    /// A request for a fixed-arity body taking the parameters of `argt`,
    /// compiled eagerly, with no captures and no return bounds.
    pub fn new(argt: Type, body: CodeBody) -> Self {
        let nargs = argt.unwrap_quantified().nparams() + 1;
        Self {
            argt,
            bounds: ReturnBounds::unbounded(),
            namespace: Arc::new(Namespace::new("Main")),
            body,
            location: None,
            nargs,
            is_va: false,
            env: Val::Nil,
            do_compile: true,
            is_inferred: false,
        }
    }

    pub fn bounds(mut self, bounds: ReturnBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Arc::new(namespace);
        self
    }

    pub fn location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn arity(mut self, nargs: usize, is_va: bool) -> Self {
        self.nargs = nargs;
        self.is_va = is_va;
        self
    }

    pub fn env(mut self, env: Val) -> Self {
        self.env = env;
        self
    }

    pub fn do_compile(mut self, do_compile: bool) -> Self {
        self.do_compile = do_compile;
        self
    }

    pub fn inferred(mut self, is_inferred: bool) -> Self {
        self.is_inferred = is_inferred;
        self
    }
}

fn construction(err: ConstructionError) -> anyhow::Error {
    ClosureError::from(err).into()
}

impl Engine {
    /// Build a closure over a fresh template synthesized from `req.body`.
    ///
    /// The template exists only for this closure and is pinned to the current
    /// era. An already-inferred body is cached as the specialization for the
    /// environment and argument types, valid at that era only.
    pub fn from_code_body(&self, req: CodeBodyRequest) -> Result<Arc<OpaqueClosure>> {
        let mut scope = RootScope::new();
        let era = current_era();
        let body = Arc::new(req.body);
        let template = scope.hold(Arc::new(Template::synthetic(
            req.namespace,
            req.nargs,
            req.is_va,
            body.clone(),
            req.location,
            era,
            req.is_inferred,
        )));

        if req.is_inferred {
            let sig = scope.hold(signature_type(&req.env.type_of(), &req.argt));
            let instance = scope.hold(self.table().get_or_create(&template, sig.clone()));
            let artifact = Arc::new(Artifact::new(
                template.clone(),
                sig,
                req.bounds.upper.clone(),
                Some(body),
                era,
                era,
            ));
            instance.insert(scope.hold(artifact));
            debug!(target: "ocrt::resolve", signature = %instance.signature(), "cached pre-inferred body");
        }

        self.from_template_in(&template, &req.argt, &req.bounds, req.env, era, req.do_compile, &mut scope)
    }

    /// Build a closure over an existing template.
    ///
    /// Fails when a bound is malformed, the template is invalid, or `argt` is
    /// not a tuple type compatible with the template's arity.
    pub fn from_template(
        &self,
        template: &Arc<Template>,
        argt: &Type,
        bounds: &ReturnBounds,
        env: Val,
        era: u64,
        do_compile: bool,
    ) -> Result<Arc<OpaqueClosure>> {
        let mut scope = RootScope::new();
        self.from_template_in(template, argt, bounds, env, era, do_compile, &mut scope)
    }

    #[allow(clippy::too_many_arguments)]
    fn from_template_in(
        &self,
        template: &Arc<Template>,
        argt: &Type,
        bounds: &ReturnBounds,
        env: Val,
        era: u64,
        do_compile: bool,
        scope: &mut RootScope,
    ) -> Result<Arc<OpaqueClosure>> {
        bounds.check_well_formed().map_err(construction)?;
        template
            .validate()
            .map_err(|reason| construction(ConstructionError::InvalidTemplate(reason)))?;
        check_argtype(argt, template).map_err(construction)?;

        let template = scope.hold(template.clone());
        let env = scope.hold(env);
        let env_type = scope.hold(env.type_of());
        let resolution = self.resolve(
            &ResolveRequest {
                template: &template,
                env_type: &env_type,
                argt,
                bounds,
                era,
                do_compile,
            },
            scope,
        )?;

        let Entry { invoke, mut native } = select_invoke(resolution.artifact.as_deref())?;
        let rettype = resolution.rettype.unwrap_or_else(|| bounds.upper.clone());
        let closure_type = scope.hold(Type::closure(argt.clone(), rettype.clone()));

        let policy = self.effective_policy(&template);
        if native.is_none() && policy.allows_codegen() {
            native = self.generic_wrapper(&closure_type, argt, &rettype);
        }

        debug!(
            target: "ocrt::entry",
            template = %template,
            closure_type = %closure_type,
            invoke = invoke.name(),
            native = native.is_some(),
            "opaque closure constructed"
        );
        Ok(self
            .allocator()
            .allocate(OpaqueClosure::new(template, env, era, invoke, native, closure_type)))
    }

    /// Value-level constructor: `(argt, lower, upper, template, captures...)`.
    ///
    /// Trailing values are packed into a tuple environment. Always compiles,
    /// at the current era.
    pub fn new_opaque_closure(&self, args: &[Val]) -> Result<Arc<OpaqueClosure>> {
        if args.len() < 4 {
            return Err(construction(ConstructionError::NotEnoughArguments(args.len())));
        }
        let type_arg = |position: usize| match &args[position] {
            Val::Type(t) => Ok(t.clone()),
            other => Err(construction(ConstructionError::WrongArgumentKind {
                position: position + 1,
                expected: "type",
                got: other.clone(),
            })),
        };
        let argt = type_arg(0)?;
        let bounds = ReturnBounds::new(type_arg(1)?, type_arg(2)?);
        let Val::Template(template) = &args[3] else {
            return Err(construction(ConstructionError::WrongArgumentKind {
                position: 4,
                expected: "template",
                got: args[3].clone(),
            }));
        };
        let captures = Val::tuple(args[4..].iter().cloned());
        self.from_template(template, &argt, &bounds, captures, current_era(), true)
    }

    /// A closure that returns `value` whatever it is called with.
    ///
    /// When `value` is not an instance of `upper`, calling the closure raises a
    /// type assertion error instead.
    pub fn new_constant_closure(&self, argt: &Type, upper: &Type, value: Val) -> Result<Arc<OpaqueClosure>> {
        ReturnBounds::upper(upper.clone())
            .check_well_formed()
            .map_err(construction)?;
        let params = argt.unwrap_quantified();
        if !params.is_tuple_type() {
            return Err(construction(ConstructionError::NotTupleType(params)));
        }
        let era = current_era();
        let template = Arc::new(Template::synthetic(
            Arc::new(Namespace::new("Core")),
            params.nparams() + 1,
            params.is_va_tuple(),
            Arc::new(CodeBody::new(Expr::Env)),
            None,
            era,
            true,
        ));
        let invoke = if value.isa(upper) {
            Invoke::ReturnCaptures
        } else {
            Invoke::ReturnTypeError
        };
        debug!(target: "ocrt::entry", closure_type = %upper, invoke = invoke.name(), "constant closure");
        let closure_type = Type::closure(argt.clone(), upper.clone());
        Ok(self
            .allocator()
            .allocate(OpaqueClosure::new(template, value, era, invoke, None, closure_type)))
    }
}

/// [`Engine::from_code_body`] on the process-wide engine.
pub fn from_code_body(req: CodeBodyRequest) -> Result<Arc<OpaqueClosure>> {
    Engine::global().from_code_body(req)
}

/// [`Engine::from_template`] on the process-wide engine.
pub fn from_template(
    template: &Arc<Template>,
    argt: &Type,
    bounds: &ReturnBounds,
    env: Val,
    era: u64,
    do_compile: bool,
) -> Result<Arc<OpaqueClosure>> {
    Engine::global().from_template(template, argt, bounds, env, era, do_compile)
}

/// [`Engine::new_opaque_closure`] on the process-wide engine.
pub fn new_opaque_closure(args: &[Val]) -> Result<Arc<OpaqueClosure>> {
    Engine::global().new_opaque_closure(args)
}

/// [`Engine::new_constant_closure`] on the process-wide engine.
pub fn new_constant_closure(argt: &Type, upper: &Type, value: Val) -> Result<Arc<OpaqueClosure>> {
    Engine::global().new_constant_closure(argt, upper, value)
}
