use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::code::interpret_opaque_closure;
use crate::error::ClosureError;
use crate::method::{NativeEntry, Template};
use crate::typ::Type;
use crate::val::Val;

/// Entry an opaque closure forwards its calls to.
#[derive(Debug, Clone)]
pub enum Invoke {
    /// Walk the template body
    Interpreter,
    Native(NativeEntry),
    /// Hand back the captured value without running anything
    ReturnCaptures,
    /// The captured value violates the declared return type
    ReturnTypeError,
}

impl Invoke {
    pub fn name(&self) -> &'static str {
        match self {
            Invoke::Interpreter => "interpreter",
            Invoke::Native(_) => "native",
            Invoke::ReturnCaptures => "constant",
            Invoke::ReturnTypeError => "constant type error",
        }
    }
}

static ANY: Type = Type::Any;

/// A callable value pairing a captured environment with a resolved entry point.
///
/// Immutable once allocated. Holds its template and environment for as long
/// as it lives.
pub struct OpaqueClosure {
    template: Arc<Template>,
    captures: Val,
    era: u64,
    invoke: Invoke,
    native: Option<NativeEntry>,
    ty: Type,
}

impl OpaqueClosure {
    pub(crate) fn new(
        template: Arc<Template>,
        captures: Val,
        era: u64,
        invoke: Invoke,
        native: Option<NativeEntry>,
        ty: Type,
    ) -> Self {
        Self {
            template,
            captures,
            era,
            invoke,
            native,
            ty,
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn captures(&self) -> &Val {
        &self.captures
    }

    /// Era the closure was created in.
    pub fn era(&self) -> u64 {
        self.era
    }

    /// `OpaqueClosure{params, ret}`
    pub fn runtime_type(&self) -> &Type {
        &self.ty
    }

    /// Declared parameter tuple type.
    pub fn param_type(&self) -> &Type {
        match &self.ty {
            Type::Closure { params, .. } => params.as_ref(),
            other => other,
        }
    }

    pub fn return_type(&self) -> &Type {
        match &self.ty {
            Type::Closure { ret, .. } => ret.as_ref(),
            _ => &ANY,
        }
    }

    pub fn invoke_kind(&self) -> &Invoke {
        &self.invoke
    }

    /// Raw native entry, when one was resolved or synthesized.
    pub fn native_entry(&self) -> Option<&NativeEntry> {
        self.native.as_ref()
    }

    pub(crate) fn invoke(self: &Arc<Self>, args: &[Val]) -> Result<Val> {
        match &self.invoke {
            Invoke::Interpreter => interpret_opaque_closure(self, args),
            Invoke::Native(entry) => entry.call(self, args),
            Invoke::ReturnCaptures => Ok(self.captures.clone()),
            Invoke::ReturnTypeError => Err(ClosureError::TypeAssertion {
                context: "OpaqueClosure",
                expected: self.return_type().clone(),
                got: self.captures.clone(),
            }
            .into()),
        }
    }
}

impl fmt::Debug for OpaqueClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueClosure")
            .field("template", &self.template.name())
            .field("type", &self.ty)
            .field("era", &self.era)
            .field("invoke", &self.invoke.name())
            .field("native", &self.native.is_some())
            .finish()
    }
}

impl fmt::Display for OpaqueClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}::{})", self.param_type(), self.return_type())?;
        if let Some(loc) = self.template.location() {
            write!(f, "@{}", loc)?;
        }
        Ok(())
    }
}
