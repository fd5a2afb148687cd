//! Already-lowered code bodies and the services that run them.
//!
//! A [`CodeBody`] is the template form handed to the closure factory. The
//! interpreter walks it directly; [`ClosureCompiler`] turns it into a
//! [`NativeEntry`](crate::method::NativeEntry); [`TypeInference`] derives a
//! return type for a signature.

mod codegen;
mod infer;
mod interp;
mod prim;

use std::fmt;
use std::sync::Arc;

use crate::val::Val;

pub use codegen::{ClosureCompiler, Codegen};
pub use infer::{Inference, TypeInference, infer_return_type};
pub use interp::{Frame, bind_slots, interpret_opaque_closure};
pub use prim::PrimOp;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: Arc::from(file),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Val),
    /// Slot 0 is the callee itself, slots `1..nargs` the declared parameters.
    Slot(usize),
    /// The whole captured environment
    Env,
    /// Field `i` of a tuple environment
    Capture(usize),
    Prim(PrimOp, Vec<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    Index(Box<Expr>, usize),
    /// Call another opaque closure through the checked dispatcher
    Call(Box<Expr>, Vec<Expr>),
    Throw(Arc<str>),
    /// Run the callee's own template body in the interpreter.
    /// Only meaningful as the body of the generic wrapper method.
    InterpretCallee,
}

impl Expr {
    pub fn slot(i: usize) -> Expr {
        Expr::Slot(i)
    }

    pub fn constant(v: impl Into<Val>) -> Expr {
        Expr::Const(v.into())
    }

    pub fn prim(op: PrimOp, args: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Prim(op, args.into_iter().collect())
    }

    pub fn if_else(cond: Expr, then: Expr, els: Expr) -> Expr {
        Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    pub fn index(tuple: Expr, i: usize) -> Expr {
        Expr::Index(Box::new(tuple), i)
    }

    pub fn call(callee: Expr, args: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Call(Box::new(callee), args.into_iter().collect())
    }

    pub fn throw(message: &str) -> Expr {
        Expr::Throw(Arc::from(message))
    }

    pub fn node_count(&self) -> usize {
        1 + match self {
            Expr::Prim(_, args) | Expr::Tuple(args) => args.iter().map(Expr::node_count).sum(),
            Expr::If { cond, then, els } => cond.node_count() + then.node_count() + els.node_count(),
            Expr::Index(inner, _) => inner.node_count(),
            Expr::Call(callee, args) => callee.node_count() + args.iter().map(Expr::node_count).sum::<usize>(),
            _ => 0,
        }
    }
}

/// Template-form code of one callable body.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBody {
    pub root: Expr,
}

impl CodeBody {
    pub fn new(root: Expr) -> Self {
        Self { root }
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// A body that is a bare constant, returned without looking at its arguments.
    pub fn constant_value(&self) -> Option<&Val> {
        match &self.root {
            Expr::Const(v) => Some(v),
            _ => None,
        }
    }
}
