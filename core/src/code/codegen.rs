use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::ClosureError;
use crate::method::{Artifact, CallConv, NativeEntry, Template};
use crate::typ::Type;
use crate::val::Val;

use super::interp::{call_value, index, interpret_opaque_closure, truthy};
use super::{Expr, Frame};

/// Native code generation service.
pub trait Codegen: Send + Sync {
    /// Install a native entry on `artifact`. Returns whether this call did the work;
    /// success is observed through [`Artifact::native_entry`].
    fn compile(&self, artifact: &Artifact) -> bool;
}

type Node = Box<dyn Fn(&Frame<'_>) -> Result<Val> + Send + Sync>;

/// Compiles a code body into a tree of Rust closures, resolving the shape of
/// every node once instead of on each call.
#[derive(Debug, Clone)]
pub struct ClosureCompiler {
    max_nodes: usize,
}

impl ClosureCompiler {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Build the native entry for an artifact without installing it.
    /// `None` when the body is too large to compile.
    pub fn lower(&self, artifact: &Artifact) -> Option<NativeEntry> {
        let (template, body) = self.lower_body(artifact)?;
        Some(general_entry(template, body))
    }

    fn lower_body(&self, artifact: &Artifact) -> Option<(Arc<Template>, Arc<Node>)> {
        let template = artifact.template().clone();
        let source = artifact.source().cloned().unwrap_or_else(|| template.body().clone());
        let nodes = source.node_count();
        if nodes > self.max_nodes {
            warn!(
                target: "ocrt::codegen",
                template = %template.name(),
                nodes,
                limit = self.max_nodes,
                "body too large for native code; leaving it to the interpreter"
            );
            return None;
        }
        let body = Arc::new(lower_expr(&source.root));
        debug!(target: "ocrt::codegen", template = %template.name(), signature = %artifact.signature(), nodes, "lowered");
        Some((template, body))
    }
}

fn general_entry(template: Arc<Template>, body: Arc<Node>) -> NativeEntry {
    NativeEntry::new(move |oc, args| {
        let frame = Frame::new(&template, oc, args)?;
        body(&frame)
    })
}

/// Invoke adapter for a signature whose argument types are all concrete.
///
/// The argument count is fixed by the signature, so the slot layout is worked
/// out here once. Calls bind slots by position without consulting the template.
fn specialized_adapter(template: &Template, signature: &Type, body: Arc<Node>) -> NativeEntry {
    let arity = signature.nparams().saturating_sub(1);
    let split = if template.is_va() {
        template.nargs().saturating_sub(2).min(arity)
    } else {
        arity
    };
    let packs_tail = template.is_va();
    NativeEntry::new(move |oc, args| {
        if args.len() != arity {
            return Err(ClosureError::eval(format!("specialized entry takes {} arguments, got {}", arity, args.len())).into());
        }
        let mut slots = Vec::with_capacity(split + 2);
        slots.push(Val::Closure(oc.clone()));
        slots.extend_from_slice(&args[..split]);
        if packs_tail {
            slots.push(Val::tuple(args[split..].iter().cloned()));
        }
        body(&Frame { callee: oc, args, slots })
    })
}

impl Default for ClosureCompiler {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl Codegen for ClosureCompiler {
    fn compile(&self, artifact: &Artifact) -> bool {
        if artifact.native_entry().is_some() {
            return false;
        }
        let Some((template, body)) = self.lower_body(artifact) else {
            return false;
        };
        let signature = artifact.signature();
        let conv = if signature.params().iter().all(Type::is_concrete) {
            CallConv::Specialized(specialized_adapter(&template, signature, body.clone()))
        } else {
            CallConv::Args
        };
        artifact.install_native(general_entry(template, body), conv)
    }
}

fn node<F>(f: F) -> Node
where
    F: Fn(&Frame<'_>) -> Result<Val> + Send + Sync + 'static,
{
    Box::new(f)
}

fn lower_all(exprs: &[Expr]) -> Vec<Node> {
    exprs.iter().map(lower_expr).collect()
}

fn run_all(nodes: &[Node], frame: &Frame<'_>) -> Result<Vec<Val>> {
    nodes.iter().map(|n| n(frame)).collect()
}

fn lower_expr(expr: &Expr) -> Node {
    match expr {
        Expr::Const(v) => {
            let v = v.clone();
            node(move |_| Ok(v.clone()))
        }
        Expr::Slot(i) => {
            let i = *i;
            node(move |f| f.slot(i))
        }
        Expr::Env => node(|f| Ok(f.callee.captures().clone())),
        Expr::Capture(i) => {
            let i = *i;
            node(move |f| f.capture(i))
        }
        Expr::Prim(op, args) => {
            let op = *op;
            if let [lhs, rhs] = args.as_slice() {
                let (lhs, rhs) = (lower_expr(lhs), lower_expr(rhs));
                return node(move |f| op.apply(&[lhs(f)?, rhs(f)?]));
            }
            let args = lower_all(args);
            node(move |f| op.apply(&run_all(&args, f)?))
        }
        Expr::If { cond, then, els } => {
            let (cond, then, els) = (lower_expr(cond), lower_expr(then), lower_expr(els));
            node(move |f| if truthy(&cond(f)?)? { then(f) } else { els(f) })
        }
        Expr::Tuple(items) => {
            let items = lower_all(items);
            node(move |f| Ok(Val::tuple(run_all(&items, f)?)))
        }
        Expr::Index(inner, i) => {
            let (inner, i) = (lower_expr(inner), *i);
            node(move |f| index(&inner(f)?, i))
        }
        Expr::Call(callee, args) => {
            let (callee, args) = (lower_expr(callee), lower_all(args));
            node(move |f| call_value(&callee(f)?, &run_all(&args, f)?))
        }
        Expr::Throw(message) => {
            let message = message.clone();
            node(move |_| Err(ClosureError::eval(message.to_string()).into()))
        }
        Expr::InterpretCallee => node(|f| interpret_opaque_closure(f.callee, f.args)),
    }
}
