use std::sync::Arc;

use tracing::debug;

use crate::method::{Artifact, CallConv, MethodInstance, Template};
use crate::typ::{Type, type_union};

use super::{CodeBody, Expr};

/// Inference service.
///
/// Returns a fresh artifact carrying its source, valid at `era` only. The
/// instance cache is left alone; callers insert the artifact once it compiles.
pub trait Inference: Send + Sync {
    fn infer(&self, instance: &Arc<MethodInstance>, era: u64) -> Option<Arc<Artifact>>;
}

/// Abstract interpretation of a [`CodeBody`] over the type lattice.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeInference;

impl Inference for TypeInference {
    fn infer(&self, instance: &Arc<MethodInstance>, era: u64) -> Option<Arc<Artifact>> {
        let sig = instance.signature();
        if !sig.is_tuple_type() {
            return None;
        }
        let template = instance.template();
        let source = template.body().clone();
        let rettype = infer_return_type(template, sig, &source);
        debug!(
            target: "ocrt::infer",
            template = %template.name(),
            signature = %sig,
            rettype = %rettype,
            "inferred"
        );

        let mut artifact = Artifact::new(template.clone(), sig.clone(), rettype, Some(source.clone()), era, era);
        if let Some(value) = source.constant_value() {
            artifact = artifact.with_invoke(CallConv::ConstReturn(value.clone()));
        }
        Some(Arc::new(artifact))
    }
}

/// Return type of `body` when `template` is called with signature `sig`
/// (environment type first, then the argument types).
pub fn infer_return_type(template: &Template, sig: &Type, body: &CodeBody) -> Type {
    let sig = sig.unwrap_quantified();
    let env = sig.params().first().cloned().unwrap_or(Type::Any);
    let argt = Type::Tuple(sig.params().iter().skip(1).cloned().collect());
    let cx = InferCx {
        env,
        slots: slot_types(template, &argt),
    };
    cx.infer(&body.root)
}

fn slot_types(template: &Template, argt: &Type) -> Vec<Type> {
    let declared = template.nargs().saturating_sub(1);
    let mut slots = Vec::with_capacity(declared + 1);
    slots.push(Type::Any);

    let field = |i: usize| argt.field_type(i).cloned().unwrap_or(Type::Bottom);
    if template.is_va() {
        let fixed = declared.saturating_sub(1);
        slots.extend((0..fixed).map(field));
        let params = argt.params();
        let fixed_len = argt.fixed_len();
        let rest = if fixed <= fixed_len {
            params[fixed..].to_vec()
        } else {
            match argt.vararg_tail() {
                Some((elem, None)) => vec![Type::vararg(elem.clone())],
                Some((elem, Some(n))) => vec![Type::vararg_n(elem.clone(), n.saturating_sub(fixed - fixed_len))],
                None => Vec::new(),
            }
        };
        slots.push(Type::Tuple(rest));
    } else {
        slots.extend((0..declared).map(field));
    }
    slots
}

struct InferCx {
    env: Type,
    slots: Vec<Type>,
}

impl InferCx {
    fn infer(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Const(v) => v.type_of(),
            Expr::Slot(i) => self.slots.get(*i).cloned().unwrap_or(Type::Bottom),
            Expr::Env => self.env.clone(),
            Expr::Capture(i) => match &self.env {
                Type::Any => Type::Any,
                Type::Nil => Type::Bottom,
                env if env.is_tuple_type() => env.field_type(*i).cloned().unwrap_or(Type::Bottom),
                env if *i == 0 => env.clone(),
                _ => Type::Bottom,
            },
            Expr::Prim(op, args) => {
                let types: Vec<Type> = args.iter().map(|a| self.infer(a)).collect();
                op.result_type(&types)
            }
            Expr::If { cond, then, els } => {
                if self.infer(cond) == Type::Bottom {
                    return Type::Bottom;
                }
                type_union(&self.infer(then), &self.infer(els))
            }
            Expr::Tuple(items) => {
                let types: Vec<Type> = items.iter().map(|a| self.infer(a)).collect();
                if types.contains(&Type::Bottom) {
                    Type::Bottom
                } else {
                    Type::Tuple(types)
                }
            }
            Expr::Index(inner, i) => match self.infer(inner).unwrap_quantified() {
                Type::Bottom => Type::Bottom,
                t @ Type::Tuple(_) => t.field_type(*i).cloned().unwrap_or(Type::Bottom),
                _ => Type::Any,
            },
            Expr::Call(callee, args) => {
                let arg_types: Vec<Type> = args.iter().map(|a| self.infer(a)).collect();
                match self.infer(callee) {
                    _ if arg_types.contains(&Type::Bottom) => Type::Bottom,
                    Type::Bottom => Type::Bottom,
                    Type::Closure { ret, .. } => *ret,
                    _ => Type::Any,
                }
            }
            Expr::Throw(_) => Type::Bottom,
            Expr::InterpretCallee => Type::Any,
        }
    }
}
