use std::sync::Arc;

use anyhow::Result;

use crate::closure::{OpaqueClosure, call};
use crate::error::ClosureError;
use crate::method::Template;
use crate::val::Val;

use super::Expr;

/// Activation of one code body.
pub struct Frame<'a> {
    pub callee: &'a Arc<OpaqueClosure>,
    /// Actual arguments as passed to the closure
    pub args: &'a [Val],
    pub slots: Vec<Val>,
}

impl<'a> Frame<'a> {
    pub fn new(template: &Template, callee: &'a Arc<OpaqueClosure>, args: &'a [Val]) -> Result<Self> {
        let slots = bind_slots(template, callee, args)?;
        Ok(Self { callee, args, slots })
    }

    pub(crate) fn slot(&self, i: usize) -> Result<Val> {
        self.slots
            .get(i)
            .cloned()
            .ok_or_else(|| ClosureError::eval(format!("slot {} is not bound", i)).into())
    }

    pub(crate) fn capture(&self, i: usize) -> Result<Val> {
        match self.callee.captures() {
            Val::Tuple(items) => items
                .get(i)
                .cloned()
                .ok_or_else(|| ClosureError::eval(format!("captured environment has no field {}", i)).into()),
            Val::Nil => Err(ClosureError::eval("closure captured nothing").into()),
            other if i == 0 => Ok(other.clone()),
            _ => Err(ClosureError::eval(format!("captured environment has no field {}", i)).into()),
        }
    }
}

/// Lay out the callee and arguments in the slots a template expects.
///
/// For a variadic template the last declared slot receives a tuple of every
/// argument past the fixed ones.
pub fn bind_slots(template: &Template, callee: &Arc<OpaqueClosure>, args: &[Val]) -> Result<Vec<Val>> {
    let declared = template.nargs().saturating_sub(1);
    let mut slots = Vec::with_capacity(template.nargs());
    slots.push(Val::Closure(callee.clone()));
    if template.is_va() {
        let fixed = declared.saturating_sub(1);
        if args.len() < fixed {
            return Err(ClosureError::eval(format!(
                "{} requires at least {} arguments, got {}",
                template.name(),
                fixed,
                args.len()
            ))
            .into());
        }
        slots.extend_from_slice(&args[..fixed]);
        slots.push(Val::tuple(args[fixed..].iter().cloned()));
    } else {
        if args.len() != declared {
            return Err(ClosureError::eval(format!(
                "{} requires {} arguments, got {}",
                template.name(),
                declared,
                args.len()
            ))
            .into());
        }
        slots.extend_from_slice(args);
    }
    Ok(slots)
}

/// Interpreter trampoline: run the closure's template body by walking it.
pub fn interpret_opaque_closure(callee: &Arc<OpaqueClosure>, args: &[Val]) -> Result<Val> {
    let template = callee.template();
    let frame = Frame::new(template, callee, args)?;
    eval(&template.body().root, &frame)
}

pub(crate) fn truthy(v: &Val) -> Result<bool> {
    match v {
        Val::Bool(b) => Ok(*b),
        other => Err(ClosureError::eval(format!("non-boolean ({}) used in boolean context", other.type_name())).into()),
    }
}

pub(crate) fn index(v: &Val, i: usize) -> Result<Val> {
    match v {
        Val::Tuple(items) => items.get(i).cloned().ok_or_else(|| {
            ClosureError::eval(format!("BoundsError: index {} of tuple of length {}", i, items.len())).into()
        }),
        other => Err(ClosureError::eval(format!("cannot index a {}", other.type_name())).into()),
    }
}

pub(crate) fn call_value(callee: &Val, args: &[Val]) -> Result<Val> {
    match callee {
        Val::Closure(oc) => call(oc, args),
        other => Err(ClosureError::eval(format!("objects of type {} are not callable", other.type_name())).into()),
    }
}

fn eval_all(exprs: &[Expr], frame: &Frame<'_>) -> Result<Vec<Val>> {
    exprs.iter().map(|e| eval(e, frame)).collect()
}

fn eval(expr: &Expr, frame: &Frame<'_>) -> Result<Val> {
    match expr {
        Expr::Const(v) => Ok(v.clone()),
        Expr::Slot(i) => frame.slot(*i),
        Expr::Env => Ok(frame.callee.captures().clone()),
        Expr::Capture(i) => frame.capture(*i),
        Expr::Prim(op, args) => op.apply(&eval_all(args, frame)?),
        Expr::If { cond, then, els } => {
            if truthy(&eval(cond, frame)?)? {
                eval(then, frame)
            } else {
                eval(els, frame)
            }
        }
        Expr::Tuple(items) => Ok(Val::tuple(eval_all(items, frame)?)),
        Expr::Index(inner, i) => index(&eval(inner, frame)?, *i),
        Expr::Call(callee, args) => {
            let callee = eval(callee, frame)?;
            call_value(&callee, &eval_all(args, frame)?)
        }
        Expr::Throw(message) => Err(ClosureError::eval(message.to_string()).into()),
        Expr::InterpretCallee => interpret_opaque_closure(frame.callee, frame.args),
    }
}
