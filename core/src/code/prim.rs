use anyhow::Result;

use crate::error::ClosureError;
use crate::typ::{Type, is_subtype};
use crate::val::Val;

/// Primitive operations shared by the interpreter and compiled bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Eq,
    Not,
    Concat,
    Len,
}

impl PrimOp {
    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Add => "+",
            PrimOp::Sub => "-",
            PrimOp::Mul => "*",
            PrimOp::Div => "/",
            PrimOp::Lt => "<",
            PrimOp::Eq => "==",
            PrimOp::Not => "!",
            PrimOp::Concat => "concat",
            PrimOp::Len => "length",
        }
    }

    fn arity(self) -> Option<usize> {
        match self {
            PrimOp::Not | PrimOp::Len => Some(1),
            PrimOp::Concat => None,
            _ => Some(2),
        }
    }

    pub(crate) fn apply(self, args: &[Val]) -> Result<Val> {
        if let Some(n) = self.arity()
            && args.len() != n
        {
            return Err(ClosureError::eval(format!("{} expects {} arguments, got {}", self.name(), n, args.len())).into());
        }
        match self {
            PrimOp::Add => arith(self, &args[0], &args[1], i64::checked_add, |a, b| a + b),
            PrimOp::Sub => arith(self, &args[0], &args[1], i64::checked_sub, |a, b| a - b),
            PrimOp::Mul => arith(self, &args[0], &args[1], i64::checked_mul, |a, b| a * b),
            PrimOp::Div => match (as_float(&args[0]), as_float(&args[1])) {
                (Some(a), Some(b)) => Ok(Val::Float(a / b)),
                _ => Err(operand_error(self, &args[0], &args[1])),
            },
            PrimOp::Lt => match (&args[0], &args[1]) {
                (Val::Str(a), Val::Str(b)) => Ok(Val::Bool(a < b)),
                (a, b) => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => Ok(Val::Bool(x < y)),
                    _ => Err(operand_error(self, a, b)),
                },
            },
            PrimOp::Eq => Ok(Val::Bool(match (&args[0], &args[1]) {
                (Val::Int(a), Val::Float(b)) | (Val::Float(b), Val::Int(a)) => (*a as f64) == *b,
                (a, b) => a == b,
            })),
            PrimOp::Not => match &args[0] {
                Val::Bool(b) => Ok(Val::Bool(!b)),
                other => Err(ClosureError::eval(format!("! expects a Bool, got {}", other.type_name())).into()),
            },
            PrimOp::Concat => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        Val::Str(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                Ok(Val::from(out.as_str()))
            }
            PrimOp::Len => match &args[0] {
                Val::Tuple(items) => Ok(Val::Int(items.len() as i64)),
                Val::Str(s) => Ok(Val::Int(s.chars().count() as i64)),
                other => Err(ClosureError::eval(format!("length of {} is undefined", other.type_name())).into()),
            },
        }
    }

    /// Result type of this operation applied to arguments of the given types.
    pub(crate) fn result_type(self, args: &[Type]) -> Type {
        if args.contains(&Type::Bottom) {
            return Type::Bottom;
        }
        match self {
            PrimOp::Add | PrimOp::Sub | PrimOp::Mul => {
                let [a, b] = args else { return Type::Bottom };
                if *a == Type::Int && *b == Type::Int {
                    Type::Int
                } else if is_subtype(a, &Type::Number)
                    && is_subtype(b, &Type::Number)
                    && (*a == Type::Float || *b == Type::Float)
                {
                    Type::Float
                } else if is_subtype(a, &Type::Number) && is_subtype(b, &Type::Number) {
                    Type::Number
                } else {
                    Type::Any
                }
            }
            PrimOp::Div => Type::Float,
            PrimOp::Lt | PrimOp::Eq | PrimOp::Not => Type::Bool,
            PrimOp::Concat => Type::String,
            PrimOp::Len => Type::Int,
        }
    }
}

fn as_float(v: &Val) -> Option<f64> {
    match v {
        Val::Int(i) => Some(*i as f64),
        Val::Float(x) => Some(*x),
        _ => None,
    }
}

fn operand_error(op: PrimOp, a: &Val, b: &Val) -> anyhow::Error {
    ClosureError::eval(format!(
        "no method matching {}(::{}, ::{})",
        op.name(),
        a.type_name(),
        b.type_name()
    ))
    .into()
}

fn arith(
    op: PrimOp,
    a: &Val,
    b: &Val,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Val> {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => int_op(*x, *y)
            .map(Val::Int)
            .ok_or_else(|| ClosureError::eval(format!("integer overflow in {}", op.name())).into()),
        _ => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => Ok(Val::Float(float_op(x, y))),
            _ => Err(operand_error(op, a, b)),
        },
    }
}
