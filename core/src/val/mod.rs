//! Runtime values.

use std::fmt;
use std::sync::Arc;

use crate::closure::OpaqueClosure;
use crate::method::Template;
use crate::typ::{Type, is_subtype};

#[derive(Clone)]
pub enum Val {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Tuple(Arc<[Val]>),
    /// A type used as a value, e.g. a bound passed to the builtin constructor
    Type(Type),
    Template(Arc<Template>),
    Closure(Arc<OpaqueClosure>),
}

impl Val {
    pub fn tuple(items: impl IntoIterator<Item = Val>) -> Val {
        Val::Tuple(items.into_iter().collect::<Vec<_>>().into())
    }

    /// The concrete runtime type of this value.
    pub fn type_of(&self) -> Type {
        match self {
            Val::Nil => Type::Nil,
            Val::Bool(_) => Type::Bool,
            Val::Int(_) => Type::Int,
            Val::Float(_) => Type::Float,
            Val::Str(_) => Type::String,
            Val::Tuple(items) => Type::Tuple(items.iter().map(Val::type_of).collect()),
            Val::Type(_) => Type::DataType,
            Val::Template(_) => Type::TemplateRef,
            Val::Closure(oc) => oc.runtime_type().clone(),
        }
    }

    /// `isa(value, ty)`
    pub fn isa(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Any) => true,
            (Val::Int(_), Type::Int | Type::Number) => true,
            (Val::Float(_), Type::Float | Type::Number) => true,
            _ => is_subtype(&self.type_of(), ty),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "Nil",
            Val::Bool(_) => "Bool",
            Val::Int(_) => "Int",
            Val::Float(_) => "Float",
            Val::Str(_) => "String",
            Val::Tuple(_) => "Tuple",
            Val::Type(_) => "DataType",
            Val::Template(_) => "Template",
            Val::Closure(_) => "OpaqueClosure",
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Nil, Val::Nil) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Tuple(a), Val::Tuple(b)) => a == b,
            (Val::Type(a), Val::Type(b)) => a == b,
            (Val::Template(a), Val::Template(b)) => Arc::ptr_eq(a, b),
            (Val::Closure(a), Val::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Str(s) => write!(f, "{:?}", s.as_ref()),
            Val::Template(t) => write!(f, "Template({})", t.name()),
            Val::Closure(oc) => write!(f, "{}", oc),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Nil => write!(f, "nil"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Int(i) => write!(f, "{}", i),
            Val::Float(x) => write!(f, "{:?}", x),
            Val::Str(s) => write!(f, "{}", s),
            Val::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Val::Type(t) => write!(f, "{}", t),
            Val::Template(t) => write!(f, "{}", t.name()),
            Val::Closure(oc) => write!(f, "{}", oc),
        }
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Val::Int(v)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Float(v)
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Bool(v)
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::Str(Arc::from(v))
    }
}

impl From<Type> for Val {
    fn from(v: Type) -> Self {
        Val::Type(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_values_have_tuple_types() {
        let v = Val::tuple([Val::Int(1), Val::from("a")]);
        assert_eq!(v.type_of(), Type::tuple([Type::Int, Type::String]));
        assert!(v.isa(&Type::tuple([Type::Number, Type::Any])));
        assert!(!v.isa(&Type::tuple([Type::Number])));
    }

    #[test]
    fn numbers_are_instances_of_number() {
        assert!(Val::Int(3).isa(&Type::Number));
        assert!(Val::Float(0.5).isa(&Type::Number));
        assert!(!Val::from("3").isa(&Type::Number));
        assert!(Val::Nil.isa(&Type::Any));
        assert!(!Val::Nil.isa(&Type::Bottom));
    }

    #[test]
    fn display_matches_literal_syntax() {
        assert_eq!(Val::tuple([Val::Int(1)]).to_string(), "(1,)");
        assert_eq!(Val::tuple([Val::Float(1.0), Val::from("x")]).to_string(), "(1.0, \"x\")");
    }
}
