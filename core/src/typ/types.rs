use std::fmt;
use std::sync::Arc;

/// Structural runtime types.
///
/// Tuples model parameter lists. A `Vararg` may only appear as the last slot of a
/// tuple, either open (`len: None`) or with a fixed repeat count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Top type
    Any,
    /// The empty union; no value inhabits it
    Bottom,
    Int,
    Float,
    /// Abstract supertype of `Int` and `Float`
    Number,
    String,
    Bool,
    Nil,
    /// Type of type values
    DataType,
    /// Type of code template values
    TemplateRef,
    Tuple(Vec<Type>),
    Vararg {
        elem: Box<Type>,
        len: Option<usize>,
    },
    Union(Vec<Type>),
    /// Opaque closure type, parametric over its parameter tuple and return type
    Closure {
        params: Box<Type>,
        ret: Box<Type>,
    },
    /// Type variable bound by an enclosing `Quantified`
    Var(Arc<str>),
    /// `body where var <: upper`
    Quantified {
        var: Arc<str>,
        upper: Box<Type>,
        body: Box<Type>,
    },
}

impl Type {
    pub fn tuple(params: impl IntoIterator<Item = Type>) -> Type {
        Type::Tuple(params.into_iter().collect())
    }

    /// Open-ended variadic tail: `Vararg{elem}`.
    pub fn vararg(elem: Type) -> Type {
        Type::Vararg {
            elem: Box::new(elem),
            len: None,
        }
    }

    /// Variadic tail with a fixed repeat count: `Vararg{elem, len}`.
    pub fn vararg_n(elem: Type, len: usize) -> Type {
        Type::Vararg {
            elem: Box::new(elem),
            len: Some(len),
        }
    }

    pub fn closure(params: Type, ret: Type) -> Type {
        Type::Closure {
            params: Box::new(params),
            ret: Box::new(ret),
        }
    }

    pub fn quantified(var: &str, upper: Type, body: Type) -> Type {
        Type::Quantified {
            var: Arc::from(var),
            upper: Box::new(upper),
            body: Box::new(body),
        }
    }

    pub fn var(name: &str) -> Type {
        Type::Var(Arc::from(name))
    }

    /// Strip every outer `Quantified`, replacing its variable with the upper bound.
    pub fn unwrap_quantified(&self) -> Type {
        let mut current = self.clone();
        while let Type::Quantified { var, upper, body } = current {
            current = body.substitute(&var, &upper);
        }
        current
    }

    fn substitute(&self, name: &str, with: &Type) -> Type {
        match self {
            Type::Var(v) if v.as_ref() == name => with.clone(),
            Type::Tuple(params) => Type::Tuple(params.iter().map(|p| p.substitute(name, with)).collect()),
            Type::Vararg { elem, len } => Type::Vararg {
                elem: Box::new(elem.substitute(name, with)),
                len: *len,
            },
            Type::Union(members) => Type::Union(members.iter().map(|m| m.substitute(name, with)).collect()),
            Type::Closure { params, ret } => Type::closure(params.substitute(name, with), ret.substitute(name, with)),
            // An inner binder of the same name shadows the outer one
            Type::Quantified { var, .. } if var.as_ref() == name => self.clone(),
            Type::Quantified { var, upper, body } => Type::Quantified {
                var: var.clone(),
                upper: Box::new(upper.substitute(name, with)),
                body: Box::new(body.substitute(name, with)),
            },
            other => other.clone(),
        }
    }

    pub fn is_tuple_type(&self) -> bool {
        match self {
            Type::Tuple(_) => true,
            Type::Quantified { body, .. } => body.is_tuple_type(),
            _ => false,
        }
    }

    /// Tuple parameters, empty for non-tuple types.
    pub fn params(&self) -> &[Type] {
        match self {
            Type::Tuple(params) => params,
            _ => &[],
        }
    }

    pub fn nparams(&self) -> usize {
        self.params().len()
    }

    /// Whether the last tuple slot is a `Vararg`.
    pub fn is_va_tuple(&self) -> bool {
        matches!(self.params().last(), Some(Type::Vararg { .. }))
    }

    /// Element type and repeat count of a variadic tail, if any.
    pub fn vararg_tail(&self) -> Option<(&Type, Option<usize>)> {
        match self.params().last() {
            Some(Type::Vararg { elem, len }) => Some((elem, *len)),
            _ => None,
        }
    }

    /// Number of parameters before any variadic tail.
    pub fn fixed_len(&self) -> usize {
        self.nparams() - usize::from(self.is_va_tuple())
    }

    /// Declared type of the `i`-th actual argument, looking through a variadic tail.
    pub fn field_type(&self, i: usize) -> Option<&Type> {
        let params = self.params();
        let slot = if i >= params.len() { params.last()? } else { &params[i] };
        match slot {
            Type::Vararg { elem, .. } => Some(elem),
            _ if i >= params.len() => None,
            other => Some(other),
        }
    }

    /// A leaf type: every value of it has exactly this type.
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Int
            | Type::Float
            | Type::String
            | Type::Bool
            | Type::Nil
            | Type::DataType
            | Type::TemplateRef
            | Type::Closure { .. } => true,
            Type::Tuple(params) => params.iter().all(|p| !matches!(p, Type::Vararg { .. }) && p.is_concrete()),
            _ => false,
        }
    }

    /// Reject structurally invalid types: misplaced `Vararg`, unbound variables,
    /// and closure types whose parameters are not a tuple.
    pub fn check_well_formed(&self) -> Result<(), String> {
        self.check_in(&mut Vec::new(), false)
    }

    fn check_in(&self, bound: &mut Vec<Arc<str>>, vararg_ok: bool) -> Result<(), String> {
        match self {
            Type::Var(name) => {
                if bound.iter().any(|b| b == name) {
                    Ok(())
                } else {
                    Err(format!("unbound type variable `{}`", name))
                }
            }
            Type::Vararg { elem, .. } => {
                if !vararg_ok {
                    return Err("Vararg is only allowed as the last tuple parameter".to_string());
                }
                elem.check_in(bound, false)
            }
            Type::Tuple(params) => {
                let last = params.len().saturating_sub(1);
                for (i, p) in params.iter().enumerate() {
                    p.check_in(bound, i == last)?;
                }
                Ok(())
            }
            Type::Union(members) => members.iter().try_for_each(|m| m.check_in(bound, false)),
            Type::Closure { params, ret } => {
                if !params.is_tuple_type() {
                    return Err(format!("closure parameters must be a tuple type, got {}", params));
                }
                params.check_in(bound, false)?;
                ret.check_in(bound, false)
            }
            Type::Quantified { var, upper, body } => {
                upper.check_in(bound, false)?;
                bound.push(var.clone());
                let res = body.check_in(bound, false);
                bound.pop();
                res
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            Type::Any => write!(f, "Any"),
            Type::Bottom => write!(f, "Union{{}}"),
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Number => write!(f, "Number"),
            Type::String => write!(f, "String"),
            Type::Bool => write!(f, "Bool"),
            Type::Nil => write!(f, "Nil"),
            Type::DataType => write!(f, "DataType"),
            Type::TemplateRef => write!(f, "Template"),
            Type::Tuple(params) => {
                write!(f, "Tuple{{")?;
                list(f, params)?;
                write!(f, "}}")
            }
            Type::Vararg { elem, len: None } => write!(f, "Vararg{{{}}}", elem),
            Type::Vararg { elem, len: Some(n) } => write!(f, "Vararg{{{}, {}}}", elem, n),
            Type::Union(members) => {
                write!(f, "Union{{")?;
                list(f, members)?;
                write!(f, "}}")
            }
            Type::Closure { params, ret } => write!(f, "OpaqueClosure{{{}, {}}}", params, ret),
            Type::Var(name) => write!(f, "{}", name),
            Type::Quantified { var, upper, body } => match upper.as_ref() {
                Type::Any => write!(f, "{} where {}", body, var),
                upper => write!(f, "{} where {}<:{}", body, var, upper),
            },
        }
    }
}
