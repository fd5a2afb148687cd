use std::fmt;

use crate::typ::Type;
use crate::val::Val;

/// Why a closure could not be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructionError {
    NotTupleType(Type),
    MalformedBound { which: &'static str, reason: String },
    InvalidTemplate(String),
    VarargMismatch,
    TooManyRequired { nparams: usize, nargs: usize },
    TooFewRequired { nparams: usize, required: usize },
    /// Narrowing the inferred return type to the upper bound left nothing
    UnsatisfiableReturn { inferred: Type, lower: Type, upper: Type },
    NotEnoughArguments(usize),
    WrongArgumentKind { position: usize, expected: &'static str, got: Val },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::NotTupleType(t) => {
                write!(f, "OpaqueClosure argument tuple must be a tuple type, got {}", t)
            }
            ConstructionError::MalformedBound { which, reason } => {
                write!(f, "malformed {} return bound: {}", which, reason)
            }
            ConstructionError::InvalidTemplate(reason) => write!(f, "invalid code template: {}", reason),
            ConstructionError::VarargMismatch => write!(f, "Argument type tuple is vararg but method is not"),
            ConstructionError::TooManyRequired { nparams, nargs } => write!(
                f,
                "Argument type tuple has too many required arguments for method ({} + callee > {})",
                nparams, nargs
            ),
            ConstructionError::TooFewRequired { nparams, required } => write!(
                f,
                "Argument type tuple has too few required arguments for method ({} + callee < {})",
                nparams, required
            ),
            ConstructionError::UnsatisfiableReturn { inferred, lower, upper } => write!(
                f,
                "inferred return type {} cannot be narrowed into bounds [{}, {}]",
                inferred, lower, upper
            ),
            ConstructionError::NotEnoughArguments(n) => {
                write!(f, "new_opaque_closure: Not enough arguments (got {}, need at least 4)", n)
            }
            ConstructionError::WrongArgumentKind { position, expected, got } => write!(
                f,
                "new_opaque_closure: argument {} must be a {}, got {}",
                position,
                expected,
                got.type_name()
            ),
        }
    }
}

/// Errors raised by closure construction and invocation.
///
/// Library functions return `anyhow::Result`; these are the root causes and can
/// be recovered with `downcast_ref::<ClosureError>()`.
#[derive(Debug, Clone)]
pub enum ClosureError {
    Construction(ConstructionError),
    /// Argument count does not fit the closure's parameter tuple
    MethodNotApplicable { closure: Type, args: Vec<Val> },
    TypeAssertion { context: &'static str, expected: Type, got: Val },
    /// A resolved artifact uses a calling convention closures cannot adopt
    UnsupportedEntry(&'static str),
    /// Raised by a code body while running
    Eval(String),
}

impl ClosureError {
    pub fn eval(message: impl Into<String>) -> Self {
        ClosureError::Eval(message.into())
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, ClosureError::Construction(_))
    }
}

impl From<ConstructionError> for ClosureError {
    fn from(err: ConstructionError) -> Self {
        ClosureError::Construction(err)
    }
}

impl fmt::Display for ClosureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureError::Construction(err) => write!(f, "{}", err),
            ClosureError::MethodNotApplicable { closure, args } => {
                write!(f, "MethodError: no method matching ({})(", closure)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "::{}", arg.type_of())?;
                }
                write!(f, ")")
            }
            ClosureError::TypeAssertion { context, expected, got } => write!(
                f,
                "TypeError: in {}, expected {}, got a value of type {}",
                context,
                expected,
                got.type_of()
            ),
            ClosureError::UnsupportedEntry(conv) => {
                write!(f, "internal error: opaque closures cannot use the {} calling convention", conv)
            }
            ClosureError::Eval(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ClosureError {}
