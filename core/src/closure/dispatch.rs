use std::sync::Arc;

use anyhow::Result;

use crate::error::ClosureError;
use crate::typ::length_compat;
use crate::val::Val;

use super::OpaqueClosure;

/// Call an opaque closure.
///
/// Checks the argument count and every argument's type against the declared
/// parameter tuple before anything runs; the entry's result is returned as is.
pub fn call(closure: &Arc<OpaqueClosure>, args: &[Val]) -> Result<Val> {
    let argt = closure.param_type().unwrap_quantified();
    if !length_compat(&argt, args.len()) {
        return Err(ClosureError::MethodNotApplicable {
            closure: closure.runtime_type().clone(),
            args: args.to_vec(),
        }
        .into());
    }
    for (i, arg) in args.iter().enumerate() {
        if let Some(expected) = argt.field_type(i)
            && !arg.isa(expected)
        {
            return Err(ClosureError::TypeAssertion {
                context: "opaque closure call",
                expected: expected.clone(),
                got: arg.clone(),
            }
            .into());
        }
    }
    closure.invoke(args)
}
