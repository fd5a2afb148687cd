use crate::error::ConstructionError;
use crate::method::Template;
use crate::typ::Type;

/// Whether `argt` is an acceptable parameter tuple type for closures over `template`.
pub fn valid_argtype(argt: &Type, template: &Template) -> bool {
    check_argtype(argt, template).is_ok()
}

/// Arity and variance check of a parameter tuple type against a template.
///
/// The `+ 1` terms account for the callee slot every template declares.
pub fn check_argtype(argt: &Type, template: &Template) -> Result<(), ConstructionError> {
    let argt = argt.unwrap_quantified();
    if !argt.is_tuple_type() {
        return Err(ConstructionError::NotTupleType(argt));
    }
    let nparams = argt.nparams();
    if !template.is_va() {
        if argt.is_va_tuple() {
            return Err(ConstructionError::VarargMismatch);
        }
        if nparams + 1 > template.nargs() {
            return Err(ConstructionError::TooManyRequired {
                nparams,
                nargs: template.nargs(),
            });
        }
    }
    if argt.fixed_len() + 1 < template.required_nargs() {
        return Err(ConstructionError::TooFewRequired {
            nparams,
            required: template.required_nargs(),
        });
    }
    Ok(())
}
