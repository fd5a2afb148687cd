use super::Type;

/// Prefix `head` to the parameters of the tuple type `argt`.
///
/// Used both for specialization keys (`head` is the captured environment type)
/// and for generic wrapper signatures (`head` is the closure's own type).
pub fn signature_type(head: &Type, argt: &Type) -> Type {
    let argt = argt.unwrap_quantified();
    let mut params = Vec::with_capacity(argt.nparams() + 1);
    params.push(head.clone());
    params.extend(argt.params().iter().cloned());
    Type::Tuple(params)
}

/// Whether `nargs` actual arguments fit the parameter tuple type `v`.
pub fn length_compat(v: &Type, nargs: usize) -> bool {
    let v = v.unwrap_quantified();
    debug_assert!(v.is_tuple_type());
    let nparams = v.nparams();
    if nparams == 0 {
        return nargs == 0;
    }
    match v.vararg_tail() {
        Some((_, Some(len))) => nargs == nparams - 1 + len,
        Some((_, None)) => nargs >= nparams - 1,
        None => nargs == nparams,
    }
}
