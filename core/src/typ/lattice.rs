//! Subtyping, union and intersection over [`Type`].
//!
//! Free type variables left after unwrapping behave like `Any`.

use std::borrow::Cow;

use crate::util::fast_map::fast_hash_set_with_capacity;

use super::Type;

fn unwrapped(t: &Type) -> Cow<'_, Type> {
    match t {
        Type::Quantified { .. } => Cow::Owned(t.unwrap_quantified()),
        _ => Cow::Borrowed(t),
    }
}

/// `a <: b`
pub fn is_subtype(a: &Type, b: &Type) -> bool {
    let a = unwrapped(a);
    let b = unwrapped(b);
    subtype(&a, &b)
}

fn subtype(a: &Type, b: &Type) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Type::Bottom, _) | (_, Type::Any) | (_, Type::Var(_)) => true,
        (Type::Var(_), _) => false,
        (Type::Union(xs), _) => xs.iter().all(|x| subtype(x, b)),
        (_, Type::Union(ys)) => ys.iter().any(|y| subtype(a, y)),
        (Type::Int | Type::Float, Type::Number) => true,
        (Type::Tuple(xs), Type::Tuple(ys)) => tuple_subtype(xs, ys),
        (Type::Vararg { elem: e1, len: l1 }, Type::Vararg { elem: e2, len: l2 }) => {
            (l2.is_none() || l1 == l2) && subtype(e1, e2)
        }
        (
            Type::Closure { params: p1, ret: r1 },
            Type::Closure { params: p2, ret: r2 },
        ) => subtype(p1, p2) && subtype(p2, p1) && subtype(r1, r2),
        _ => false,
    }
}

/// Split tuple parameters into the fixed prefix and an open tail element,
/// expanding fixed-length tails into the prefix.
fn split_tuple(params: &[Type]) -> (Cow<'_, [Type]>, Option<&Type>) {
    match params.last() {
        Some(Type::Vararg { elem, len: Some(n) }) => {
            let mut fixed = params[..params.len() - 1].to_vec();
            fixed.extend(std::iter::repeat_n(elem.as_ref().clone(), *n));
            (Cow::Owned(fixed), None)
        }
        Some(Type::Vararg { elem, len: None }) => (Cow::Borrowed(&params[..params.len() - 1]), Some(elem)),
        _ => (Cow::Borrowed(params), None),
    }
}

fn tuple_subtype(xs: &[Type], ys: &[Type]) -> bool {
    let (a_fixed, a_tail) = split_tuple(xs);
    let (b_fixed, b_tail) = split_tuple(ys);

    if a_fixed.len() < b_fixed.len() {
        // An open tail on the left may be empty, so it cannot cover required slots
        return false;
    }
    for (i, a) in a_fixed.iter().enumerate() {
        let target = match b_fixed.get(i) {
            Some(t) => t,
            None => match b_tail {
                Some(t) => t,
                None => return false,
            },
        };
        if !subtype(a, target) {
            return false;
        }
    }
    match (a_tail, b_tail) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => subtype(a, b),
    }
}

fn union_members(t: Type, out: &mut Vec<Type>) {
    match t {
        Type::Union(members) => {
            for m in members {
                union_members(m, out);
            }
        }
        Type::Bottom => {}
        other => out.push(other),
    }
}

fn rank(t: &Type) -> u8 {
    match t {
        Type::Any => 0,
        Type::Number => 1,
        Type::Int => 2,
        Type::Float => 3,
        Type::String => 4,
        Type::Bool => 5,
        Type::Nil => 6,
        Type::DataType => 7,
        Type::TemplateRef => 8,
        Type::Tuple(_) => 9,
        Type::Closure { .. } => 10,
        _ => 11,
    }
}

/// Build a canonical union: nested unions flattened, `Bottom` dropped,
/// members subsumed by another member removed, members ordered.
pub fn union_of(members: impl IntoIterator<Item = Type>) -> Type {
    let mut flat = Vec::new();
    for m in members {
        union_members(unwrapped(&m).into_owned(), &mut flat);
    }

    let mut seen = fast_hash_set_with_capacity(flat.len());
    flat.retain(|t| seen.insert(t.clone()));

    let mut kept: Vec<Type> = Vec::with_capacity(flat.len());
    for (i, t) in flat.iter().enumerate() {
        let subsumed = flat
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && subtype(t, other) && !(subtype(other, t) && j > i));
        if !subsumed {
            kept.push(t.clone());
        }
    }

    match kept.len() {
        0 => Type::Bottom,
        1 => kept.pop().unwrap_or(Type::Bottom),
        _ => {
            kept.sort_by_cached_key(|t| (rank(t), t.to_string()));
            Type::Union(kept)
        }
    }
}

/// Least upper bound of two types (as far as this lattice can express it).
pub fn type_union(a: &Type, b: &Type) -> Type {
    if is_subtype(a, b) {
        return b.clone();
    }
    if is_subtype(b, a) {
        return a.clone();
    }
    union_of([a.clone(), b.clone()])
}

/// Greatest lower bound; `Bottom` when the two types share no values.
pub fn type_intersection(a: &Type, b: &Type) -> Type {
    let a = unwrapped(a);
    let b = unwrapped(b);
    intersect(&a, &b)
}

fn intersect(a: &Type, b: &Type) -> Type {
    if subtype(a, b) {
        return a.clone();
    }
    if subtype(b, a) {
        return b.clone();
    }
    match (a, b) {
        (Type::Union(xs), _) => union_of(xs.iter().map(|x| intersect(x, b))),
        (_, Type::Union(ys)) => union_of(ys.iter().map(|y| intersect(a, y))),
        (Type::Tuple(xs), Type::Tuple(ys)) => tuple_intersection(xs, ys),
        (
            Type::Closure { params: p1, ret: r1 },
            Type::Closure { params: p2, ret: r2 },
        ) if subtype(p1, p2) && subtype(p2, p1) => Type::closure(p1.as_ref().clone(), intersect(r1, r2)),
        _ => Type::Bottom,
    }
}

fn tuple_intersection(xs: &[Type], ys: &[Type]) -> Type {
    let (a_fixed, a_tail) = split_tuple(xs);
    let (b_fixed, b_tail) = split_tuple(ys);
    let width = a_fixed.len().max(b_fixed.len());

    let slot = |fixed: &[Type], tail: Option<&Type>, i: usize| -> Option<Type> {
        fixed.get(i).cloned().or_else(|| tail.cloned())
    };

    let mut params = Vec::with_capacity(width + 1);
    for i in 0..width {
        let (Some(a), Some(b)) = (slot(&a_fixed, a_tail, i), slot(&b_fixed, b_tail, i)) else {
            // One side has a fixed length shorter than the other requires
            return Type::Bottom;
        };
        let t = intersect(&a, &b);
        if t == Type::Bottom {
            return Type::Bottom;
        }
        params.push(t);
    }
    if let (Some(a), Some(b)) = (a_tail, b_tail) {
        let t = intersect(a, b);
        if t != Type::Bottom {
            params.push(Type::vararg(t));
        }
    }
    Type::Tuple(params)
}
