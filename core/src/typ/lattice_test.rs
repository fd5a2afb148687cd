#[cfg(test)]
mod tests {
    use crate::typ::*;

    #[test]
    fn test_subtype_primitives() {
        assert!(is_subtype(&Type::Int, &Type::Int));
        assert!(is_subtype(&Type::Int, &Type::Number));
        assert!(is_subtype(&Type::Float, &Type::Number));
        assert!(is_subtype(&Type::Number, &Type::Any));
        assert!(is_subtype(&Type::Bottom, &Type::String));
        assert!(!is_subtype(&Type::Number, &Type::Int));
        assert!(!is_subtype(&Type::String, &Type::Number));
        assert!(!is_subtype(&Type::Any, &Type::Number));
    }

    #[test]
    fn test_subtype_unions() {
        let int_or_float = union_of([Type::Int, Type::Float]);
        assert!(is_subtype(&int_or_float, &Type::Number));
        assert!(is_subtype(&Type::Int, &int_or_float));
        assert!(!is_subtype(&Type::Number, &int_or_float));
        assert!(!is_subtype(&union_of([Type::Int, Type::String]), &Type::Number));
    }

    #[test]
    fn test_subtype_tuples() {
        let ints = Type::tuple([Type::Int, Type::Int]);
        let nums = Type::tuple([Type::Number, Type::Number]);
        assert!(is_subtype(&ints, &nums));
        assert!(!is_subtype(&nums, &ints));
        assert!(!is_subtype(&Type::tuple([Type::Int]), &ints));

        let open = Type::tuple([Type::Int, Type::vararg(Type::Number)]);
        assert!(is_subtype(&Type::tuple([Type::Int]), &open));
        assert!(is_subtype(&Type::tuple([Type::Int, Type::Float, Type::Int]), &open));
        assert!(is_subtype(&Type::tuple([Type::Int, Type::vararg(Type::Int)]), &open));
        assert!(!is_subtype(&open, &Type::tuple([Type::Int, Type::Int])));
        assert!(!is_subtype(&Type::tuple([Type::vararg(Type::Int)]), &open));

        let fixed = Type::tuple([Type::vararg_n(Type::Int, 2)]);
        assert!(is_subtype(&ints, &fixed));
        assert!(is_subtype(&fixed, &ints));
    }

    #[test]
    fn test_subtype_closures() {
        let a = Type::closure(Type::tuple([Type::Int]), Type::Int);
        let b = Type::closure(Type::tuple([Type::Int]), Type::Number);
        let c = Type::closure(Type::tuple([Type::Number]), Type::Int);
        assert!(is_subtype(&a, &b));
        assert!(!is_subtype(&b, &a));
        assert!(!is_subtype(&a, &c));
    }

    #[test]
    fn test_quantified_types_unwrap_to_bounds() {
        let q = Type::quantified("T", Type::Number, Type::tuple([Type::var("T")]));
        assert_eq!(q.unwrap_quantified(), Type::tuple([Type::Number]));
        assert!(is_subtype(&Type::tuple([Type::Int]), &q));
        assert!(q.is_tuple_type());
    }

    #[test]
    fn test_union_normalization() {
        assert_eq!(type_union(&Type::Int, &Type::Number), Type::Number);
        assert_eq!(type_union(&Type::Bottom, &Type::String), Type::String);
        assert_eq!(
            type_union(&Type::Float, &Type::Int),
            Type::Union(vec![Type::Int, Type::Float])
        );
        assert_eq!(
            union_of([Type::String, union_of([Type::Int, Type::String]), Type::Bottom]),
            Type::Union(vec![Type::Int, Type::String])
        );
        assert_eq!(union_of([]), Type::Bottom);
    }

    #[test]
    fn test_intersection() {
        assert_eq!(type_intersection(&Type::Int, &Type::Number), Type::Int);
        assert_eq!(type_intersection(&Type::String, &Type::Number), Type::Bottom);
        assert_eq!(
            type_intersection(&union_of([Type::Int, Type::String]), &Type::Number),
            Type::Int
        );
        assert_eq!(
            type_intersection(
                &Type::tuple([Type::Any, Type::Number]),
                &Type::tuple([Type::Int, Type::Any])
            ),
            Type::tuple([Type::Int, Type::Number])
        );
        assert_eq!(
            type_intersection(&Type::tuple([Type::Int]), &Type::tuple([Type::Int, Type::Int])),
            Type::Bottom
        );
        assert_eq!(
            type_intersection(
                &Type::tuple([Type::vararg(Type::Number)]),
                &Type::tuple([Type::Any, Type::Int])
            ),
            Type::tuple([Type::Number, Type::Int])
        );
    }

    #[test]
    fn test_well_formedness() {
        assert!(Type::tuple([Type::Int, Type::vararg(Type::Int)]).check_well_formed().is_ok());
        assert!(Type::tuple([Type::vararg(Type::Int), Type::Int]).check_well_formed().is_err());
        assert!(Type::vararg(Type::Int).check_well_formed().is_err());
        assert!(Type::var("T").check_well_formed().is_err());
        assert!(
            Type::quantified("T", Type::Any, Type::tuple([Type::var("T")]))
                .check_well_formed()
                .is_ok()
        );
        assert!(Type::closure(Type::Int, Type::Int).check_well_formed().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Type::tuple([Type::Int, Type::vararg(Type::Float)]).to_string(),
            "Tuple{Int, Vararg{Float}}"
        );
        assert_eq!(Type::Bottom.to_string(), "Union{}");
        assert_eq!(
            Type::closure(Type::tuple([Type::Int]), Type::Number).to_string(),
            "OpaqueClosure{Tuple{Int}, Number}"
        );
    }

    #[test]
    fn test_field_types_look_through_vararg() {
        let argt = Type::tuple([Type::String, Type::vararg(Type::Int)]);
        assert_eq!(argt.field_type(0), Some(&Type::String));
        assert_eq!(argt.field_type(1), Some(&Type::Int));
        assert_eq!(argt.field_type(7), Some(&Type::Int));
        assert_eq!(Type::tuple([Type::Int]).field_type(1), None);
        assert_eq!(argt.fixed_len(), 1);
    }
}
