mod lattice;
mod tuple;
mod types;

#[cfg(test)]
mod lattice_test;

pub use lattice::{is_subtype, type_intersection, type_union, union_of};
pub use tuple::{length_compat, signature_type};
pub use types::Type;
