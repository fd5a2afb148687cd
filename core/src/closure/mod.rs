//! Opaque closures: construction, entry-point selection and dispatch.

mod dispatch;
mod entry;
mod factory;
mod object;
mod resolve;
mod validate;


pub use dispatch::call;
pub use factory::{CodeBodyRequest, from_code_body, from_template, new_constant_closure, new_opaque_closure};
pub use object::{Invoke, OpaqueClosure};
pub use resolve::{ReturnBounds, tighten_return};
pub use validate::{check_argtype, valid_argtype};
