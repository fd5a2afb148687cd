//! Opaque closure runtime: builds closures over code templates, resolves a
//! specialized or generic entry point for each, and dispatches calls to them.

pub mod alloc;
pub mod closure;
pub mod code;
pub mod config;
pub mod engine;
pub mod era;
pub mod error;
pub mod hooks;
pub mod method;
pub mod typ;
pub mod util;
pub mod val;

pub use closure::{CodeBodyRequest, OpaqueClosure, ReturnBounds, call, valid_argtype};
pub use config::{CompilePolicy, RuntimeOptions};
pub use engine::{Engine, EngineBuilder};
pub use error::{ClosureError, ConstructionError};
pub use typ::Type;
pub use val::Val;
