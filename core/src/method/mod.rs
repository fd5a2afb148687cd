//! Templates, method instances and their cached artifacts.

mod instance;
mod table;
mod template;

pub use instance::{Artifact, CallConv, MethodInstance, NativeEntry};
pub use table::SpecializationTable;
pub use template::{Namespace, Template};
