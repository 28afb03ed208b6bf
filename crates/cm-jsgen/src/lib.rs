//! cm-jsgen - emits a single JS module from a [`cm_mir::MirProgram`]
//! (spec §4.12). The JS target has no addressable heap, so manual
//! memory builtins are a hard rejection rather than a degraded
//! lowering.

pub mod emit;
pub mod error;
pub mod runtime;
pub mod types;

pub use emit::{compile, JsGenOptions};
pub use error::{JsGenError, JsGenResult};
