//! cm-util - core utilities shared by every crate in the Cm pipeline.
//!
//! Interning, typed indices, source spans, and diagnostics. Nothing here
//! is specific to MIR; downstream crates build their own id spaces on
//! top of [`Idx`] and [`IndexVec`].

pub mod def_id;
pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use def_id::DefId;
pub use diagnostic::{Diagnostic, Handler, Level};
pub use error::UtilError;
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, Span};
pub use symbol::Symbol;

pub use rustc_hash::{FxHashMap, FxHashSet};
