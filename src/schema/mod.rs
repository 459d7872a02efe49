//! Schema inference
//!
//! Type inference for single values, the concurrent first-wins schema
//! accumulator, and the traversal that merges decoded lines into it.

pub mod infer;
pub mod traverse;
pub mod tree;

pub use infer::{infer, infer_type, InferOptions, Inferred, NullPolicy};
pub use traverse::{Traverser, DEFAULT_MAX_DEPTH, MAX_JSON_NESTING};
pub use tree::{Schema, SchemaTree};
