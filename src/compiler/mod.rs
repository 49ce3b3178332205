//! The shared emitter pipeline (§2): field-path resolution, expression and
//! condition compilation, JOIN emission, and the SELECT/AGGREGATE entry
//! points built on top of them.

pub mod aggregate;
pub mod condition;
pub mod emit;
pub mod expression;
pub mod functions;
pub mod join;
pub mod select;

pub use aggregate::{compile_aggregation, CompiledQuery};
pub use select::compile_select;
