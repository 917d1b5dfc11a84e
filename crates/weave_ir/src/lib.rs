//! Content graph for compiled interactive-narrative bytecode.
//!
//! The graph is loaded once from the compiler's JSON output and never
//! mutated afterwards; the runtime addresses it by [`Path`] and [`ContainerId`].
mod error;
mod graph;
mod json_read;
mod json_write;
mod node;
mod path;

pub use error::*;
pub use graph::*;
pub use json_read::*;
pub use json_write::*;
pub use node::*;
pub use path::*;
