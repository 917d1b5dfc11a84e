//! Step interpreter.
//!
//! Walks the content graph one node at a time on behalf of a `Story`.

mod engine;
pub(crate) mod ops;

pub(crate) use engine::Lookahead;
pub use ops::native::apply_native;
