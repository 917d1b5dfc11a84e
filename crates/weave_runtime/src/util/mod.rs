//! Utility modules.

mod appendable;
mod capabilities;

pub use appendable::Appendable;
pub use capabilities::{Capabilities, Lcg64, RngAlgorithm};
pub(crate) use capabilities::SeededDraws;
