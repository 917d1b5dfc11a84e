//! Runtime for compiled interactive-narrative stories.

#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::new_without_default)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::len_zero)]
#![allow(clippy::unnecessary_cast)]

pub mod core;
pub mod vm;
pub mod errors;
mod util;

mod config;
pub mod externals;
pub mod observers;
mod snapshot;
mod story;

// Re-exports from core/
pub use crate::core::value::Value;
pub use crate::core::{Choice, InkList, ListItem, OutputItem, Pointer, StoryState, VariableChange};

// Re-exports from vm/
pub use vm::apply_native;

// Re-exports from util/
pub use util::Appendable;
pub use util::{Capabilities, Lcg64, RngAlgorithm};

// Re-exports from other modules
pub use config::StoryConfig;
pub use errors::{Severity, StoryError, StoryResult};
pub use externals::{ExternalFn, ExternalRegistry};
pub use observers::{ObserverFn, ObserverHandle};
pub use snapshot::{SAVE_VERSION_CURRENT, SAVE_VERSION_MINIMUM_COMPATIBLE};
pub use story::{HookFn, Story};
pub use weave_ir::{Path, StoryGraph};
