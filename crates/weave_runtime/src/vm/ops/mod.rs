//! Node handlers.

pub(crate) mod choice;
pub(crate) mod control;
pub(crate) mod flow;
pub(crate) mod native;
pub(crate) mod vars;
