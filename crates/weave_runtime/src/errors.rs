//! Story error taxonomy and common message constants.

use thiserror::Error;
use weave_ir::LoadError;

pub mod messages {
    pub const CANNOT_CONTINUE: &str =
        "Can't continue - should check can_continue before calling continue_";
    pub const CALLSTACK_UNDERFLOW: &str = "Mismatched push/pop in callstack";
    pub const CANNOT_POP_THREAD: &str = "Can't pop thread";
    pub const EVAL_STACK_UNDERFLOW: &str = "Evaluation stack underflow";
    pub const DIVISION_BY_ZERO: &str = "Division by zero";
    pub const LOOKAHEAD_UNSAFE_IN_PREVIEW: &str =
        "lookahead-unsafe evaluation requested while previewing content";
    pub const CALLBACK_REENTRY: &str = "story was re-entered from one of its own callbacks";
    pub const SNAPSHOT_VERSION_MISSING: &str = "ink save format didn't contain a version number";
    pub const STRING_EVAL_MISMATCH: &str = "Unexpected end of string evaluation";
    pub const TAG_MISMATCH: &str = "Unexpected end of tag";
}

/// How a message reaches the error/warning hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum StoryError {
    /// A path or divert target is not present in the loaded content.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Call-stack underflow or mismatched tunnel/function/thread nesting.
    #[error("control flow error: {0}")]
    ControlFlow(String),

    /// Type mismatch, undefined variable or bad arithmetic.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Bytecode or save format version not supported.
    #[error("version error: {0}")]
    Version(String),

    #[error("runaway loop: exceeded {0} steps in a single continue")]
    RunawayLoop(usize),

    #[error("reentrancy error: {0}")]
    Reentrancy(String),

    #[error("choice index {index} out of range ({available} choices available)")]
    ChoiceOutOfRange { index: usize, available: usize },

    #[error("load error: {0}")]
    Load(String),

    #[error("save state error: {0}")]
    Snapshot(String),

    #[error("external function '{name}': {message}")]
    ExternalFunction { name: String, message: String },
}

impl StoryError {
    /// Recoverable errors abort the current call but leave the story usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoryError::Evaluation(_)
                | StoryError::ExternalFunction { .. }
                | StoryError::ChoiceOutOfRange { .. }
        )
    }

    /// Errors raised inside a forked thread that drop only that thread.
    pub(crate) fn is_contained_by_thread(&self) -> bool {
        matches!(
            self,
            StoryError::Evaluation(_)
                | StoryError::ExternalFunction { .. }
                | StoryError::Resolution(_)
                | StoryError::ControlFlow(_)
        )
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }

    pub(crate) fn eval(msg: impl Into<String>) -> Self {
        StoryError::Evaluation(msg.into())
    }

    pub(crate) fn control(msg: impl Into<String>) -> Self {
        StoryError::ControlFlow(msg.into())
    }

    pub(crate) fn unresolved(path: impl std::fmt::Display) -> Self {
        StoryError::Resolution(format!("content not found at path '{path}'"))
    }
}

impl From<LoadError> for StoryError {
    fn from(e: LoadError) -> Self {
        if e.is_version() {
            StoryError::Version(e.to_string())
        } else {
            StoryError::Load(e.to_string())
        }
    }
}

pub type StoryResult<T> = Result<T, StoryError>;
