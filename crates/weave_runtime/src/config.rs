//! Story configuration.

/// Runtime configuration options.
#[derive(Clone, Copy, Debug)]
pub struct StoryConfig {
    /// Upper bound on steps a single `continue_` may take before it is
    /// treated as a runaway loop.
    pub max_steps_per_continue: usize,
    /// Divert to an ink function of the same name when an external function
    /// has no binding.
    pub allow_external_function_fallbacks: bool,
    /// Deliver variable observers once per changed variable at the end of a
    /// `continue_`, instead of at each assignment.
    pub batch_observers: bool,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            max_steps_per_continue: 1_000_000,
            allow_external_function_fallbacks: true,
            batch_observers: false,
        }
    }
}
