use weave_ir::Path;

use super::call_stack::Thread;

/// A choice offered to the reader.
///
/// The call-stack thread active when the choice was generated travels with
/// it, so choosing resumes inside the same tunnels and functions.
#[derive(Clone, Debug)]
pub struct Choice {
    pub text: String,
    pub index: usize,
    pub target_path: Path,
    pub source_path: String,
    pub tags: Vec<String>,
    pub is_invisible_default: bool,
    pub(crate) original_thread_index: usize,
    pub(crate) thread_at_generation: Thread,
}

impl Choice {
    pub fn path_string(&self) -> String {
        self.target_path.to_string()
    }
}
