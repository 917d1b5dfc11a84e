pub mod call_stack;
pub mod choice;
pub mod eval_stack;
pub mod list;
pub mod output;
pub mod state;
pub mod value;
pub mod variables;

pub use call_stack::{CallStack, Frame, Pointer, Thread};
pub use choice::Choice;
pub use eval_stack::EvalStack;
pub use list::{InkList, ListItem};
pub use output::{OutputItem, OutputStream, clean_output_whitespace};
pub use state::StoryState;
pub use value::Value;
pub use variables::{VariableChange, VariablesState};
