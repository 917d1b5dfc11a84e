//! Complete mutable runtime state of a story.
//!
//! Everything that a save captures lives here. The engine clones the whole
//! state for lookahead snapshots, so it stays plain owned data.

use weave_ir::{ContainerId, PushPopType, StoryGraph};

use super::call_stack::{CallStack, Pointer};
use super::choice::Choice;
use super::eval_stack::EvalStack;
use super::output::{OutputItem, OutputStream};
use super::value::{FastHashMap, fast_map_new};
use super::variables::VariablesState;
use crate::errors::{StoryError, StoryResult};

#[derive(Clone, Debug)]
pub struct StoryState {
    pub(crate) call_stack: CallStack,
    pub(crate) eval_stack: EvalStack,
    pub(crate) variables: VariablesState,
    pub(crate) output: OutputStream,
    pub(crate) visit_counts: FastHashMap<ContainerId, i64>,
    pub(crate) turn_indices: FastHashMap<ContainerId, i64>,
    pub(crate) current_turn_index: i64,
    pub(crate) story_seed: i64,
    pub(crate) previous_random: i64,
    pub(crate) current_choices: Vec<Choice>,
    pub(crate) diverted_pointer: Option<Pointer>,
    pub(crate) did_safe_exit: bool,
    /// Tags closed while building choice text, consumed by the next choice point.
    pub(crate) pending_choice_tags: Vec<String>,
    pub(crate) errors: Vec<String>,
    pub(crate) warnings: Vec<String>,
}

impl StoryState {
    pub fn new(seed: i64) -> Self {
        Self {
            call_stack: CallStack::new(Some(Pointer::start_of(StoryGraph::ROOT))),
            eval_stack: EvalStack::new(),
            variables: VariablesState::new(),
            output: OutputStream::new(),
            visit_counts: fast_map_new(),
            turn_indices: fast_map_new(),
            current_turn_index: -1,
            story_seed: seed,
            previous_random: 0,
            current_choices: Vec::new(),
            diverted_pointer: None,
            did_safe_exit: false,
            pending_choice_tags: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn current_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_frame().pointer
    }

    pub fn set_current_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_frame_mut().pointer = pointer;
    }

    pub fn previous_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_thread().previous_pointer
    }

    pub fn set_previous_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_thread_mut().previous_pointer = pointer;
    }

    pub fn in_expression_evaluation(&self) -> bool {
        self.call_stack.current_frame().in_expression_evaluation
    }

    pub fn set_in_expression_evaluation(&mut self, on: bool) {
        self.call_stack.current_frame_mut().in_expression_evaluation = on;
    }

    pub fn can_continue(&self) -> bool {
        self.current_pointer().is_some() && self.errors.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn current_turn_index(&self) -> i64 {
        self.current_turn_index
    }

    pub fn push_output(&mut self, item: OutputItem) {
        self.output.push(item, &mut self.call_stack);
    }

    pub fn reset_output(&mut self) {
        self.output.clear();
    }

    pub fn visit_count(&self, graph: &StoryGraph, id: ContainerId) -> StoryResult<i64> {
        if !graph.container(id).counts_visits() {
            return Err(StoryError::eval(format!(
                "Read count for target ({}) unknown.",
                graph.container(id).path
            )));
        }
        Ok(self.visit_counts.get(&id).copied().unwrap_or(0))
    }

    pub fn turns_since(&self, graph: &StoryGraph, id: ContainerId) -> StoryResult<i64> {
        if !graph.container(id).counts_turns() {
            return Err(StoryError::eval(format!(
                "TURNS_SINCE() for target ({}) unknown.",
                graph.container(id).path
            )));
        }
        Ok(match self.turn_indices.get(&id) {
            Some(turn) => self.current_turn_index - turn,
            None => -1,
        })
    }

    pub(crate) fn increment_visit_count(&mut self, id: ContainerId) {
        *self.visit_counts.entry(id).or_insert(0) += 1;
    }

    pub(crate) fn record_turn_visit(&mut self, id: ContainerId) {
        self.turn_indices.insert(id, self.current_turn_index);
    }

    /// Pops a frame, trimming trailing whitespace a function left behind.
    pub(crate) fn pop_callstack(&mut self, kind: Option<PushPopType>) -> StoryResult<()> {
        let frame = self.call_stack.current_frame();
        if frame.kind == PushPopType::Function {
            let start = frame.function_start_in_output;
            self.output.trim_function_end(start);
        }
        self.call_stack.pop(kind)?;
        Ok(())
    }

    pub(crate) fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if self.call_stack.element_is_evaluate_from_game() {
            self.set_current_pointer(None);
            self.did_safe_exit = true;
            return true;
        }
        false
    }

    pub(crate) fn force_end(&mut self) {
        self.call_stack.reset(None);
        self.current_choices.clear();
        self.set_current_pointer(None);
        self.set_previous_pointer(None);
        self.did_safe_exit = true;
    }

    pub(crate) fn set_chosen_pointer(&mut self, pointer: Pointer, incrementing_turn: bool) {
        self.current_choices.clear();
        self.set_current_pointer(Some(pointer));
        if incrementing_turn {
            self.current_turn_index += 1;
        }
    }

    pub(crate) fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
