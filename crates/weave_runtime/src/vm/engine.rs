//! The step loop.
//!
//! `continue_internal` steps until a line of output is complete. Once the
//! output ends in a newline the whole state is snapshotted and stepping goes
//! on, because glue further ahead may still join the next fragment onto this
//! line. If real content appears past the newline the snapshot is restored
//! and the line is returned; if glue removes the newline the snapshot is
//! dropped and the line keeps growing.

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, warn};
use weave_ir::{Component, ContainerId, ControlCommand, Node, Path, PushPopType, Target};

use crate::Story;
use crate::core::{OutputItem, Pointer, StoryState, Value, VariableChange};
use crate::errors::{StoryError, StoryResult, messages};

use super::ops::{choice, control, flow, native, vars};

/// Newline lookahead bookkeeping for one `continue_internal` call.
#[derive(Default)]
pub(crate) struct Lookahead {
    snapshot: Option<Box<StoryState>>,
    text_at_snapshot: String,
    tags_at_snapshot: usize,
    pub(crate) saw_unsafe_external: bool,
    /// Observer notifications held back until the lookahead is committed.
    deferred: Vec<VariableChange>,
}

impl Lookahead {
    pub(crate) fn active(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

fn newline_output_change(prev: &str, curr: &str, prev_tags: usize, curr_tags: usize) -> OutputChange {
    let newline_still_exists = curr.len() >= prev.len()
        && !prev.is_empty()
        && curr.as_bytes().get(prev.len() - 1) == Some(&b'\n');
    if prev_tags == curr_tags && prev.len() == curr.len() && newline_still_exists {
        return OutputChange::NoChange;
    }
    if !newline_still_exists {
        return OutputChange::NewlineRemoved;
    }
    if curr_tags > prev_tags {
        return OutputChange::ExtendedBeyondNewline;
    }
    if curr[prev.len()..].bytes().any(|c| c != b' ' && c != b'\t') {
        return OutputChange::ExtendedBeyondNewline;
    }
    OutputChange::NoChange
}

#[derive(Clone, Copy)]
enum Entered {
    Container(ContainerId),
    Node(usize),
}

impl Story {
    pub(crate) fn continue_internal(&mut self) -> StoryResult<String> {
        if !self.state.can_continue() {
            return Err(StoryError::control(messages::CANNOT_CONTINUE));
        }
        self.state.did_safe_exit = false;
        self.state.reset_output();

        let budget = self.config.max_steps_per_continue;
        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > budget {
                warn!(steps = budget, "step budget exhausted");
                return Err(StoryError::RunawayLoop(budget));
            }
            match self.continue_single_step() {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) if self.lookahead.active() => {
                    // Raised on the next call, once the content is really reached.
                    debug!(error = %err, "error past a newline, stopping at the line");
                    self.restore_snapshot();
                    break;
                }
                Err(err) => self.contain_thread_error(err)?,
            }
            if !self.state.can_continue() {
                break;
            }
        }

        if self.lookahead.active() {
            self.restore_snapshot();
        }

        if !self.state.can_continue() {
            let cs = &self.state.call_stack;
            if cs.can_pop_thread() {
                return Err(StoryError::control(
                    "Thread available to pop, threads should always be flat by the end of evaluation?",
                ));
            }
            if self.state.current_choices.is_empty() && !self.state.did_safe_exit {
                let msg = if cs.can_pop(Some(PushPopType::Tunnel)) {
                    "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
                } else if cs.can_pop(Some(PushPopType::Function)) {
                    "unexpectedly reached end of content. Do you need a '~ return'?"
                } else if !cs.can_pop(None) {
                    "ran out of content. Do you need a '-> DONE' or '-> END'?"
                } else {
                    "unexpectedly reached end of content for unknown reason."
                };
                return Err(StoryError::control(msg));
            }
        }

        self.state.did_safe_exit = false;
        self.lookahead.saw_unsafe_external = false;
        Ok(self.state.output.current_text())
    }

    /// Runs one step. Returns true when the line is finished.
    fn continue_single_step(&mut self) -> StoryResult<bool> {
        self.step_internal()?;

        if !self.state.can_continue() && !self.state.call_stack.element_is_evaluate_from_game() {
            self.try_follow_default_invisible_choice()?;
        }

        if !self.state.output.in_string_evaluation() {
            if self.lookahead.active() {
                let text = self.state.output.current_text();
                let tags = self.state.output.current_tags().len();
                let change = newline_output_change(
                    &self.lookahead.text_at_snapshot,
                    &text,
                    self.lookahead.tags_at_snapshot,
                    tags,
                );
                if change == OutputChange::ExtendedBeyondNewline
                    || self.lookahead.saw_unsafe_external
                {
                    self.restore_snapshot();
                    return Ok(true);
                } else if change == OutputChange::NewlineRemoved {
                    self.discard_snapshot();
                }
            }

            if self.state.output.ends_in_newline() {
                if self.state.can_continue() {
                    if !self.lookahead.active() {
                        self.take_snapshot();
                    }
                } else {
                    self.discard_snapshot();
                }
            }
        }
        Ok(false)
    }

    fn take_snapshot(&mut self) {
        self.lookahead.text_at_snapshot = self.state.output.current_text();
        self.lookahead.tags_at_snapshot = self.state.output.current_tags().len();
        self.lookahead.snapshot = Some(Box::new(self.state.clone()));
    }

    fn restore_snapshot(&mut self) {
        if let Some(state) = self.lookahead.snapshot.take() {
            self.state = *state;
        }
        self.lookahead.deferred.clear();
    }

    fn discard_snapshot(&mut self) {
        self.lookahead.snapshot = None;
        for change in std::mem::take(&mut self.lookahead.deferred) {
            self.notify_variable_change(change);
        }
    }

    /// Drops the current forked thread when it raised a containable error.
    fn contain_thread_error(&mut self, err: StoryError) -> StoryResult<()> {
        let cs = &self.state.call_stack;
        if !err.is_contained_by_thread() || !cs.is_forked() || cs.element_is_evaluate_from_game() {
            return Err(err);
        }
        let Some(thread) = self.state.call_stack.threads.pop() else {
            return Err(err);
        };
        let state = &mut self.state;
        state.eval_stack.truncate(thread.eval_height_at_fork);
        state.output.truncate(thread.output_len_at_fork);
        state.diverted_pointer = None;
        state.pending_choice_tags.clear();
        state
            .current_choices
            .retain(|c| c.original_thread_index != thread.index);
        warn!(thread = thread.index, error = %err, "abandoned forked thread");
        state.add_warning(format!("thread {} abandoned: {err}", thread.index));
        // The parent still sits on the divert that started the thread.
        if self.state.current_pointer().is_some() {
            self.next_content()?;
        }
        Ok(())
    }

    pub(crate) fn step_internal(&mut self) -> StoryResult<()> {
        let Some(mut pointer) = self.state.current_pointer() else {
            return Ok(());
        };
        let graph = Rc::clone(&self.graph);

        // Containers are entered at their first element.
        while let Some(Node::Container(id)) = graph.node(pointer.container, pointer.index) {
            let id = *id;
            self.visit_container(id, true);
            if graph.container(id).content.is_empty() {
                break;
            }
            pointer = Pointer::start_of(id);
        }
        self.state.set_current_pointer(Some(pointer));

        let mut starts_thread = false;
        match graph.node(pointer.container, pointer.index) {
            None | Some(Node::Container(_)) => {}
            Some(Node::ChoicePoint(point)) => {
                if let Some(choice) = choice::process_choice(self, point, pointer)? {
                    self.state.current_choices.push(choice);
                }
            }
            Some(node) => {
                let handled = self.perform_logic_and_flow_control(node)?;
                if self.state.current_pointer().is_none() {
                    return Ok(());
                }
                if !handled {
                    self.push_content(node);
                }
                starts_thread = matches!(node, Node::Control(ControlCommand::StartThread));
            }
        }

        self.next_content()?;

        // After the increment, so the thread returns past this node.
        if starts_thread {
            let height = self.state.eval_stack.len();
            let out_len = self.state.output.len();
            self.state.call_stack.push_thread();
            let thread = self.state.call_stack.current_thread_mut();
            thread.eval_height_at_fork = height;
            thread.output_len_at_fork = out_len;
        }
        Ok(())
    }

    fn perform_logic_and_flow_control(&mut self, node: &Node) -> StoryResult<bool> {
        match node {
            Node::Divert(d) => flow::divert(self, d)?,
            Node::Control(cmd) => control::execute(self, *cmd)?,
            Node::VariableAssignment(a) => vars::assign(self, a)?,
            Node::VariableReference(name) => vars::read(self, name)?,
            Node::ReadCount(path) => vars::read_count(self, path)?,
            Node::NativeCall(op) => native::call(self, *op)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn push_content(&mut self, node: &Node) {
        let state = &mut self.state;
        let value = match node {
            Node::Glue => return state.push_output(OutputItem::Glue),
            Node::Tag(t) => return state.push_output(OutputItem::Tag(t.clone())),
            Node::Text(s) => Value::Str(s.clone()),
            Node::Void => Value::Void,
            Node::Constant(lit) => match Value::from_literal(lit) {
                Value::VariablePointer {
                    name,
                    context_index: -1,
                } => {
                    let context_index = state.call_stack.context_for_variable(&name);
                    Value::VariablePointer {
                        name,
                        context_index,
                    }
                }
                v => v,
            },
            _ => return,
        };
        if state.in_expression_evaluation() {
            state.eval_stack.push(value);
        } else if !value.is_void() {
            state.push_output(OutputItem::Text(value.to_string()));
        }
    }

    fn next_content(&mut self) -> StoryResult<()> {
        let current = self.state.current_pointer();
        self.state.set_previous_pointer(current);

        if let Some(diverted) = self.state.diverted_pointer.take() {
            self.state.set_current_pointer(Some(diverted));
            self.visit_changed_containers_due_to_divert();
            return Ok(());
        }

        if !self.increment_content_pointer() {
            let mut did_pop = false;
            if self.state.call_stack.can_pop(Some(PushPopType::Function)) {
                self.state.pop_callstack(Some(PushPopType::Function))?;
                // A function used in an expression still leaves a value.
                if self.state.in_expression_evaluation() {
                    self.state.eval_stack.push(Value::Void);
                }
                did_pop = true;
            } else if self.state.call_stack.can_pop_thread() {
                self.state.call_stack.pop_thread()?;
                did_pop = true;
            } else {
                self.state.try_exit_function_evaluation_from_game();
            }

            if did_pop && self.state.current_pointer().is_some() {
                self.next_content()?;
            }
        }
        Ok(())
    }

    /// Moves to the next node, climbing out of finished containers. Named-only
    /// containers have no position in their parent, so leaving one ends the flow.
    fn increment_content_pointer(&mut self) -> bool {
        let Some(mut pointer) = self.state.current_pointer() else {
            return false;
        };
        let graph = &*self.graph;
        let mut ok = true;
        pointer.index += 1;
        while pointer.index >= graph.container(pointer.container).content.len() {
            ok = false;
            let Some(parent) = graph.container(pointer.container).parent else {
                break;
            };
            let position = graph
                .container(parent)
                .content
                .iter()
                .position(|n| matches!(n, Node::Container(c) if *c == pointer.container));
            let Some(at) = position else {
                break;
            };
            pointer = Pointer {
                container: parent,
                index: at + 1,
            };
            ok = true;
        }
        self.state
            .set_current_pointer(if ok { Some(pointer) } else { None });
        ok
    }

    fn visit_container(&mut self, id: ContainerId, at_start: bool) {
        let c = self.graph.container(id);
        if !c.flags.count_start_only || at_start {
            if c.counts_visits() {
                self.state.increment_visit_count(id);
            }
            if c.counts_turns() {
                self.state.record_turn_visit(id);
            }
        }
    }

    /// Counts visits for every container entered by a jump, stopping at the
    /// first ancestor shared with the previous position.
    pub(crate) fn visit_changed_containers_due_to_divert(&mut self) {
        let graph = Rc::clone(&self.graph);
        let Some(pointer) = self.state.current_pointer() else {
            return;
        };

        let mut previous: SmallVec<[ContainerId; 8]> = SmallVec::new();
        if let Some(prev) = self.state.previous_pointer() {
            let mut ancestor = match graph.node(prev.container, prev.index) {
                Some(Node::Container(id)) => Some(*id),
                _ => Some(prev.container),
            };
            while let Some(id) = ancestor {
                previous.push(id);
                ancestor = graph.container(id).parent;
            }
        }

        let mut child = match graph.node(pointer.container, pointer.index) {
            Some(Node::Container(id)) => Entered::Container(*id),
            Some(_) => Entered::Node(pointer.index),
            None => return,
        };
        let mut ancestor = match child {
            Entered::Container(id) => graph.container(id).parent,
            Entered::Node(_) => Some(pointer.container),
        };
        let mut all_at_start = true;
        while let Some(id) = ancestor {
            let c = graph.container(id);
            if previous.contains(&id) && !c.flags.count_start_only {
                break;
            }
            let first = match child {
                Entered::Node(i) => i == 0,
                Entered::Container(cid) => {
                    matches!(c.content.first(), Some(Node::Container(f)) if *f == cid)
                }
            };
            let at_start = first && all_at_start;
            if !at_start {
                all_at_start = false;
            }
            self.visit_container(id, at_start);
            child = Entered::Container(id);
            ancestor = c.parent;
        }
    }

    pub(crate) fn try_follow_default_invisible_choice(&mut self) -> StoryResult<()> {
        let choices = &self.state.current_choices;
        let invisible = choices.iter().filter(|c| c.is_invisible_default).count();
        if invisible == 0 || choices.len() > invisible {
            return Ok(());
        }
        let choice = choices[0].clone();
        let pointer = self.pointer_at_path(&choice.target_path)?;
        let cs = &mut self.state.call_stack;
        cs.set_current_thread(choice.thread_at_generation);
        if self.lookahead.active() {
            let forked = cs.fork_thread();
            cs.set_current_thread(forked);
        }
        self.choose_pointer(pointer, false);
        Ok(())
    }

    pub(crate) fn choose_pointer(&mut self, pointer: Pointer, incrementing_turn: bool) {
        self.state.set_chosen_pointer(pointer, incrementing_turn);
        self.visit_changed_containers_due_to_divert();
    }

    /// A path ending in an index addresses that slot of its parent, even when
    /// the slot holds a container; otherwise the container's first element.
    pub(crate) fn pointer_at_path(&self, path: &Path) -> StoryResult<Pointer> {
        if let (Some(Component::Index(index)), Some(parent)) = (path.last(), path.parent()) {
            if let Some(Target::Container(container)) = self.graph.resolve(&parent) {
                if self.graph.node(container, *index).is_some() {
                    return Ok(Pointer {
                        container,
                        index: *index,
                    });
                }
            }
        }
        match self.graph.resolve(path) {
            Some(Target::Container(container)) => Ok(Pointer::start_of(container)),
            Some(Target::Node { container, index }) => Ok(Pointer { container, index }),
            None => Err(StoryError::unresolved(path)),
        }
    }

    pub(crate) fn notify_variable_change(&mut self, change: VariableChange) {
        if self.observers_muted || !self.observers.has_observers(&change.name) {
            return;
        }
        if self.lookahead.active() {
            self.lookahead.deferred.push(change);
            return;
        }
        if self.config.batch_observers && self.continue_depth > 0 {
            match self.batched.get_mut(&change.name) {
                Some(entry) => entry.1 = change.new,
                None => {
                    self.batched.insert(change.name, (change.old, change.new));
                }
            }
            return;
        }
        self.dispatch_variable_change(change);
    }

    fn dispatch_variable_change(&mut self, change: VariableChange) {
        if self.observers.is_dispatching(&change.name) {
            self.observers.defer(change);
            return;
        }
        let mut taken = self.observers.take(&change.name);
        self.callback_depth += 1;
        for (id, observer) in taken.iter_mut() {
            if self.observers.is_removed(*id) {
                continue;
            }
            observer(self, &change.name, change.old.as_ref(), &change.new);
        }
        self.callback_depth -= 1;
        for nested in self.observers.restore(&change.name, taken) {
            self.dispatch_variable_change(nested);
        }
    }

    pub(crate) fn flush_batched_changes(&mut self) {
        for (name, (old, new)) in std::mem::take(&mut self.batched) {
            if old.as_ref() != Some(&new) {
                self.dispatch_variable_change(VariableChange { name, old, new });
            }
        }
    }

    /// Runs a function to completion on the current state and returns its
    /// result with the text it printed.
    pub(crate) fn run_function_evaluation(
        &mut self,
        container: ContainerId,
        args: &[Value],
    ) -> StoryResult<(Value, String)> {
        let outer_lookahead = std::mem::take(&mut self.lookahead);
        let outer_output = std::mem::take(&mut self.state.output);

        let height = self.state.eval_stack.len();
        self.state
            .call_stack
            .push(PushPopType::FunctionEvaluationFromGame, height, 0);
        self.state
            .set_current_pointer(Some(Pointer::start_of(container)));
        for arg in args {
            self.state.eval_stack.push(arg.clone());
        }

        let mut text = String::new();
        let mut outcome = Ok(());
        while self.state.can_continue() {
            match self.continue_internal() {
                Ok(line) => text.push_str(&line),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.state.output = outer_output;
        self.lookahead = outer_lookahead;
        outcome?;

        if !self.state.call_stack.element_is_evaluate_from_game() {
            return Err(StoryError::control(format!(
                "Expected external function evaluation to be complete. Stack trace: {}",
                self.state.call_stack.trace(&self.graph)
            )));
        }
        let frame_height = self.state.call_stack.current_frame().eval_stack_height_when_pushed;
        let mut returned = None;
        while self.state.eval_stack.len() > frame_height {
            let v = self.state.eval_stack.pop()?;
            returned.get_or_insert(v);
        }
        self.state
            .call_stack
            .pop(Some(PushPopType::FunctionEvaluationFromGame))?;
        Ok((returned.unwrap_or(Value::Void), text))
    }
}
