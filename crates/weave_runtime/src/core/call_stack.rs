//! Call stack with forked threads.
//!
//! Each thread owns a strict stack of frames. The bottom frame of every
//! thread is a tunnel frame that is never popped. A frame's return address
//! is the pointer still held by the frame beneath it, which sits on the
//! call-site node until the callee pops.

use std::fmt::Write;

use indexmap::IndexMap;
use weave_ir::{ContainerId, Path, PushPopType, StoryGraph};

use crate::errors::{StoryError, StoryResult, messages};
use crate::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pointer {
    pub container: ContainerId,
    pub index: usize,
}

impl Pointer {
    pub fn start_of(container: ContainerId) -> Self {
        Self {
            container,
            index: 0,
        }
    }

    pub fn path(&self, graph: &StoryGraph) -> Path {
        graph.container(self.container).path.with_index(self.index)
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub kind: PushPopType,
    pub pointer: Option<Pointer>,
    pub in_expression_evaluation: bool,
    pub temporaries: IndexMap<String, Value>,
    pub eval_stack_height_when_pushed: usize,
    pub function_start_in_output: usize,
}

impl Frame {
    pub fn new(kind: PushPopType, pointer: Option<Pointer>) -> Self {
        Self {
            kind,
            pointer,
            in_expression_evaluation: false,
            temporaries: IndexMap::new(),
            eval_stack_height_when_pushed: 0,
            function_start_in_output: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Thread {
    pub frames: Vec<Frame>,
    pub index: usize,
    pub previous_pointer: Option<Pointer>,
    pub(crate) eval_height_at_fork: usize,
    pub(crate) output_len_at_fork: usize,
}

impl Thread {
    fn new(start: Option<Pointer>) -> Self {
        Self {
            frames: vec![Frame::new(PushPopType::Tunnel, start)],
            index: 0,
            previous_pointer: None,
            eval_height_at_fork: 0,
            output_len_at_fork: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallStack {
    pub(crate) threads: Vec<Thread>,
    pub(crate) thread_counter: usize,
}

impl CallStack {
    pub fn new(start: Option<Pointer>) -> Self {
        Self {
            threads: vec![Thread::new(start)],
            thread_counter: 0,
        }
    }

    pub fn reset(&mut self, start: Option<Pointer>) {
        *self = Self::new(start);
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn current_thread(&self) -> &Thread {
        // Never empty: construction pushes one thread and pop_thread keeps it.
        &self.threads[self.threads.len() - 1]
    }

    pub fn current_thread_mut(&mut self) -> &mut Thread {
        let last = self.threads.len() - 1;
        &mut self.threads[last]
    }

    /// Replaces every thread with `thread`, as when a choice resumes in the
    /// thread it was generated from.
    pub fn set_current_thread(&mut self, thread: Thread) {
        self.threads.clear();
        self.threads.push(thread);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.current_thread().frames
    }

    pub fn current_frame(&self) -> &Frame {
        let frames = &self.current_thread().frames;
        &frames[frames.len() - 1]
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        let frames = &mut self.current_thread_mut().frames;
        let last = frames.len() - 1;
        &mut frames[last]
    }

    pub fn current_frame_index(&self) -> usize {
        self.frames().len() - 1
    }

    pub fn depth(&self) -> usize {
        self.frames().len()
    }

    pub fn can_pop(&self, kind: Option<PushPopType>) -> bool {
        if self.frames().len() <= 1 {
            return false;
        }
        kind.is_none_or(|k| self.current_frame().kind == k)
    }

    pub fn push(
        &mut self,
        kind: PushPopType,
        eval_stack_height: usize,
        output_stream_len: usize,
    ) {
        let mut frame = Frame::new(kind, self.current_frame().pointer);
        frame.eval_stack_height_when_pushed = eval_stack_height;
        frame.function_start_in_output = output_stream_len;
        self.current_thread_mut().frames.push(frame);
    }

    pub fn pop(&mut self, kind: Option<PushPopType>) -> StoryResult<Frame> {
        if !self.can_pop(kind) {
            return Err(StoryError::control(messages::CALLSTACK_UNDERFLOW));
        }
        self.current_thread_mut()
            .frames
            .pop()
            .ok_or_else(|| StoryError::control(messages::CALLSTACK_UNDERFLOW))
    }

    pub fn element_is_evaluate_from_game(&self) -> bool {
        self.current_frame().kind == PushPopType::FunctionEvaluationFromGame
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    pub fn is_forked(&self) -> bool {
        self.threads.len() > 1
    }

    /// Pushes a copy of the current thread under a fresh id.
    pub fn push_thread(&mut self) {
        let mut thread = self.current_thread().clone();
        self.thread_counter += 1;
        thread.index = self.thread_counter;
        self.threads.push(thread);
    }

    /// Copies the current thread under a fresh id without pushing it.
    pub fn fork_thread(&mut self) -> Thread {
        let mut thread = self.current_thread().clone();
        self.thread_counter += 1;
        thread.index = self.thread_counter;
        thread
    }

    pub fn pop_thread(&mut self) -> StoryResult<Thread> {
        if !self.can_pop_thread() {
            return Err(StoryError::control(messages::CANNOT_POP_THREAD));
        }
        self.threads
            .pop()
            .ok_or_else(|| StoryError::control(messages::CANNOT_POP_THREAD))
    }

    pub fn thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|t| t.index == index)
    }

    /// Context index for a variable: 0 for globals, otherwise the frame
    /// index plus one.
    pub fn context_for_variable(&self, name: &str) -> i64 {
        if self.current_frame().temporaries.contains_key(name) {
            self.current_frame_index() as i64 + 1
        } else {
            0
        }
    }

    fn frame_for_context(&self, context_index: i64) -> Option<&Frame> {
        let index = if context_index <= 0 {
            self.current_frame_index()
        } else {
            (context_index - 1) as usize
        };
        self.frames().get(index)
    }

    pub fn temporary(&self, name: &str, context_index: i64) -> Option<&Value> {
        self.frame_for_context(context_index)?.temporaries.get(name)
    }

    pub fn set_temporary(
        &mut self,
        name: &str,
        value: Value,
        declare_new: bool,
        context_index: i64,
    ) -> StoryResult<()> {
        let index = if context_index <= 0 {
            self.current_frame_index()
        } else {
            (context_index - 1) as usize
        };
        let frame = self
            .current_thread_mut()
            .frames
            .get_mut(index)
            .ok_or_else(|| StoryError::control(format!("no frame at context {context_index}")))?;
        if !declare_new && !frame.temporaries.contains_key(name) {
            return Err(StoryError::eval(format!(
                "Could not find temporary variable to set: '{name}'"
            )));
        }
        frame.temporaries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn trace(&self, graph: &StoryGraph) -> String {
        let mut out = String::new();
        let n = self.threads.len();
        for (i, thread) in self.threads.iter().enumerate() {
            let current = if i + 1 == n { " (current)" } else { "" };
            let _ = writeln!(out, "=== THREAD {}/{}{} ===", i + 1, n, current);
            for frame in &thread.frames {
                let kind = match frame.kind {
                    PushPopType::Function => "[FUNCTION]",
                    PushPopType::Tunnel => "[TUNNEL]",
                    PushPopType::FunctionEvaluationFromGame => "[EVALUATION]",
                };
                match frame.pointer {
                    Some(p) => {
                        let _ = writeln!(out, "  {kind} <SOMEWHERE IN {}>", graph.container(p.container).path);
                    }
                    None => {
                        let _ = writeln!(out, "  {kind}");
                    }
                }
            }
        }
        out
    }
}
