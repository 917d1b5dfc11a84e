use smallvec::SmallVec;

use crate::Value;
use crate::errors::{StoryError, StoryResult, messages};

/// Operand stack shared by every frame and thread.
#[derive(Clone, Debug, Default)]
pub struct EvalStack {
    values: Vec<Value>,
}

impl EvalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> StoryResult<Value> {
        self.values
            .pop()
            .ok_or_else(|| StoryError::control(messages::EVAL_STACK_UNDERFLOW))
    }

    pub fn peek(&self) -> StoryResult<&Value> {
        self.values
            .last()
            .ok_or_else(|| StoryError::control(messages::EVAL_STACK_UNDERFLOW))
    }

    /// Pops `n` values, returned bottom first.
    pub fn pop_n(&mut self, n: usize) -> StoryResult<SmallVec<[Value; 4]>> {
        if n > self.values.len() {
            return Err(StoryError::control(messages::EVAL_STACK_UNDERFLOW));
        }
        let start = self.values.len() - n;
        Ok(self.values.drain(start..).collect())
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }
}
