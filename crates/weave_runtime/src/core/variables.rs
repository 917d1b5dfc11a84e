//! Global variable storage and variable-pointer resolution.

use indexmap::IndexMap;
use weave_ir::{StoryGraph, VariableAssignment};

use super::call_stack::CallStack;
use super::list::InkList;
use crate::Value;
use crate::errors::{StoryError, StoryResult};

/// A global that took a new value.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Value,
}

#[derive(Clone, Debug, Default)]
pub struct VariablesState {
    pub(crate) globals: IndexMap<String, Value>,
    pub(crate) defaults: IndexMap<String, Value>,
}

impl VariablesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name).or_else(|| self.defaults.get(name))
    }

    pub fn global_exists(&self, name: &str) -> bool {
        self.globals.contains_key(name) || self.defaults.contains_key(name)
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(String::as_str)
    }

    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    /// Captures the current globals as the load-time defaults.
    pub fn snapshot_defaults(&mut self) {
        self.defaults = self.globals.clone();
    }

    /// Globals whose value differs from the load-time default.
    pub fn changed_from_defaults(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.globals
            .iter()
            .filter(|(k, v)| self.defaults.get(*k) != Some(*v))
    }

    /// Stores a global. Returns the change when the value actually differs.
    pub fn set_global(&mut self, name: &str, mut value: Value) -> Option<VariableChange> {
        let old = self.global(name).cloned();
        retain_list_origins(old.as_ref(), &mut value);
        self.globals.insert(name.to_string(), value.clone());
        if old.as_ref() == Some(&value) {
            return None;
        }
        Some(VariableChange {
            name: name.to_string(),
            old,
            new: value,
        })
    }

    pub fn get_raw(
        &self,
        name: &str,
        context_index: i64,
        call_stack: &CallStack,
        graph: &StoryGraph,
    ) -> Option<Value> {
        if context_index <= 0 {
            if let Some(v) = self.global(name) {
                return Some(v.clone());
            }
            if let Some((def, value)) = graph.find_list_item(name) {
                let origin = def.name.clone();
                return InkList::single(graph, &origin, value).map(Value::List);
            }
        }
        call_stack.temporary(name, context_index).cloned()
    }

    /// Reads a variable, following variable pointers to their target.
    pub fn get(
        &self,
        name: &str,
        context_index: i64,
        call_stack: &CallStack,
        graph: &StoryGraph,
    ) -> Option<Value> {
        let mut value = self.get_raw(name, context_index, call_stack, graph)?;
        // Pointers may chain, but each hop moves to an outer frame.
        for _ in 0..call_stack.depth() + 1 {
            match value {
                Value::VariablePointer {
                    name,
                    context_index,
                } => value = self.get_raw(&name, context_index, call_stack, graph)?,
                other => return Some(other),
            }
        }
        Some(value)
    }

    fn context_index_of(&self, name: &str, call_stack: &CallStack) -> i64 {
        if self.global_exists(name) {
            0
        } else {
            call_stack.current_frame_index() as i64
        }
    }

    fn resolve_pointer(
        &self,
        name: String,
        context_index: i64,
        call_stack: &CallStack,
        graph: &StoryGraph,
    ) -> Value {
        let context_index = if context_index == -1 {
            self.context_index_of(&name, call_stack)
        } else {
            context_index
        };
        match self.get_raw(&name, context_index, call_stack, graph) {
            Some(double @ Value::VariablePointer { .. }) => double,
            _ => Value::VariablePointer {
                name,
                context_index,
            },
        }
    }

    /// Performs an assignment node. Only global changes are reported.
    pub fn assign(
        &mut self,
        assignment: &VariableAssignment,
        value: Value,
        call_stack: &mut CallStack,
        graph: &StoryGraph,
    ) -> StoryResult<Option<VariableChange>> {
        let mut name = assignment.name.clone();
        let mut context_index = -1;
        let mut value = value;
        let set_global;

        if assignment.is_new_declaration {
            set_global = assignment.is_global;
            if let Value::VariablePointer {
                name: target,
                context_index: ci,
            } = value
            {
                value = self.resolve_pointer(target, ci, call_stack, graph);
            }
        } else {
            let mut global = self.global_exists(&name);
            let mut hops = 0;
            while let Some(Value::VariablePointer {
                name: target,
                context_index: ci,
            }) = self.get_raw(&name, context_index, call_stack, graph)
            {
                name = target;
                context_index = ci;
                global = ci == 0;
                hops += 1;
                if hops > call_stack.depth() + 1 {
                    return Err(StoryError::eval(format!(
                        "variable pointer cycle while assigning '{}'",
                        assignment.name
                    )));
                }
            }
            set_global = global;
        }

        if set_global {
            if !assignment.is_new_declaration && !self.global_exists(&name) {
                return Err(StoryError::eval(format!(
                    "Variable '{name}' has not been declared"
                )));
            }
            Ok(self.set_global(&name, value))
        } else {
            call_stack.set_temporary(&name, value, assignment.is_new_declaration, context_index)?;
            Ok(None)
        }
    }
}

/// An empty list assigned over a list keeps the old list's origins.
fn retain_list_origins(old: Option<&Value>, new: &mut Value) {
    if let (Some(Value::List(old)), Value::List(new)) = (old, new) {
        if new.is_empty() && new.origins().is_empty() {
            for o in old.origins() {
                new.add_origin(o);
            }
        }
    }
}
