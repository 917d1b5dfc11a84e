//! Runtime value representation.

use std::fmt;

use weave_ir::{Literal, Path};

use super::list::InkList;
use crate::errors::{StoryError, StoryResult};
use crate::util::Appendable;

pub use weave_ir::{FastHashMap, fast_map_new};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(InkList),
    DivertTarget(Path),
    VariablePointer { name: String, context_index: i64 },
    Void,
}

/// Coercion order for mixed-type binary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Rank {
    Bool,
    Int,
    Float,
    List,
    Str,
    DivertTarget,
    VariablePointer,
    Void,
}

impl Value {
    pub fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::DivertTarget(p) => Value::DivertTarget(p.clone()),
            Literal::VariablePointer {
                name,
                context_index,
            } => Value::VariablePointer {
                name: name.clone(),
                context_index: *context_index,
            },
            Literal::List(l) => Value::List(InkList::from_literal(l)),
        }
    }

    pub fn to_literal(&self) -> Option<Literal> {
        Some(match self {
            Value::Bool(b) => Literal::Bool(*b),
            Value::Int(i) => Literal::Int(*i),
            Value::Float(f) => Literal::Float(*f),
            Value::Str(s) => Literal::Str(s.clone()),
            Value::List(l) => Literal::List(l.to_literal()),
            Value::DivertTarget(p) => Literal::DivertTarget(p.clone()),
            Value::VariablePointer {
                name,
                context_index,
            } => Literal::VariablePointer {
                name: name.clone(),
                context_index: *context_index,
            },
            Value::Void => return None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::DivertTarget(_) => "divert target",
            Value::VariablePointer { .. } => "variable pointer",
            Value::Void => "void",
        }
    }

    pub(crate) fn rank(&self) -> Rank {
        match self {
            Value::Bool(_) => Rank::Bool,
            Value::Int(_) => Rank::Int,
            Value::Float(_) => Rank::Float,
            Value::List(_) => Rank::List,
            Value::Str(_) => Rank::Str,
            Value::DivertTarget(_) => Rank::DivertTarget,
            Value::VariablePointer { .. } => Rank::VariablePointer,
            Value::Void => Rank::Void,
        }
    }

    pub fn is_truthy(&self) -> StoryResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::List(l) => Ok(!l.is_empty()),
            Value::Void => Ok(false),
            Value::DivertTarget(_) | Value::VariablePointer { .. } => Err(StoryError::eval(
                format!("Shouldn't use a {} as a conditional value", self.type_name()),
            )),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(f) => Some(*f as i64),
            Value::List(l) => Some(l.value()),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::List(l) => Some(l.value() as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&InkList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Converts to the given rank, or fails when no coercion is defined.
    pub(crate) fn cast(&self, to: Rank) -> StoryResult<Value> {
        if self.rank() == to {
            return Ok(self.clone());
        }
        let out = match (to, self) {
            (Rank::Int, v) => v.as_int().map(Value::Int),
            (Rank::Float, v) => v.as_float().map(Value::Float),
            (Rank::Bool, v) => v.is_truthy().ok().map(Value::Bool),
            (Rank::Str, Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::List(_)) => {
                Some(Value::Str(self.to_string()))
            }
            _ => None,
        };
        out.ok_or_else(|| {
            StoryError::eval(format!(
                "Unexpected type cast of value of type {} to {:?}",
                self.type_name(),
                to
            ))
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        s.append_value(self);
        f.write_str(&s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<InkList> for Value {
    fn from(l: InkList) -> Self {
        Value::List(l)
    }
}
