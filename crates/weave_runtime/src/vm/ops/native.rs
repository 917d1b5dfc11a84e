//! Native operators.
//!
//! Operands are coerced to the highest-ranked operand type first (ints never
//! drop below int, so bools do arithmetic as 0/1). Lists combined with a
//! second operand follow their own rules: `list + int` shifts items, `&&`
//! and `||` compare truthiness, and everything else needs two lists.

use weave_ir::{NativeOp, StoryGraph};

use crate::Story;
use crate::core::{InkList, Value};
use crate::core::value::Rank;
use crate::errors::{StoryError, StoryResult, messages};

pub(crate) fn call(story: &mut Story, op: NativeOp) -> StoryResult<()> {
    let params = story.state.eval_stack.pop_n(op.arity())?;
    let result = apply_native(&story.graph, op, &params)?;
    story.state.eval_stack.push(result);
    Ok(())
}

/// Applies `op` to `params`, bottom of stack first.
pub fn apply_native(graph: &StoryGraph, op: NativeOp, params: &[Value]) -> StoryResult<Value> {
    if params.len() != op.arity() {
        return Err(StoryError::eval(format!(
            "'{}' expects {} operands, got {}",
            op.token(),
            op.arity(),
            params.len()
        )));
    }
    if params.iter().any(Value::is_void) {
        return Err(StoryError::eval(
            "Attempting to perform operation on a void value. Did you forget to 'return' a value from a function you called here?",
        ));
    }

    let has_list = params.iter().any(|p| matches!(p, Value::List(_)));
    if params.len() == 2 && has_list {
        return binary_list_op(graph, op, &params[0], &params[1]);
    }

    let rank = params
        .iter()
        .map(Value::rank)
        .max()
        .unwrap_or(Rank::Int)
        .max(Rank::Int);
    let coerced: Vec<Value> = params
        .iter()
        .map(|p| p.cast(rank))
        .collect::<StoryResult<_>>()?;

    match &coerced[..] {
        [Value::Int(x)] => int_unary(op, *x),
        [Value::Float(x)] => float_unary(op, *x),
        [Value::List(x)] => list_unary(graph, op, x),
        [Value::Int(x), Value::Int(y)] => int_binary(op, *x, *y),
        [Value::Float(x), Value::Float(y)] => float_binary(op, *x, *y),
        [Value::Str(x), Value::Str(y)] => str_binary(op, x, y),
        [Value::DivertTarget(x), Value::DivertTarget(y)] => match op {
            NativeOp::Equal => Ok(Value::Bool(x == y)),
            NativeOp::NotEqual => Ok(Value::Bool(x != y)),
            _ => Err(unsupported(op, &coerced[0])),
        },
        _ => Err(unsupported(op, &coerced[0])),
    }
}

fn unsupported(op: NativeOp, v: &Value) -> StoryError {
    StoryError::eval(format!(
        "Can not perform operation '{}' on {}",
        op.token(),
        v.type_name()
    ))
}

fn int_unary(op: NativeOp, x: i64) -> StoryResult<Value> {
    Ok(match op {
        NativeOp::Negate => Value::Int(x.wrapping_neg()),
        NativeOp::Not => Value::Bool(x == 0),
        NativeOp::Floor | NativeOp::Ceiling | NativeOp::Int => Value::Int(x),
        NativeOp::Float => Value::Float(x as f64),
        _ => return Err(unsupported(op, &Value::Int(x))),
    })
}

fn float_unary(op: NativeOp, x: f64) -> StoryResult<Value> {
    Ok(match op {
        NativeOp::Negate => Value::Float(-x),
        NativeOp::Not => Value::Bool(x == 0.0),
        NativeOp::Floor => Value::Float(x.floor()),
        NativeOp::Ceiling => Value::Float(x.ceil()),
        NativeOp::Int => Value::Int(x as i64),
        NativeOp::Float => Value::Float(x),
        _ => return Err(unsupported(op, &Value::Float(x))),
    })
}

fn int_binary(op: NativeOp, x: i64, y: i64) -> StoryResult<Value> {
    use NativeOp::*;
    Ok(match op {
        Add => Value::Int(x.wrapping_add(y)),
        Subtract => Value::Int(x.wrapping_sub(y)),
        Multiply => Value::Int(x.wrapping_mul(y)),
        Divide => {
            if y == 0 {
                return Err(StoryError::eval(messages::DIVISION_BY_ZERO));
            }
            Value::Int(x.wrapping_div(y))
        }
        Mod => {
            if y == 0 {
                return Err(StoryError::eval(messages::DIVISION_BY_ZERO));
            }
            Value::Int(x.wrapping_rem(y))
        }
        Equal => Value::Bool(x == y),
        NotEqual => Value::Bool(x != y),
        Greater => Value::Bool(x > y),
        Less => Value::Bool(x < y),
        GreaterEq => Value::Bool(x >= y),
        LessEq => Value::Bool(x <= y),
        And => Value::Bool(x != 0 && y != 0),
        Or => Value::Bool(x != 0 || y != 0),
        Min => Value::Int(x.min(y)),
        Max => Value::Int(x.max(y)),
        Pow => Value::Float((x as f64).powf(y as f64)),
        _ => return Err(unsupported(op, &Value::Int(x))),
    })
}

fn float_binary(op: NativeOp, x: f64, y: f64) -> StoryResult<Value> {
    use NativeOp::*;
    Ok(match op {
        Add => Value::Float(x + y),
        Subtract => Value::Float(x - y),
        Multiply => Value::Float(x * y),
        Divide => {
            if y == 0.0 {
                return Err(StoryError::eval(messages::DIVISION_BY_ZERO));
            }
            Value::Float(x / y)
        }
        Mod => {
            if y == 0.0 {
                return Err(StoryError::eval(messages::DIVISION_BY_ZERO));
            }
            Value::Float(x % y)
        }
        Equal => Value::Bool(x == y),
        NotEqual => Value::Bool(x != y),
        Greater => Value::Bool(x > y),
        Less => Value::Bool(x < y),
        GreaterEq => Value::Bool(x >= y),
        LessEq => Value::Bool(x <= y),
        And => Value::Bool(x != 0.0 && y != 0.0),
        Or => Value::Bool(x != 0.0 || y != 0.0),
        Min => Value::Float(x.min(y)),
        Max => Value::Float(x.max(y)),
        Pow => Value::Float(x.powf(y)),
        _ => return Err(unsupported(op, &Value::Float(x))),
    })
}

fn str_binary(op: NativeOp, x: &str, y: &str) -> StoryResult<Value> {
    Ok(match op {
        NativeOp::Add => Value::Str(format!("{x}{y}")),
        NativeOp::Equal => Value::Bool(x == y),
        NativeOp::NotEqual => Value::Bool(x != y),
        NativeOp::Has => Value::Bool(x.contains(y)),
        NativeOp::HasNot => Value::Bool(!x.contains(y)),
        _ => return Err(unsupported(op, &Value::Str(x.to_string()))),
    })
}

fn list_unary(graph: &StoryGraph, op: NativeOp, x: &InkList) -> StoryResult<Value> {
    Ok(match op {
        NativeOp::Not => Value::Bool(x.is_empty()),
        NativeOp::ListMin => Value::List(x.min_as_list()),
        NativeOp::ListMax => Value::List(x.max_as_list()),
        NativeOp::ListAll => Value::List(x.all(graph)),
        NativeOp::ListInvert => Value::List(x.inverse(graph)),
        NativeOp::ListCount => Value::Int(x.len() as i64),
        NativeOp::ListValue => Value::Int(x.value()),
        _ => return Err(unsupported(op, &Value::List(x.clone()))),
    })
}

fn binary_list_op(graph: &StoryGraph, op: NativeOp, a: &Value, b: &Value) -> StoryResult<Value> {
    if let (Value::List(list), Value::Int(delta)) = (a, b) {
        match op {
            NativeOp::Add => return Ok(Value::List(list.shifted(graph, *delta))),
            NativeOp::Subtract => return Ok(Value::List(list.shifted(graph, -*delta))),
            _ => {}
        }
    }

    let (Value::List(x), Value::List(y)) = (a, b) else {
        if matches!(op, NativeOp::And | NativeOp::Or) {
            let (x, y) = (a.is_truthy()?, b.is_truthy()?);
            let r = if op == NativeOp::And { x && y } else { x || y };
            return Ok(Value::Bool(r));
        }
        return Err(StoryError::eval(format!(
            "Can not call use '{}' operation on {} and {}",
            op.token(),
            a.type_name(),
            b.type_name()
        )));
    };

    use NativeOp::*;
    Ok(match op {
        Add => Value::List(x.union(y)),
        Subtract => Value::List(x.without(y)),
        Intersect => Value::List(x.intersect(y)),
        Has => Value::Bool(x.contains(y)),
        HasNot => Value::Bool(!x.contains(y)),
        Equal => Value::Bool(x == y),
        NotEqual => Value::Bool(x != y),
        Greater => Value::Bool(x.greater_than(y)),
        Less => Value::Bool(x.less_than(y)),
        GreaterEq => Value::Bool(x.greater_than_or_equals(y)),
        LessEq => Value::Bool(x.less_than_or_equals(y)),
        And => Value::Bool(!x.is_empty() && !y.is_empty()),
        Or => Value::Bool(!x.is_empty() || !y.is_empty()),
        _ => return Err(unsupported(op, a)),
    })
}
