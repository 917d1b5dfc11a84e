use std::rc::Rc;

use weave_ir::{ControlCommand, PushPopType, Target};

use crate::Story;
use crate::core::{InkList, ListItem, OutputItem, Value, clean_output_whitespace};
use crate::errors::{StoryError, StoryResult, messages};
use crate::util::SeededDraws;

pub(crate) fn execute(story: &mut Story, cmd: ControlCommand) -> StoryResult<()> {
    use ControlCommand::*;
    let graph = Rc::clone(&story.graph);
    let state = &mut story.state;
    match cmd {
        EvalStart => state.set_in_expression_evaluation(true),
        EvalEnd => state.set_in_expression_evaluation(false),
        EvalOutput => {
            if !state.eval_stack.is_empty() {
                let value = state.eval_stack.pop()?;
                if !value.is_void() {
                    state.push_output(OutputItem::Text(value.to_string()));
                }
            }
        }
        NoOp => {}
        Duplicate => {
            let top = state.eval_stack.peek()?.clone();
            state.eval_stack.push(top);
        }
        PopEvaluatedValue => {
            state.eval_stack.pop()?;
        }
        PopFunction | PopTunnel => {
            let kind = if cmd == PopFunction {
                PushPopType::Function
            } else {
                PushPopType::Tunnel
            };
            let mut return_override = None;
            if kind == PushPopType::Tunnel {
                match state.eval_stack.pop()? {
                    Value::DivertTarget(p) => return_override = Some(p),
                    Value::Void => {}
                    other => {
                        return Err(StoryError::control(format!(
                            "Expected void if ->-> doesn't override target, found {}",
                            other.type_name()
                        )));
                    }
                }
            }

            if state.try_exit_function_evaluation_from_game() {
                return Ok(());
            }
            if !state.call_stack.can_pop(None) {
                return Err(StoryError::control(messages::CALLSTACK_UNDERFLOW));
            }
            let found = state.call_stack.current_frame().kind;
            if found != kind {
                return Err(StoryError::control(format!(
                    "Found {}, when expected {}",
                    frame_kind_name(found),
                    frame_kind_name(kind)
                )));
            }
            state.pop_callstack(Some(kind))?;
            if let Some(path) = return_override {
                let pointer = story.pointer_at_path(&path)?;
                story.state.diverted_pointer = Some(pointer);
            }
        }
        BeginString => {
            state.push_output(OutputItem::BeginString);
            state.set_in_expression_evaluation(false);
        }
        EndString => end_string(story)?,
        BeginTag => state.push_output(OutputItem::BeginTag),
        EndTag => {
            if state.output.in_string_evaluation() {
                let mut parts = Vec::new();
                let mut consumed = 0;
                let mut closed = false;
                for item in state.output.items().iter().rev() {
                    consumed += 1;
                    match item {
                        OutputItem::BeginTag => {
                            closed = true;
                            break;
                        }
                        OutputItem::Text(t) => parts.push(t.clone()),
                        OutputItem::BeginString | OutputItem::EndTag => break,
                        _ => {}
                    }
                }
                if !closed {
                    return Err(StoryError::control(messages::TAG_MISMATCH));
                }
                state.output.pop_n(consumed);
                parts.reverse();
                let text = clean_output_whitespace(&parts.concat());
                state.pending_choice_tags.push(text);
            } else {
                state.push_output(OutputItem::EndTag);
            }
        }
        ChoiceCount => {
            let n = state.current_choices.len() as i64;
            state.eval_stack.push(Value::Int(n));
        }
        Turns => {
            let n = state.current_turn_index + 1;
            state.eval_stack.push(Value::Int(n));
        }
        TurnsSince | ReadCount => {
            let target = match state.eval_stack.pop()? {
                Value::DivertTarget(p) => p,
                other => {
                    return Err(StoryError::eval(format!(
                        "TURNS_SINCE / READ_COUNT expected a divert target (knot, stitch, label name), but saw {}",
                        other.type_name()
                    )));
                }
            };
            let count = match graph.resolve(&target) {
                Some(Target::Container(id)) => {
                    if cmd == TurnsSince {
                        state.turns_since(&graph, id)?
                    } else {
                        state.visit_count(&graph, id)?
                    }
                }
                _ => {
                    state.add_warning(format!(
                        "Failed to find container for {} lookup at {target}",
                        cmd.token()
                    ));
                    if cmd == TurnsSince { -1 } else { 0 }
                }
            };
            state.eval_stack.push(Value::Int(count));
        }
        Random => {
            let max = pop_int(story, "maximum parameter of RANDOM(min, max)")?;
            let min = pop_int(story, "minimum parameter of RANDOM(min, max)")?;
            let range = max
                .checked_sub(min)
                .and_then(|r| r.checked_add(1))
                .filter(|r| *r > 0)
                .ok_or_else(|| {
                    StoryError::eval(format!(
                        "RANDOM was called with minimum as {min} and maximum as {max}. The maximum must be larger"
                    ))
                })?;
            let state = &mut story.state;
            let seed = state.story_seed.wrapping_add(state.previous_random);
            let next = SeededDraws::new(story.caps.rng.as_ref(), seed).next();
            state.eval_stack.push(Value::Int(next % range + min));
            state.previous_random = next;
        }
        SeedRandom => {
            let seed = pop_int(story, "SEED_RANDOM")?;
            let state = &mut story.state;
            state.story_seed = seed;
            state.previous_random = 0;
            state.eval_stack.push(Value::Void);
        }
        VisitIndex => {
            let container = state
                .current_pointer()
                .ok_or_else(|| StoryError::control("visit index outside of content"))?
                .container;
            let count = state.visit_count(&graph, container)? - 1;
            state.eval_stack.push(Value::Int(count));
        }
        SequenceShuffleIndex => {
            let index = next_sequence_shuffle_index(story)?;
            story.state.eval_stack.push(Value::Int(index));
        }
        // Pushed by the step loop once the pointer has moved past this node.
        StartThread => {}
        Done => {
            if state.call_stack.can_pop_thread() {
                state.call_stack.pop_thread()?;
            } else {
                state.did_safe_exit = true;
                state.set_current_pointer(None);
            }
        }
        End => state.force_end(),
        ListFromInt => {
            let value = pop_int(story, "list element value")?;
            let name = match story.state.eval_stack.pop()? {
                Value::Str(s) => s,
                other => {
                    return Err(StoryError::eval(format!(
                        "Expected list name, found {}",
                        other.type_name()
                    )));
                }
            };
            if graph.list_definition(&name).is_none() {
                return Err(StoryError::eval(format!("Failed to find LIST called {name}")));
            }
            let list = InkList::single(&graph, &name, value).unwrap_or_default();
            story.state.eval_stack.push(Value::List(list));
        }
        ListRange => {
            let max = state.eval_stack.pop()?;
            let min = state.eval_stack.pop()?;
            let target = state.eval_stack.pop()?;
            let (Value::List(list), Some(lo), Some(hi)) =
                (&target, range_bound(&min, true), range_bound(&max, false))
            else {
                return Err(StoryError::eval(
                    "Expected list, minimum and maximum for LIST_RANGE",
                ));
            };
            state.eval_stack.push(Value::List(list.range(lo, hi)));
        }
        ListRandom => {
            let list = match state.eval_stack.pop()? {
                Value::List(l) => l,
                _ => return Err(StoryError::eval("Expected list for LIST_RANDOM")),
            };
            let mut out = InkList::new();
            if !list.is_empty() {
                let seed = state.story_seed.wrapping_add(state.previous_random);
                let next = SeededDraws::new(story.caps.rng.as_ref(), seed).next();
                let pick = (next as usize) % list.len();
                if let Some((item, value)) = list.item_at(pick) {
                    out.insert(ListItem::new(item.origin, item.name), value);
                }
                story.state.previous_random = next;
            }
            story.state.eval_stack.push(Value::List(out));
        }
    }
    Ok(())
}

fn frame_kind_name(kind: PushPopType) -> &'static str {
    match kind {
        PushPopType::Function => "function return statement (~ return)",
        PushPopType::Tunnel => "tunnel onwards statement (->->)",
        PushPopType::FunctionEvaluationFromGame => "function evaluation from game",
    }
}

fn pop_int(story: &mut Story, what: &str) -> StoryResult<i64> {
    match story.state.eval_stack.pop()? {
        Value::Int(i) => Ok(i),
        other => Err(StoryError::eval(format!(
            "Invalid value for {what}: {}",
            other.type_name()
        ))),
    }
}

fn range_bound(v: &Value, lower: bool) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Float(f) => Some(*f as i64),
        Value::List(l) if lower => Some(l.min_item().map(|(_, v)| v).unwrap_or(0)),
        Value::List(l) => Some(l.max_item().map(|(_, v)| v).unwrap_or(0)),
        _ => None,
    }
}

fn end_string(story: &mut Story) -> StoryResult<()> {
    let state = &mut story.state;
    let mut strings = Vec::new();
    let mut tags = Vec::new();
    let mut consumed = 0;
    let mut opened = false;
    for item in state.output.items().iter().rev() {
        consumed += 1;
        match item {
            OutputItem::BeginString => {
                opened = true;
                break;
            }
            OutputItem::Tag(t) => tags.push(t.clone()),
            OutputItem::Text(t) => strings.push(t.clone()),
            _ => {}
        }
    }
    if !opened {
        return Err(StoryError::control(messages::STRING_EVAL_MISMATCH));
    }
    state.output.pop_n(consumed);
    for tag in tags.into_iter().rev() {
        state.push_output(OutputItem::Tag(tag));
    }
    strings.reverse();
    state.set_in_expression_evaluation(true);
    state.eval_stack.push(Value::Str(strings.concat()));
    Ok(())
}

/// Picks the next element of a shuffle sequence. Every loop through the
/// sequence yields one permutation, fixed by the container path, the loop
/// index and the story seed.
fn next_sequence_shuffle_index(story: &mut Story) -> StoryResult<i64> {
    let elements = pop_int(story, "number of elements in sequence for shuffle index")?;
    let seen = pop_int(story, "sequence count for shuffle index")?;
    if elements <= 0 {
        return Err(StoryError::eval("shuffle sequence has no elements"));
    }
    let container = story
        .state
        .current_pointer()
        .ok_or_else(|| StoryError::control("shuffle outside of content"))?
        .container;

    let loop_index = seen / elements;
    let iteration = seen % elements;
    let path = story.graph.container(container).path.to_string();
    let hash: i64 = path.chars().map(|c| c as i64).sum();
    let seed = hash
        .wrapping_add(loop_index)
        .wrapping_add(story.state.story_seed);

    let mut draws = SeededDraws::new(story.caps.rng.as_ref(), seed);
    let mut unpicked: Vec<i64> = (0..elements).collect();
    for i in 0..=iteration {
        let chosen = (draws.next() as usize) % unpicked.len();
        let index = unpicked.remove(chosen);
        if i == iteration {
            return Ok(index);
        }
    }
    Err(StoryError::control("shuffle index out of range"))
}
