use weave_ir::{ChoicePoint, Target};

use crate::Story;
use crate::core::{Choice, Pointer, Value};
use crate::errors::{StoryError, StoryResult};

/// Evaluates a choice point. Its condition and text are always popped so
/// they never leak into output, even when the choice is not shown.
pub(crate) fn process_choice(
    story: &mut Story,
    point: &ChoicePoint,
    at: Pointer,
) -> StoryResult<Option<Choice>> {
    let graph = &story.graph;
    let state = &mut story.state;
    let flags = point.flags;

    let mut show = true;
    if flags.has_condition && !state.eval_stack.pop()?.is_truthy()? {
        show = false;
    }

    let tags = std::mem::take(&mut state.pending_choice_tags);
    let mut choice_only = String::new();
    let mut start = String::new();
    if flags.has_choice_only_content {
        choice_only = pop_text(state.eval_stack.pop()?)?;
    }
    if flags.has_start_content {
        start = pop_text(state.eval_stack.pop()?)?;
    }

    if flags.only_once {
        let Some(Target::Container(target)) = graph.resolve(&point.path_on_choice) else {
            return Err(StoryError::unresolved(&point.path_on_choice));
        };
        if state.visit_count(graph, target)? > 0 {
            show = false;
        }
    }
    if !show {
        return Ok(None);
    }

    let original_thread_index = state.call_stack.current_thread().index;
    let thread = state.call_stack.fork_thread();
    let text = format!("{start}{choice_only}")
        .trim_matches(|c| c == ' ' || c == '\t')
        .to_string();
    Ok(Some(Choice {
        text,
        index: 0,
        target_path: point.path_on_choice.clone(),
        source_path: at.path(graph).to_string(),
        tags,
        is_invisible_default: flags.invisible_default,
        original_thread_index,
        thread_at_generation: thread,
    }))
}

fn pop_text(value: Value) -> StoryResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(StoryError::eval(format!(
            "Expected choice text, found {}",
            other.type_name()
        ))),
    }
}
