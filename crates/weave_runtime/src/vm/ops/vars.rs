use weave_ir::{Path, Target, VariableAssignment};

use crate::Story;
use crate::core::Value;
use crate::errors::{StoryError, StoryResult};

pub(crate) fn assign(story: &mut Story, assignment: &VariableAssignment) -> StoryResult<()> {
    let value = story.state.eval_stack.pop()?;
    let state = &mut story.state;
    let change = state
        .variables
        .assign(assignment, value, &mut state.call_stack, &story.graph)?;
    if let Some(change) = change {
        story.notify_variable_change(change);
    }
    Ok(())
}

pub(crate) fn read(story: &mut Story, name: &str) -> StoryResult<()> {
    let state = &story.state;
    let value = state
        .variables
        .get(name, -1, &state.call_stack, &story.graph)
        .ok_or_else(|| StoryError::eval(format!("Variable not found: '{name}'")))?;
    story.state.eval_stack.push(value);
    Ok(())
}

pub(crate) fn read_count(story: &mut Story, path: &Path) -> StoryResult<()> {
    let Some(Target::Container(id)) = story.graph.resolve(path) else {
        return Err(StoryError::unresolved(path));
    };
    let count = story.state.visit_count(&story.graph, id)?;
    story.state.eval_stack.push(Value::Int(count));
    Ok(())
}
