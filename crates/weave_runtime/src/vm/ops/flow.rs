use tracing::debug;
use weave_ir::{Divert, DivertTarget, PushPopType};

use crate::Story;
use crate::core::{Pointer, Value};
use crate::errors::{StoryError, StoryResult};

pub(crate) fn divert(story: &mut Story, divert: &Divert) -> StoryResult<()> {
    if divert.is_conditional {
        let condition = story.state.eval_stack.pop()?;
        if !condition.is_truthy()? {
            return Ok(());
        }
    }

    let target = match &divert.target {
        DivertTarget::External { name, args } => {
            return call_external(story, name, *args);
        }
        DivertTarget::Path(path) => story.pointer_at_path(path)?,
        DivertTarget::Variable(name) => {
            let state = &story.state;
            let value = state
                .variables
                .get(name, -1, &state.call_stack, &story.graph)
                .ok_or_else(|| {
                    StoryError::Resolution(format!(
                        "Tried to divert using a target from a variable that could not be found ({name})"
                    ))
                })?;
            let Value::DivertTarget(path) = value else {
                return Err(StoryError::eval(format!(
                    "Tried to divert to a target from a variable, but the variable ({name}) didn't contain a divert target, it contained {}",
                    value.type_name()
                )));
            };
            story.pointer_at_path(&path)?
        }
    };

    story.state.diverted_pointer = Some(target);
    if let Some(kind) = divert.push {
        let state = &mut story.state;
        let height = state.eval_stack.len();
        let out_len = state.output.len();
        state.call_stack.push(kind, height, out_len);
    }
    Ok(())
}

/// Runs a bound host function, or diverts into the ink fallback of the same
/// name when none is bound.
pub(crate) fn call_external(story: &mut Story, name: &str, args: usize) -> StoryResult<()> {
    let bound = story.externals.is_lookahead_safe(name);

    if bound == Some(false) && story.lookahead.active() {
        // Stop the lookahead here so the call happens exactly once.
        story.lookahead.saw_unsafe_external = true;
        return Ok(());
    }
    if bound == Some(false) && story.state.call_stack.is_forked() {
        return Err(StoryError::ExternalFunction {
            name: name.to_string(),
            message: "lookahead-unsafe function called from a forked thread".into(),
        });
    }

    if bound.is_none() {
        let fallback = story
            .config
            .allow_external_function_fallbacks
            .then(|| story.graph.named_root_container(name))
            .flatten();
        let Some(container) = fallback else {
            return Err(StoryError::ExternalFunction {
                name: name.to_string(),
                message: if story.config.allow_external_function_fallbacks {
                    "not bound, and no fallback ink function was found".into()
                } else {
                    "not bound (and ink fallbacks disabled)".into()
                },
            });
        };
        debug!(function = name, "using ink fallback for unbound external");
        let state = &mut story.state;
        let height = state.eval_stack.len();
        let out_len = state.output.len();
        state.call_stack.push(PushPopType::Function, height, out_len);
        state.diverted_pointer = Some(Pointer::start_of(container));
        return Ok(());
    }

    let params = story.state.eval_stack.pop_n(args)?;
    let Some(mut fun) = story.externals.take(name) else {
        return Err(StoryError::ExternalFunction {
            name: name.to_string(),
            message: "binding disappeared during the call".into(),
        });
    };
    story.callback_depth += 1;
    let result = (fun.callback)(story, &params);
    story.callback_depth -= 1;
    story.externals.restore(name, fun);

    let value = result.map_err(|message| StoryError::ExternalFunction {
        name: name.to_string(),
        message,
    })?;
    story.state.eval_stack.push(value);
    Ok(())
}
