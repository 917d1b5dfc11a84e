//! Save-state format.
//!
//! The layout follows the JSON saves of the reference runtime, so a save
//! is a plain object with one flow, the changed globals and the counters.
//! Loading builds a complete replacement state first and never touches the
//! live one, so a bad save leaves the story as it was.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use weave_ir::{
    Component, ControlCommand, INK_VERSION_CURRENT, Literal, Node, Path, PushPopType, StoryGraph,
    Target, read_token, write_literal,
};

use crate::core::{
    CallStack, Choice, EvalStack, Frame, OutputItem, OutputStream, Pointer, StoryState, Thread,
    Value, VariablesState,
};
use crate::errors::{StoryError, StoryResult, messages};

pub const SAVE_VERSION_CURRENT: i64 = 10;
pub const SAVE_VERSION_MINIMUM_COMPATIBLE: i64 = 8;
const DEFAULT_FLOW: &str = "DEFAULT_FLOW";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveFile {
    ink_save_version: i64,
    ink_format_version: u32,
    flows: IndexMap<String, FlowSave>,
    current_flow_name: String,
    variables_state: IndexMap<String, JsonValue>,
    eval_stack: Vec<JsonValue>,
    visit_counts: IndexMap<String, i64>,
    turn_indices: IndexMap<String, i64>,
    turn_idx: i64,
    story_seed: i64,
    previous_random: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSave {
    callstack: CallStackSave,
    output_stream: Vec<JsonValue>,
    current_choices: Vec<ChoiceSave>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallStackSave {
    threads: Vec<ThreadSave>,
    thread_counter: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSave {
    callstack: Vec<FrameSave>,
    thread_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_content_object: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct FrameSave {
    #[serde(rename = "cPath", default, skip_serializing_if = "Option::is_none")]
    container_path: Option<String>,
    #[serde(default)]
    idx: usize,
    exp: bool,
    #[serde(rename = "type")]
    kind: i64,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    temp: IndexMap<String, JsonValue>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceSave {
    text: String,
    index: usize,
    original_choice_path: String,
    original_thread_index: usize,
    target_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    invisible_default: bool,
    thread_at_generation: ThreadSave,
}

pub(crate) fn save(graph: &StoryGraph, state: &StoryState) -> StoryResult<JsonValue> {
    let callstack = CallStackSave {
        threads: state
            .call_stack
            .threads()
            .iter()
            .map(|t| save_thread(graph, t))
            .collect(),
        thread_counter: state.call_stack.thread_counter,
    };
    let flow = FlowSave {
        callstack,
        output_stream: state.output.items().iter().map(save_output_item).collect(),
        current_choices: state
            .current_choices
            .iter()
            .map(|c| ChoiceSave {
                text: c.text.clone(),
                index: c.index,
                original_choice_path: c.source_path.clone(),
                original_thread_index: c.original_thread_index,
                target_path: c.target_path.to_string(),
                tags: c.tags.clone(),
                invisible_default: c.is_invisible_default,
                thread_at_generation: save_thread(graph, &c.thread_at_generation),
            })
            .collect(),
    };

    let file = SaveFile {
        ink_save_version: SAVE_VERSION_CURRENT,
        ink_format_version: INK_VERSION_CURRENT,
        flows: IndexMap::from([(DEFAULT_FLOW.to_string(), flow)]),
        current_flow_name: DEFAULT_FLOW.to_string(),
        variables_state: state
            .variables
            .changed_from_defaults()
            .map(|(k, v)| (k.clone(), save_value(v)))
            .collect(),
        eval_stack: state.eval_stack.values().iter().map(save_value).collect(),
        visit_counts: save_counts(graph, state.visit_counts.iter()),
        turn_indices: save_counts(graph, state.turn_indices.iter()),
        turn_idx: state.current_turn_index,
        story_seed: state.story_seed,
        previous_random: state.previous_random,
    };
    serde_json::to_value(file).map_err(|e| StoryError::Snapshot(e.to_string()))
}

fn save_counts<'a>(
    graph: &StoryGraph,
    counts: impl Iterator<Item = (&'a weave_ir::ContainerId, &'a i64)>,
) -> IndexMap<String, i64> {
    let mut out: Vec<(String, i64)> = counts
        .map(|(id, n)| (graph.container(*id).path.to_string(), *n))
        .collect();
    out.sort();
    out.into_iter().collect()
}

fn save_thread(graph: &StoryGraph, thread: &Thread) -> ThreadSave {
    ThreadSave {
        callstack: thread
            .frames
            .iter()
            .map(|f| FrameSave {
                container_path: f
                    .pointer
                    .map(|p| graph.container(p.container).path.to_string()),
                idx: f.pointer.map_or(0, |p| p.index),
                exp: f.in_expression_evaluation,
                kind: f.kind.as_int(),
                temp: f
                    .temporaries
                    .iter()
                    .map(|(k, v)| (k.clone(), save_value(v)))
                    .collect(),
            })
            .collect(),
        thread_index: thread.index,
        previous_content_object: thread.previous_pointer.map(|p| p.path(graph).to_string()),
    }
}

fn save_value(value: &Value) -> JsonValue {
    match value.to_literal() {
        Some(lit) => write_literal(&lit),
        None => json!("void"),
    }
}

fn save_output_item(item: &OutputItem) -> JsonValue {
    match item {
        OutputItem::Text(s) => write_literal(&Literal::Str(s.clone())),
        OutputItem::Tag(t) => json!({ "#": t }),
        OutputItem::Glue => json!("<>"),
        OutputItem::BeginString => json!(ControlCommand::BeginString.token()),
        OutputItem::BeginTag => json!(ControlCommand::BeginTag.token()),
        OutputItem::EndTag => json!(ControlCommand::EndTag.token()),
    }
}

/// Builds the state described by `json`. Globals missing from the save take
/// their defaults from `base`.
pub(crate) fn load(
    graph: &StoryGraph,
    base: &StoryState,
    json: &JsonValue,
) -> StoryResult<StoryState> {
    check_version(json)?;
    let mut file: SaveFile = serde_json::from_value(json.clone())
        .map_err(|e| StoryError::Snapshot(e.to_string()))?;
    let flow = file
        .flows
        .shift_remove(&file.current_flow_name)
        .ok_or_else(|| {
            StoryError::Snapshot(format!("flow '{}' missing from save", file.current_flow_name))
        })?;

    let mut state = StoryState::new(file.story_seed);
    state.previous_random = file.previous_random;
    state.current_turn_index = file.turn_idx;

    let threads = flow
        .callstack
        .threads
        .iter()
        .map(|t| load_thread(graph, t))
        .collect::<StoryResult<Vec<_>>>()?;
    if threads.is_empty() {
        return Err(StoryError::Snapshot("save has no call stack threads".into()));
    }
    state.call_stack = CallStack {
        threads,
        thread_counter: flow.callstack.thread_counter,
    };

    let mut variables = VariablesState {
        globals: base.variables.defaults.clone(),
        defaults: base.variables.defaults.clone(),
    };
    for (name, value) in &file.variables_state {
        variables
            .globals
            .insert(name.clone(), load_value(graph, value)?);
    }
    state.variables = variables;

    state.eval_stack = EvalStack::from_values(
        file.eval_stack
            .iter()
            .map(|v| load_value(graph, v))
            .collect::<StoryResult<_>>()?,
    );
    state.output = OutputStream::from_items(
        flow.output_stream
            .iter()
            .map(load_output_item)
            .collect::<StoryResult<_>>()?,
    );

    for (path, count) in &file.visit_counts {
        state.visit_counts.insert(load_container(graph, path)?, *count);
    }
    for (path, turn) in &file.turn_indices {
        state.turn_indices.insert(load_container(graph, path)?, *turn);
    }

    for c in &flow.current_choices {
        let target_path = Path::parse(&c.target_path);
        if graph.resolve(&target_path).is_none() {
            return Err(StoryError::unresolved(&target_path));
        }
        state.current_choices.push(Choice {
            text: c.text.clone(),
            index: c.index,
            target_path,
            source_path: c.original_choice_path.clone(),
            tags: c.tags.clone(),
            is_invisible_default: c.invisible_default,
            original_thread_index: c.original_thread_index,
            thread_at_generation: load_thread(graph, &c.thread_at_generation)?,
        });
    }
    Ok(state)
}

fn check_version(json: &JsonValue) -> StoryResult<()> {
    let Some(version) = json.get("inkSaveVersion").and_then(JsonValue::as_i64) else {
        return Err(StoryError::Version(messages::SNAPSHOT_VERSION_MISSING.into()));
    };
    if version < SAVE_VERSION_MINIMUM_COMPATIBLE {
        return Err(StoryError::Version(format!(
            "Ink save format isn't compatible with the current version (saw '{version}', but minimum is {SAVE_VERSION_MINIMUM_COMPATIBLE}), so can't load."
        )));
    }
    if version > SAVE_VERSION_CURRENT {
        return Err(StoryError::Version(format!(
            "Ink save format version {version} is newer than this runtime supports ({SAVE_VERSION_CURRENT})"
        )));
    }
    Ok(())
}

fn load_thread(graph: &StoryGraph, save: &ThreadSave) -> StoryResult<Thread> {
    let mut frames = Vec::with_capacity(save.callstack.len());
    for f in &save.callstack {
        let kind = PushPopType::from_int(f.kind)
            .ok_or_else(|| StoryError::Snapshot(format!("unknown frame type {}", f.kind)))?;
        let pointer = match &f.container_path {
            Some(path) => {
                let container = load_container(graph, path)?;
                check_slot(graph, container, f.idx, path)?;
                Some(Pointer {
                    container,
                    index: f.idx,
                })
            }
            None => None,
        };
        let mut frame = Frame::new(kind, pointer);
        frame.in_expression_evaluation = f.exp;
        for (name, value) in &f.temp {
            frame
                .temporaries
                .insert(name.clone(), load_value(graph, value)?);
        }
        frames.push(frame);
    }
    if frames.is_empty() {
        return Err(StoryError::Snapshot(format!(
            "thread {} has no frames",
            save.thread_index
        )));
    }
    let previous_pointer = match &save.previous_content_object {
        Some(path) => Some(load_pointer(graph, path)?),
        None => None,
    };
    Ok(Thread {
        frames,
        index: save.thread_index,
        previous_pointer,
        eval_height_at_fork: 0,
        output_len_at_fork: 0,
    })
}

fn load_container(graph: &StoryGraph, path: &str) -> StoryResult<weave_ir::ContainerId> {
    let path = Path::parse(path);
    match graph.resolve(&path) {
        Some(Target::Container(id)) => Ok(id),
        _ => Err(StoryError::unresolved(&path)),
    }
}

/// A saved index must name a node, or sit just past the container's end.
fn check_slot(
    graph: &StoryGraph,
    container: weave_ir::ContainerId,
    index: usize,
    path: impl std::fmt::Display,
) -> StoryResult<()> {
    if index > graph.container(container).content.len() {
        return Err(StoryError::unresolved(format!("{path}.{index}")));
    }
    Ok(())
}

/// A content path ending in an index names that slot of its container.
fn load_pointer(graph: &StoryGraph, path: &str) -> StoryResult<Pointer> {
    let parsed = Path::parse(path);
    if let (Some(Component::Index(index)), Some(parent)) = (parsed.last(), parsed.parent()) {
        if let Some(Target::Container(container)) = graph.resolve(&parent) {
            check_slot(graph, container, *index, &parent)?;
            return Ok(Pointer {
                container,
                index: *index,
            });
        }
    }
    match graph.resolve(&parsed) {
        Some(Target::Container(container)) => Ok(Pointer::start_of(container)),
        Some(Target::Node { container, index }) => Ok(Pointer { container, index }),
        None => Err(StoryError::unresolved(&parsed)),
    }
}

fn load_value(graph: &StoryGraph, json: &JsonValue) -> StoryResult<Value> {
    let node = read_token(json).map_err(|e| StoryError::Snapshot(e.to_string()))?;
    let value = match node {
        Node::Constant(lit) => Value::from_literal(&lit),
        Node::Text(s) => Value::Str(s),
        Node::Void => Value::Void,
        other => {
            return Err(StoryError::Snapshot(format!(
                "expected a value in save, found {other:?}"
            )));
        }
    };
    if let Value::DivertTarget(path) = &value {
        if graph.resolve(path).is_none() {
            return Err(StoryError::unresolved(path));
        }
    }
    Ok(value)
}

fn load_output_item(json: &JsonValue) -> StoryResult<OutputItem> {
    let node = read_token(json).map_err(|e| StoryError::Snapshot(e.to_string()))?;
    Ok(match node {
        Node::Text(s) => OutputItem::Text(s),
        Node::Tag(t) => OutputItem::Tag(t),
        Node::Glue => OutputItem::Glue,
        Node::Control(ControlCommand::BeginString) => OutputItem::BeginString,
        Node::Control(ControlCommand::BeginTag) => OutputItem::BeginTag,
        Node::Control(ControlCommand::EndTag) => OutputItem::EndTag,
        other => {
            return Err(StoryError::Snapshot(format!(
                "unexpected output stream entry {other:?}"
            )));
        }
    })
}
