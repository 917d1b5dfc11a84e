//! Bytecode JSON loader.
//!
//! Containers are arrays whose last element is either `null` or a terminator
//! object holding named-only children, `#f` count flags and `#n` the
//! container's own name. Relative paths found in nodes are anchored to the
//! enclosing container's absolute path while loading.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::messages;
use crate::{
    ChoiceFlags, ChoicePoint, Component, Container, ContainerId, ControlCommand, CountFlags,
    Divert, DivertTarget, ListDefinition, ListLiteral, LoadError, Literal, NativeOp, Node, Path,
    PushPopType, StoryGraph, VariableAssignment,
};

pub const INK_VERSION_CURRENT: u32 = 21;
pub const INK_VERSION_MINIMUM_COMPATIBLE: u32 = 18;

pub fn load_story(json: &str) -> Result<StoryGraph, LoadError> {
    let data: Value = serde_json::from_str(json.trim_start_matches('\u{feff}'))?;
    load_story_value(&data)
}

pub fn load_story_value(data: &Value) -> Result<StoryGraph, LoadError> {
    let obj = data
        .as_object()
        .ok_or_else(|| LoadError::Malformed("top level must be an object".into()))?;

    let version = read_version(obj)?;
    if version > INK_VERSION_CURRENT {
        return Err(LoadError::VersionTooNew(version));
    }
    if version < INK_VERSION_MINIMUM_COMPATIBLE {
        return Err(LoadError::VersionTooOld(version));
    }
    if version != INK_VERSION_CURRENT {
        warn!(version, "{}", messages::VERSION_OUT_OF_DATE);
    }
    debug!(version, "loading story graph");

    let root = obj.get("root").ok_or(LoadError::MissingRoot)?;
    let root = root
        .as_array()
        .ok_or_else(|| LoadError::Malformed("root must be a container".into()))?;

    let mut graph = StoryGraph::new(version);
    read_container(&mut graph, root, None, Path::root(), None)?;

    if let Some(defs) = obj.get("listDefs").and_then(Value::as_object) {
        for (name, items) in defs {
            let items = items
                .as_object()
                .ok_or_else(|| LoadError::Malformed(format!("list definition '{name}'")))?;
            let mut def = ListDefinition {
                name: name.clone(),
                items: IndexMap::new(),
            };
            for (item, v) in items {
                let v = v
                    .as_i64()
                    .ok_or_else(|| LoadError::Malformed(format!("list item '{name}.{item}'")))?;
                def.items.insert(item.clone(), v);
            }
            graph.list_definitions.insert(name.clone(), def);
        }
    }

    debug!(containers = graph.containers.len(), "story graph loaded");
    Ok(graph)
}

fn read_version(obj: &Map<String, Value>) -> Result<u32, LoadError> {
    let v = obj.get("inkVersion").ok_or(LoadError::VersionMissing)?;
    let parsed = match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| LoadError::VersionMalformed(v.to_string()))
}

fn own_name(arr: &[Value]) -> Option<String> {
    arr.last()
        .and_then(Value::as_object)
        .and_then(|t| t.get("#n"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn read_container(
    graph: &mut StoryGraph,
    arr: &[Value],
    name: Option<String>,
    path: Path,
    parent: Option<ContainerId>,
) -> Result<ContainerId, LoadError> {
    let id = graph.alloc(Container {
        name,
        path: path.clone(),
        parent,
        content: Vec::new(),
        named: IndexMap::new(),
        named_only: Vec::new(),
        flags: CountFlags::default(),
    });

    let (body, terminator) = match arr.split_last() {
        None => (arr, None),
        Some((Value::Null, body)) => (body, None),
        Some((Value::Object(t), body)) => (body, Some(t)),
        Some((other, _)) => {
            return Err(LoadError::Malformed(format!(
                "container '{path}' has no terminator, found {other}"
            )));
        }
    };

    let mut content = Vec::with_capacity(body.len());
    let mut named = IndexMap::new();
    for (i, token) in body.iter().enumerate() {
        if let Value::Array(child) = token {
            let child_name = own_name(child);
            let component = match &child_name {
                Some(n) => Component::Name(n.clone()),
                None => Component::Index(i),
            };
            let child_path = path.with_component(component);
            let child_id = read_container(graph, child, child_name.clone(), child_path, Some(id))?;
            if let Some(n) = child_name {
                named.insert(n, child_id);
            }
            content.push(Node::Container(child_id));
        } else {
            content.push(read_node(token, &path)?);
        }
    }

    let mut flags = CountFlags::default();
    let mut named_only = Vec::new();
    if let Some(terminator) = terminator {
        for (key, value) in terminator {
            match key.as_str() {
                "#f" => {
                    let bits = value
                        .as_u64()
                        .ok_or_else(|| LoadError::Malformed(format!("flags of '{path}'")))?;
                    flags = CountFlags::from_bits(bits as u32);
                }
                "#n" => {}
                _ => {
                    let child = value.as_array().ok_or_else(|| {
                        LoadError::Malformed(format!("named content '{key}' in '{path}'"))
                    })?;
                    let child_path = path.with_component(Component::Name(key.clone()));
                    let child_id =
                        read_container(graph, child, Some(key.clone()), child_path, Some(id))?;
                    named.insert(key.clone(), child_id);
                    named_only.push(key.clone());
                }
            }
        }
    }

    let c = graph.container_mut(id);
    c.content = content;
    c.named = named;
    c.named_only = named_only;
    c.flags = flags;
    Ok(id)
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Decodes a single content token with no enclosing container, as stored
/// in save files.
pub fn read_token(token: &Value) -> Result<Node, LoadError> {
    read_node(token, &Path::root())
}

fn read_node(token: &Value, here: &Path) -> Result<Node, LoadError> {
    match token {
        Value::Bool(b) => Ok(Node::Constant(Literal::Bool(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Node::Constant(Literal::Int(i)))
            } else {
                Ok(Node::Constant(Literal::Float(n.as_f64().unwrap_or(0.0))))
            }
        }
        Value::String(s) => read_string_token(s),
        Value::Object(obj) => read_object_token(obj, here),
        other => Err(LoadError::UnknownToken(other.to_string())),
    }
}

fn read_string_token(s: &str) -> Result<Node, LoadError> {
    if let Some(text) = s.strip_prefix('^') {
        return Ok(Node::Text(text.to_string()));
    }
    match s {
        "\n" => return Ok(Node::Text("\n".into())),
        "<>" | "G<" | "G>" => return Ok(Node::Glue),
        "void" => return Ok(Node::Void),
        _ => {}
    }
    if let Some(cmd) = ControlCommand::from_token(s) {
        return Ok(Node::Control(cmd));
    }
    if let Some(op) = NativeOp::from_token(s) {
        return Ok(Node::NativeCall(op));
    }
    Err(LoadError::UnknownToken(s.to_string()))
}

fn read_object_token(obj: &Map<String, Value>, here: &Path) -> Result<Node, LoadError> {
    let anchored = |s: &str| Path::parse(s).anchored_at(here);

    if let Some(p) = str_field(obj, "^->") {
        return Ok(Node::Constant(Literal::DivertTarget(anchored(p))));
    }

    if let Some(name) = str_field(obj, "^var") {
        let context_index = obj.get("ci").and_then(Value::as_i64).unwrap_or(-1);
        return Ok(Node::Constant(Literal::VariablePointer {
            name: name.to_string(),
            context_index,
        }));
    }

    let divert = [
        ("->", None),
        ("f()", Some(PushPopType::Function)),
        ("->t->", Some(PushPopType::Tunnel)),
        ("x()", None),
    ]
    .into_iter()
    .find_map(|(key, push)| str_field(obj, key).map(|t| (key, push, t)));

    if let Some((key, push, target)) = divert {
        let target = if key == "x()" {
            let args = obj.get("exArgs").and_then(Value::as_u64).unwrap_or(0) as usize;
            DivertTarget::External {
                name: target.to_string(),
                args,
            }
        } else if bool_field(obj, "var") {
            DivertTarget::Variable(target.to_string())
        } else {
            DivertTarget::Path(anchored(target))
        };
        return Ok(Node::Divert(Divert {
            target,
            is_conditional: bool_field(obj, "c"),
            push,
        }));
    }

    if let Some(p) = str_field(obj, "*") {
        let bits = obj.get("flg").and_then(Value::as_u64).unwrap_or(0) as u32;
        return Ok(Node::ChoicePoint(ChoicePoint {
            path_on_choice: anchored(p),
            flags: ChoiceFlags::from_bits(bits),
        }));
    }

    if let Some(name) = str_field(obj, "VAR?") {
        return Ok(Node::VariableReference(name.to_string()));
    }
    if let Some(p) = str_field(obj, "CNT?") {
        return Ok(Node::ReadCount(anchored(p)));
    }

    if let Some(name) = str_field(obj, "VAR=") {
        return Ok(Node::VariableAssignment(VariableAssignment {
            name: name.to_string(),
            is_global: true,
            is_new_declaration: !bool_field(obj, "re"),
        }));
    }
    if let Some(name) = str_field(obj, "temp=") {
        return Ok(Node::VariableAssignment(VariableAssignment {
            name: name.to_string(),
            is_global: false,
            is_new_declaration: !bool_field(obj, "re"),
        }));
    }

    if let Some(text) = str_field(obj, "#") {
        return Ok(Node::Tag(text.to_string()));
    }

    if let Some(items) = obj.get("list").and_then(Value::as_object) {
        let mut list = ListLiteral::default();
        for (k, v) in items {
            list.items.insert(k.clone(), v.as_i64().unwrap_or(0));
        }
        if let Some(origins) = obj.get("origins").and_then(Value::as_array) {
            list.origins = origins
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        return Ok(Node::Constant(Literal::List(list)));
    }

    Err(LoadError::UnknownToken(Value::Object(obj.clone()).to_string()))
}
