//! Writes a content graph back to bytecode JSON.

use serde_json::{Map, Value, json};

use crate::{
    ContainerId, DivertTarget, Literal, Node, PushPopType, StoryGraph, json_read::INK_VERSION_CURRENT,
};

pub fn write_story(graph: &StoryGraph) -> Value {
    let mut out = Map::new();
    out.insert("inkVersion".into(), json!(INK_VERSION_CURRENT));
    out.insert("root".into(), write_container(graph, StoryGraph::ROOT, true));
    if !graph.list_definitions.is_empty() {
        let mut defs = Map::new();
        for (name, def) in &graph.list_definitions {
            let items: Map<String, Value> =
                def.items.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            defs.insert(name.clone(), Value::Object(items));
        }
        out.insert("listDefs".into(), Value::Object(defs));
    }
    Value::Object(out)
}

pub fn write_story_string(graph: &StoryGraph) -> String {
    write_story(graph).to_string()
}

fn write_container(graph: &StoryGraph, id: ContainerId, inline: bool) -> Value {
    let c = graph.container(id);
    let mut arr: Vec<Value> = c
        .content
        .iter()
        .map(|node| match node {
            Node::Container(child) => write_container(graph, *child, true),
            other => write_node(other),
        })
        .collect();

    let mut terminator = Map::new();
    for name in &c.named_only {
        if let Some(child) = c.named.get(name) {
            terminator.insert(name.clone(), write_container(graph, *child, false));
        }
    }
    if c.flags.bits() != 0 {
        terminator.insert("#f".into(), json!(c.flags.bits()));
    }
    if inline {
        if let Some(name) = &c.name {
            terminator.insert("#n".into(), json!(name));
        }
    }

    arr.push(if terminator.is_empty() {
        Value::Null
    } else {
        Value::Object(terminator)
    });
    Value::Array(arr)
}

fn write_node(node: &Node) -> Value {
    match node {
        Node::Text(s) if s == "\n" => json!("\n"),
        Node::Text(s) => json!(format!("^{s}")),
        Node::Tag(t) => json!({ "#": t }),
        Node::Glue => json!("<>"),
        Node::Void => json!("void"),
        Node::Control(cmd) => json!(cmd.token()),
        Node::NativeCall(op) => json!(op.token()),
        Node::VariableReference(name) => json!({ "VAR?": name }),
        Node::ReadCount(path) => json!({ "CNT?": path.to_string() }),
        Node::VariableAssignment(a) => {
            let key = if a.is_global { "VAR=" } else { "temp=" };
            let mut m = Map::new();
            m.insert(key.into(), json!(a.name));
            if !a.is_new_declaration {
                m.insert("re".into(), json!(true));
            }
            Value::Object(m)
        }
        Node::ChoicePoint(cp) => {
            json!({ "*": cp.path_on_choice.to_string(), "flg": cp.flags.bits() })
        }
        Node::Divert(d) => {
            let mut m = Map::new();
            match &d.target {
                DivertTarget::External { name, args } => {
                    m.insert("x()".into(), json!(name));
                    m.insert("exArgs".into(), json!(args));
                }
                target => {
                    let key = match d.push {
                        Some(PushPopType::Function) => "f()",
                        Some(PushPopType::Tunnel) => "->t->",
                        _ => "->",
                    };
                    match target {
                        DivertTarget::Variable(name) => {
                            m.insert(key.into(), json!(name));
                            m.insert("var".into(), json!(true));
                        }
                        DivertTarget::Path(p) => {
                            m.insert(key.into(), json!(p.to_string()));
                        }
                        DivertTarget::External { .. } => {}
                    }
                }
            }
            if d.is_conditional {
                m.insert("c".into(), json!(true));
            }
            Value::Object(m)
        }
        Node::Constant(lit) => write_literal(lit),
        // Nested containers are written by `write_container`.
        Node::Container(_) => Value::Null,
    }
}

pub fn write_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Bool(b) => json!(b),
        Literal::Int(i) => json!(i),
        Literal::Float(f) => json!(f),
        Literal::Str(s) if s == "\n" => json!("\n"),
        Literal::Str(s) => json!(format!("^{s}")),
        Literal::DivertTarget(p) => json!({ "^->": p.to_string() }),
        Literal::VariablePointer {
            name,
            context_index,
        } => json!({ "^var": name, "ci": context_index }),
        Literal::List(list) => {
            let items: Map<String, Value> =
                list.items.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let mut m = Map::new();
            m.insert("list".into(), Value::Object(items));
            if !list.origins.is_empty() {
                m.insert("origins".into(), json!(list.origins));
            }
            Value::Object(m)
        }
    }
}
