use proptest::prelude::*;
use weave_ir::{
    Component, ControlCommand, DivertTarget, LoadError, Node, Path, StoryGraph, Target,
    load_story, write_story_string,
};

const SMALL: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["^Hello", "\n", {"->": "knot"}, null],
    "done",
    {
      "knot": [
        "^In the knot.", "\n",
        ["^inner", {"->": ".^.^.2"}, {"#n": "g-0"}],
        "end",
        {"#f": 3}
      ],
      "global decl": ["ev", 5, {"VAR=": "x"}, "/ev", "end", null]
    }
  ],
  "listDefs": {"Colours": {"red": 1, "green": 2}}
}"##;

fn load(json: &str) -> StoryGraph {
    load_story(json).unwrap()
}

#[test]
fn loads_nested_and_named_containers() {
    let g = load(SMALL);
    let root = g.root();
    assert_eq!(root.content.len(), 2);
    assert!(root.named.contains_key("knot"));
    assert!(root.named.contains_key("global decl"));
    assert_eq!(root.named_only, vec!["knot".to_string(), "global decl".to_string()]);

    let knot = g.named_root_container("knot").unwrap();
    let knot = g.container(knot);
    assert!(knot.counts_visits());
    assert!(knot.counts_turns());
    assert_eq!(knot.path.to_string(), "knot");
    assert!(matches!(knot.content[3], Node::Control(ControlCommand::End)));
}

#[test]
fn resolves_paths_to_containers_and_nodes() {
    let g = load(SMALL);
    let knot = g.container_at("knot").unwrap();
    assert_eq!(g.resolve(&Path::parse("knot")), Some(Target::Container(knot)));
    assert_eq!(
        g.resolve(&Path::parse("knot.0")),
        Some(Target::Node {
            container: knot,
            index: 0
        })
    );
    let gather = g.container_at("knot.g-0").unwrap();
    assert_eq!(g.resolve(&Path::parse("knot.g-0")), Some(Target::Container(gather)));
    assert_eq!(g.resolve(&Path::parse("knot.2")), Some(Target::Container(gather)));
    assert_eq!(g.resolve(&Path::parse("nowhere")), None);
    assert_eq!(g.resolve(&Path::parse("knot.0.1")), None);
}

#[test]
fn relative_divert_is_anchored_to_its_container() {
    let g = load(SMALL);
    let gather = g.container_at("knot.g-0").unwrap();
    match &g.container(gather).content[1] {
        Node::Divert(d) => match &d.target {
            DivertTarget::Path(p) => assert_eq!(p.to_string(), "knot.2"),
            other => panic!("unexpected target {other:?}"),
        },
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn loads_list_definitions() {
    let g = load(SMALL);
    let (def, value) = g.find_list_item("Colours.green").unwrap();
    assert_eq!(def.name, "Colours");
    assert_eq!(value, 2);
    assert_eq!(def.item_with_value(1), Some("red"));
    assert!(g.find_list_item("green").is_some());
    assert!(g.find_list_item("blue").is_none());
}

#[test]
fn rejects_missing_and_incompatible_versions() {
    let err = load_story(r##"{"root": [null]}"##).unwrap_err();
    assert!(matches!(err, LoadError::VersionMissing));
    assert!(err.is_version());

    let err = load_story(r##"{"inkVersion": 99, "root": [null]}"##).unwrap_err();
    assert!(matches!(err, LoadError::VersionTooNew(99)));
    assert!(err.to_string().contains("newer than the current version"));
    assert!(err.to_string().ends_with("(99)"));

    let err = load_story(r##"{"inkVersion": 12, "root": [null]}"##).unwrap_err();
    assert!(matches!(err, LoadError::VersionTooOld(12)));
    assert!(err.to_string().ends_with("(12)"));

    let err = load_story(r##"{"inkVersion": "abc", "root": [null]}"##).unwrap_err();
    assert!(matches!(err, LoadError::VersionMalformed(_)));
}

#[test]
fn accepts_older_compatible_version() {
    let g = load(r##"{"inkVersion": 19, "root": ["^hi", null]}"##);
    assert_eq!(g.version, 19);
}

#[test]
fn rejects_missing_root_and_unknown_tokens() {
    let err = load_story(r##"{"inkVersion": 21}"##).unwrap_err();
    assert!(matches!(err, LoadError::MissingRoot));
    assert_eq!(err.to_string(), "Root node for ink not found");

    let err = load_story(r##"{"inkVersion": 21, "root": ["bogus", null]}"##).unwrap_err();
    assert!(matches!(err, LoadError::UnknownToken(_)));
}

#[test]
fn written_graph_loads_back_identically() {
    let g = load(SMALL);
    let again = load(&write_story_string(&g));
    assert_eq!(again.containers, g.containers);
    assert_eq!(again.list_definitions, g.list_definitions);
}

#[test]
fn relative_path_anchoring() {
    let here = Path::parse("knot.stitch");
    assert_eq!(Path::parse(".^.c-0").anchored_at(&here).to_string(), "knot.stitch.c-0");
    assert_eq!(Path::parse(".^.^.g-1").anchored_at(&here).to_string(), "knot.g-1");
    assert_eq!(Path::parse(".^").anchored_at(&here).to_string(), "knot.stitch");
    assert_eq!(Path::parse("other.0").anchored_at(&here).to_string(), "other.0");
}

fn component() -> impl Strategy<Value = Component> {
    prop_oneof![
        (0usize..50).prop_map(Component::Index),
        "[a-z][a-z0-9_-]{0,6}".prop_map(Component::Name),
        Just(Component::Parent),
    ]
}

proptest! {
    #[test]
    fn path_text_round_trips(comps in prop::collection::vec(component(), 0..6), relative in any::<bool>()) {
        let path = Path::new(comps, relative);
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text), path);
    }
}
