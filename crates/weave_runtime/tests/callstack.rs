use weave_runtime::{Story, StoryError};

const ROUTES: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "^Start", "\n",
      {"->t->": "detour"},
      "^Back", "\n",
      "ev", {"f()": "seven"}, "out", "/ev", "\n",
      "done",
      null
    ],
    "done",
    {
      "detour": [
        "^In tunnel", "\n",
        "ev", "void", "/ev", "->->",
        null
      ],
      "seven": [
        "ev", 7, "/ev", "~ret",
        null
      ],
      "redirect": [
        "^Detour", "\n",
        "ev", {"^->": "elsewhere"}, "/ev", "->->",
        null
      ],
      "elsewhere": ["^Elsewhere", "\n", "done", null]
    }
  ],
  "listDefs": {}
}"##;

const STRAY_RETURN: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["ev", "void", "/ev", "->->", "done", null],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const WRONG_RETURN: &str = r##"{
  "inkVersion": 21,
  "root": [
    [{"->t->": "seven"}, "done", null],
    "done",
    {"seven": ["ev", 7, "/ev", "~ret", null]}
  ],
  "listDefs": {}
}"##;

#[test]
fn tunnels_and_functions_return_to_the_caller() {
    let mut story = Story::new(ROUTES).unwrap();
    assert_eq!(
        story.continue_maximally().unwrap(),
        "Start\nIn tunnel\nBack\n7\n"
    );
    assert_eq!(story.visit_count_at_path("detour").unwrap(), 1);
}

#[test]
fn tunnel_return_can_name_a_new_target() {
    let mut story = Story::new(ROUTES).unwrap();
    story.continue_maximally().unwrap();
    story.choose_path_string("redirect", true, &[]).unwrap();
    assert_eq!(story.continue_maximally().unwrap(), "Detour\nElsewhere\n");
}

#[test]
fn returning_from_the_root_frame_is_a_control_flow_error() {
    let mut story = Story::new(STRAY_RETURN).unwrap();
    let err = story.continue_().unwrap_err();
    assert!(
        matches!(err, StoryError::ControlFlow(ref m) if m.contains("Mismatched push/pop")),
        "{err:?}"
    );
}

#[test]
fn function_return_inside_a_tunnel_is_refused() {
    let mut story = Story::new(WRONG_RETURN).unwrap();
    let err = story.continue_().unwrap_err();
    assert!(
        matches!(err, StoryError::ControlFlow(ref m) if m.contains("when expected function return")),
        "{err:?}"
    );
}
