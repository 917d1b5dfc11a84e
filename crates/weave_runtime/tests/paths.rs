use weave_runtime::{Story, StoryError, Value};

const ATLAS: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "#", "^title: Atlas", "/#",
      "^Start", "\n",
      "done",
      null
    ],
    "done",
    {
      "forest": [
        "#", "^mood: dark", "/#",
        "^Trees.", "\n",
        "done",
        {
          "clearing": ["^A clearing.", "\n", "done", {"#f": 1}],
          "#f": 1
        }
      ],
      "visit": [
        {"temp=": "who"},
        "^Hi ", "ev", {"VAR?": "who"}, "out", "/ev", "\n",
        "done",
        {"#f": 1}
      ]
    }
  ],
  "listDefs": {}
}"##;

fn atlas() -> Story {
    Story::new(ATLAS).unwrap()
}

#[test]
fn global_tags_come_from_the_top_of_the_story() {
    let story = atlas();
    assert_eq!(story.global_tags().unwrap(), vec!["title: Atlas"]);
}

#[test]
fn knot_tags_are_read_without_running() {
    let story = atlas();
    assert_eq!(
        story.tags_for_content_at_path("forest").unwrap(),
        vec!["mood: dark"]
    );
    assert!(story.tags_for_content_at_path("forest.clearing").unwrap().is_empty());
    assert!(matches!(
        story.tags_for_content_at_path("nowhere"),
        Err(StoryError::Resolution(_))
    ));
}

#[test]
fn jumping_to_a_knot_runs_it_and_counts_the_visit() {
    let mut story = atlas();
    assert_eq!(story.continue_().unwrap(), "Start\n");
    assert_eq!(story.visit_count_at_path("forest").unwrap(), 0);

    story.choose_path_string("forest", true, &[]).unwrap();
    assert_eq!(story.continue_().unwrap(), "Trees.\n");
    assert_eq!(story.current_tags(), vec!["mood: dark"]);
    assert_eq!(story.visit_count_at_path("forest").unwrap(), 1);
}

#[test]
fn current_path_can_be_jumped_back_to() {
    let mut story = atlas();
    story.choose_path_string("forest.clearing", true, &[]).unwrap();
    let here = story.current_path().unwrap();
    assert_eq!(here, "forest.clearing.0");
    assert_eq!(story.continue_().unwrap(), "A clearing.\n");
    assert_eq!(story.current_path(), None);

    story.choose_path_string(&here, true, &[]).unwrap();
    assert_eq!(story.continue_().unwrap(), "A clearing.\n");
    assert_eq!(story.visit_count_at_path("forest.clearing").unwrap(), 2);
}

#[test]
fn jump_arguments_reach_the_target() {
    let mut story = atlas();
    story
        .choose_path_string("visit", true, &[Value::from("Ann")])
        .unwrap();
    assert_eq!(story.continue_().unwrap(), "Hi Ann\n");
}

#[test]
fn unknown_paths_are_resolution_errors() {
    let mut story = atlas();
    assert!(matches!(
        story.choose_path_string("forest.cave", true, &[]),
        Err(StoryError::Resolution(_))
    ));
    assert!(matches!(
        story.visit_count_at_path("forest.cave"),
        Err(StoryError::Resolution(_))
    ));
    // The failed jump left the story where it was.
    assert_eq!(story.continue_().unwrap(), "Start\n");
}
