mod common;

use std::cell::RefCell;
use std::rc::Rc;

use weave_runtime::{Severity, Story, StoryConfig, StoryError};

const SPIN: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      {"->": "0.spin"},
      {"spin": [{"->": "0.spin"}, null]}
    ],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const DIVIDE: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "^Start", "\n",
      "ev", 1, 0, "/", "out", "/ev", "\n",
      "done",
      null
    ],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const OLD: &str = r##"{
  "inkVersion": 20,
  "root": [["^Hello", "\n", "done", null], "done", null],
  "listDefs": {}
}"##;

type Messages = Rc<RefCell<Vec<(String, Severity)>>>;

fn collect_errors(story: &mut Story) -> Messages {
    let log: Messages = Rc::default();
    let sink = log.clone();
    story.on_error(move |msg, sev| sink.borrow_mut().push((msg.to_string(), sev)));
    log
}

#[test]
fn runaway_loop_stops_the_story_until_errors_are_reset() {
    let config = StoryConfig {
        max_steps_per_continue: 50,
        ..StoryConfig::default()
    };
    let mut story = Story::with_config(SPIN, config).unwrap();
    let log = collect_errors(&mut story);

    let err = story.continue_().unwrap_err();
    assert_eq!(err, StoryError::RunawayLoop(50));
    assert!(!err.is_recoverable());
    assert!(story.has_error());
    assert!(!story.can_continue());
    assert_eq!(story.current_errors().len(), 1);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].1, Severity::Error);

    let blocked = story.continue_().unwrap_err();
    assert!(matches!(blocked, StoryError::ControlFlow(_)));

    story.reset_errors();
    assert!(!story.has_error());
    assert!(story.can_continue());
}

#[test]
fn division_by_zero_is_recoverable_and_rolls_back() {
    let mut story = Story::new(DIVIDE).unwrap();
    let log = collect_errors(&mut story);

    // The failing expression sits past the newline, so the first line is
    // delivered and the error waits for the next call.
    assert_eq!(story.continue_().unwrap(), "Start\n");
    assert!(log.borrow().is_empty());

    let before = story.to_json().unwrap();
    let err = story.continue_().unwrap_err();
    assert!(matches!(err, StoryError::Evaluation(ref m) if m.contains("Division by zero")));
    assert!(err.is_recoverable());
    assert!(!story.has_error());
    assert!(story.can_continue());
    assert_eq!(story.to_json().unwrap(), before);
    assert!(log.borrow()[0].0.contains("Division by zero"));

    // Retrying hits the same expression again.
    assert_eq!(story.continue_().unwrap_err(), err);
}

#[test]
fn continuing_a_finished_story_is_refused() {
    let mut story = Story::new(OLD).unwrap();
    story.continue_maximally().unwrap();
    assert!(!story.can_continue());
    let err = story.continue_().unwrap_err();
    assert!(matches!(err, StoryError::ControlFlow(_)));
}

#[test]
fn older_bytecode_loads_with_a_warning() {
    let mut story = Story::new(OLD).unwrap();
    assert!(story.has_warning());
    assert!(story.current_warnings()[0].contains("(20)"));

    let seen: Messages = Rc::default();
    let sink = seen.clone();
    story.on_warning(move |msg, sev| sink.borrow_mut().push((msg.to_string(), sev)));
    assert_eq!(story.continue_().unwrap(), "Hello\n");
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].1, Severity::Warning);

    // Already delivered warnings are not repeated.
    story.reset_state().unwrap();
    story.continue_().unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn unsupported_bytecode_versions_fail_to_load() {
    let too_old = OLD.replace("\"inkVersion\": 20", "\"inkVersion\": 17");
    assert!(matches!(Story::new(&too_old), Err(StoryError::Version(_))));
    let too_new = OLD.replace("\"inkVersion\": 20", "\"inkVersion\": 22");
    assert!(matches!(Story::new(&too_new), Err(StoryError::Version(_))));
    assert!(matches!(Story::new("[1, 2]"), Err(StoryError::Load(_))));
}

#[test]
fn choice_index_out_of_range_is_recoverable() {
    let mut story = common::load_fixture("fogg");
    story.continue_maximally().unwrap();
    let err = story.choose_choice(5).unwrap_err();
    assert_eq!(
        err,
        StoryError::ChoiceOutOfRange {
            index: 5,
            available: 2
        }
    );
    assert!(err.is_recoverable());
    story.choose_choice(1).unwrap();
    assert!(story.can_continue());
}
