use std::cell::RefCell;
use std::rc::Rc;

use weave_runtime::{Severity, Story, StoryConfig, StoryError, Value};

const GREETER: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "ev", "str", "^Bob", "/str", {"x()": "greet", "exArgs": 1}, "out", "/ev", "\n",
      "done",
      null
    ],
    "done",
    {
      "greet": [
        {"temp=": "name"},
        "ev", "str", "^Hi ", "/str", {"VAR?": "name"}, "+", "/ev",
        "~ret",
        null
      ]
    }
  ],
  "listDefs": {}
}"##;

const TICKER: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "^Line one", "\n",
      "ev", {"x()": "tick"}, "pop", "/ev",
      "^Line two", "\n",
      "done",
      null
    ],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const THREADED: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "thread", {"->": "0.t"},
      "^After", "\n",
      "done",
      {
        "t": [
          "ev", {"x()": "boom"}, "pop", "/ev",
          "^In thread", "\n",
          "done",
          null
        ]
      }
    ],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const MATH: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "^Line", "\n",
      "ev", {"x()": "peek"}, "pop", "/ev",
      "^More", "\n",
      "done",
      null
    ],
    "done",
    {
      "add": [
        {"temp=": "b"}, {"temp=": "a"},
        "ev", {"VAR?": "a"}, {"VAR?": "b"}, "+", "/ev",
        "~ret",
        null
      ],
      "bump": [
        "ev", {"VAR?": "x"}, 1, "+", {"VAR=": "x", "re": true}, "/ev",
        "^bumped", "\n",
        "ev", {"VAR?": "x"}, "/ev",
        "~ret",
        null
      ],
      "global decl": ["ev", 0, {"VAR=": "x"}, "/ev", "end", null]
    }
  ],
  "listDefs": {}
}"##;

fn counter() -> (Rc<RefCell<u32>>, impl FnMut(&mut Story, &[Value]) -> Result<Value, String>) {
    let calls = Rc::new(RefCell::new(0u32));
    let seen = calls.clone();
    let fun = move |_: &mut Story, _: &[Value]| {
        *seen.borrow_mut() += 1;
        Ok(Value::Int(0))
    };
    (calls, fun)
}

#[test]
fn bound_external_receives_arguments() {
    let mut story = Story::new(GREETER).unwrap();
    story
        .bind_external_function(
            "greet",
            |_, args| Ok(Value::from(format!("Hello, {}", args[0]))),
            true,
        )
        .unwrap();
    assert_eq!(story.continue_().unwrap(), "Hello, Bob\n");
}

#[test]
fn binding_twice_is_refused() {
    let mut story = Story::new(GREETER).unwrap();
    story.bind_external_function("greet", |_, _| Ok(Value::Void), true).unwrap();
    let err = story
        .bind_external_function("greet", |_, _| Ok(Value::Void), true)
        .unwrap_err();
    assert!(matches!(err, StoryError::ExternalFunction { .. }));
    assert!(story.unbind_external_function("greet"));
    assert!(!story.unbind_external_function("greet"));
}

#[test]
fn unbound_external_falls_back_to_ink_function() {
    let mut story = Story::new(GREETER).unwrap();
    assert!(story.has_function("greet"));
    assert!(story.validate_external_bindings().is_ok());
    assert_eq!(story.continue_().unwrap(), "Hi Bob\n");
}

#[test]
fn missing_binding_is_reported_on_first_continue() {
    let config = StoryConfig {
        allow_external_function_fallbacks: false,
        ..StoryConfig::default()
    };
    let mut story = Story::with_config(GREETER, config).unwrap();
    let err = story.validate_external_bindings().unwrap_err();
    assert!(err.to_string().contains("greet"));

    let err = story.continue_().unwrap_err();
    assert!(matches!(err, StoryError::ExternalFunction { .. }));
}

#[test]
fn failing_external_surfaces_its_message() {
    let mut story = Story::new(GREETER).unwrap();
    story
        .bind_external_function("greet", |_, _| Err("no greeting today".into()), true)
        .unwrap();
    let err = story.continue_().unwrap_err();
    assert_eq!(
        err,
        StoryError::ExternalFunction {
            name: "greet".into(),
            message: "no greeting today".into(),
        }
    );
    assert!(err.is_recoverable());
    assert!(!story.has_error());
}

#[test]
fn lookahead_unsafe_external_runs_exactly_once() {
    let mut story = Story::new(TICKER).unwrap();
    let (calls, fun) = counter();
    story.bind_external_function("tick", fun, false).unwrap();

    assert_eq!(story.continue_().unwrap(), "Line one\n");
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(story.continue_().unwrap(), "Line two\n");
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn lookahead_safe_external_may_run_speculatively() {
    let mut story = Story::new(TICKER).unwrap();
    let (calls, fun) = counter();
    story.bind_external_function("tick", fun, true).unwrap();

    assert_eq!(story.continue_maximally().unwrap(), "Line one\nLine two\n");
    assert_eq!(*calls.borrow(), 2);
}

#[test]
fn unsafe_external_in_forked_thread_abandons_the_thread() {
    let mut story = Story::new(THREADED).unwrap();
    let (calls, fun) = counter();
    story.bind_external_function("boom", fun, false).unwrap();
    let warnings: Rc<RefCell<Vec<(String, Severity)>>> = Rc::default();
    let sink = warnings.clone();
    story.on_warning(move |msg, sev| sink.borrow_mut().push((msg.to_string(), sev)));

    assert_eq!(story.continue_().unwrap(), "After\n");
    assert_eq!(*calls.borrow(), 0);
    assert!(story.has_warning());
    assert!(story.current_warnings()[0].contains("abandoned"));
    let seen = warnings.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, Severity::Warning);
}

#[test]
fn evaluation_function_returns_value_and_text() {
    let mut story = Story::new(MATH).unwrap();
    let (value, text) = story
        .evaluation_function("add", &[Value::Int(2), Value::Int(3)], true)
        .unwrap();
    assert_eq!(value, Value::Int(5));
    assert_eq!(text, "");
}

#[test]
fn lookahead_safe_evaluation_leaves_no_trace() {
    let mut story = Story::new(MATH).unwrap();
    let fired = Rc::new(RefCell::new(0));
    let seen = fired.clone();
    story.observe_variable("x", move |_, _, _, _| *seen.borrow_mut() += 1);

    let (value, text) = story.evaluation_function("bump", &[], true).unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(text, "bumped\n");
    assert_eq!(story.variable("x"), Some(Value::Int(0)));
    assert_eq!(*fired.borrow(), 0);
}

#[test]
fn unsafe_evaluation_keeps_its_side_effects() {
    let mut story = Story::new(MATH).unwrap();
    let fired = Rc::new(RefCell::new(0));
    let seen = fired.clone();
    story.observe_variable("x", move |_, _, _, _| *seen.borrow_mut() += 1);

    let (value, _) = story.evaluation_function("bump", &[], false).unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(story.variable("x"), Some(Value::Int(1)));
    assert_eq!(*fired.borrow(), 1);
}

#[test]
fn evaluating_a_missing_function_is_a_resolution_error() {
    let mut story = Story::new(MATH).unwrap();
    assert!(!story.has_function("nope"));
    let err = story.evaluation_function("nope", &[], true).unwrap_err();
    assert!(matches!(err, StoryError::Resolution(_)));
}

#[test]
fn unsafe_evaluation_is_refused_while_previewing() {
    let mut story = Story::new(MATH).unwrap();
    let results: Rc<RefCell<Vec<Result<Value, StoryError>>>> = Rc::default();
    let log = results.clone();
    story
        .bind_external_function(
            "peek",
            move |s, _| {
                log.borrow_mut()
                    .push(s.evaluation_function("bump", &[], false).map(|(v, _)| v));
                Ok(Value::Int(0))
            },
            true,
        )
        .unwrap();

    assert_eq!(story.continue_().unwrap(), "Line\n");
    {
        let results = results.borrow();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(StoryError::Evaluation(_))));
    }
    assert_eq!(story.variable("x"), Some(Value::Int(0)));

    assert_eq!(story.continue_().unwrap(), "More\n");
    assert!(matches!(results.borrow()[1], Err(StoryError::Reentrancy(_))));
    assert_eq!(story.variable("x"), Some(Value::Int(0)));
}

#[test]
fn safe_evaluation_is_allowed_from_callbacks() {
    let mut story = Story::new(MATH).unwrap();
    let results: Rc<RefCell<Vec<Value>>> = Rc::default();
    let log = results.clone();
    story
        .bind_external_function(
            "peek",
            move |s, _| {
                let (v, _) = s
                    .evaluation_function("add", &[Value::Int(2), Value::Int(3)], true)
                    .map_err(|e| e.to_string())?;
                log.borrow_mut().push(v);
                Ok(Value::Int(0))
            },
            true,
        )
        .unwrap();

    assert_eq!(story.continue_maximally().unwrap(), "Line\nMore\n");
    assert_eq!(*results.borrow(), vec![Value::Int(5), Value::Int(5)]);
}
