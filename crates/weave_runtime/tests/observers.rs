use std::cell::RefCell;
use std::rc::Rc;

use weave_runtime::{Story, StoryConfig, StoryError, Value};

const COUNTER: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "ev", 1, {"VAR=": "x", "re": true}, "/ev",
      "ev", 1, {"VAR=": "x", "re": true}, "/ev",
      "ev", 2, {"VAR=": "x", "re": true}, "/ev",
      "^done", "\n",
      "done",
      null
    ],
    "done",
    {
      "global decl": ["ev", 0, {"VAR=": "x"}, "/ev", "end", null]
    }
  ],
  "listDefs": {}
}"##;

type Log = Rc<RefCell<Vec<String>>>;

fn render(v: Option<&Value>) -> String {
    v.map_or("none".to_string(), |v| v.to_string())
}

fn watch(story: &mut Story, label: &'static str, log: &Log) -> weave_runtime::ObserverHandle {
    let log = log.clone();
    story.observe_variable("x", move |_, name, old, new| {
        log.borrow_mut()
            .push(format!("{label}:{name}:{}->{new}", render(old)));
    })
}

#[test]
fn observers_fire_per_change_in_registration_order() {
    let mut story = Story::new(COUNTER).unwrap();
    let log: Log = Rc::default();
    watch(&mut story, "first", &log);
    watch(&mut story, "second", &log);

    assert_eq!(story.continue_().unwrap(), "done\n");
    assert_eq!(
        *log.borrow(),
        vec![
            "first:x:0->1",
            "second:x:0->1",
            "first:x:1->2",
            "second:x:1->2",
        ]
    );
    assert_eq!(story.variable("x"), Some(Value::Int(2)));
}

#[test]
fn removed_observers_stay_silent() {
    let mut story = Story::new(COUNTER).unwrap();
    let log: Log = Rc::default();
    watch(&mut story, "kept", &log);
    let gone = watch(&mut story, "gone", &log);
    assert_eq!(gone.variable(), "x");
    assert!(story.remove_observer(&gone));

    story.continue_().unwrap();
    assert_eq!(*log.borrow(), vec!["kept:x:0->1", "kept:x:1->2"]);
}

#[test]
fn host_assignment_notifies_and_rejects_undeclared_names() {
    let mut story = Story::new(COUNTER).unwrap();
    let log: Log = Rc::default();
    watch(&mut story, "host", &log);

    story.set_variable("x", 5).unwrap();
    story.set_variable("x", 5).unwrap();
    assert_eq!(*log.borrow(), vec!["host:x:0->5"]);

    let err = story.set_variable("missing", 1).unwrap_err();
    assert!(matches!(err, StoryError::Evaluation(_)), "{err:?}");
    assert!(err.is_recoverable());
}

#[test]
fn batched_observers_see_one_net_change() {
    let config = StoryConfig {
        batch_observers: true,
        ..StoryConfig::default()
    };
    let mut story = Story::with_config(COUNTER, config).unwrap();
    let log: Log = Rc::default();
    watch(&mut story, "batch", &log);

    story.continue_().unwrap();
    assert_eq!(*log.borrow(), vec!["batch:x:0->2"]);
}

#[test]
fn continuing_from_an_observer_is_refused() {
    let mut story = Story::new(COUNTER).unwrap();
    let seen: Rc<RefCell<Vec<StoryError>>> = Rc::default();
    let sink = seen.clone();
    story.observe_variable("x", move |s, _, _, _| {
        if let Err(e) = s.continue_() {
            sink.borrow_mut().push(e);
        }
    });

    assert_eq!(story.continue_().unwrap(), "done\n");
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|e| matches!(e, StoryError::Reentrancy(_))));
}

#[test]
fn changes_past_a_newline_are_reported_once() {
    let json = r##"{
      "inkVersion": 21,
      "root": [
        [
          "^Line", "\n",
          "ev", 7, {"VAR=": "x", "re": true}, "/ev",
          "^Next", "\n",
          "done",
          null
        ],
        "done",
        {"global decl": ["ev", 0, {"VAR=": "x"}, "/ev", "end", null]}
      ],
      "listDefs": {}
    }"##;
    let mut story = Story::new(json).unwrap();
    let log: Log = Rc::default();
    watch(&mut story, "w", &log);

    assert_eq!(story.continue_().unwrap(), "Line\n");
    assert!(log.borrow().is_empty());
    assert_eq!(story.variable("x"), Some(Value::Int(0)));

    assert_eq!(story.continue_().unwrap(), "Next\n");
    assert_eq!(*log.borrow(), vec!["w:x:0->7"]);
}

#[test]
fn assignment_inside_an_observer_is_delivered_after_the_current_one() {
    let mut story = Story::new(COUNTER).unwrap();
    let log: Log = Rc::default();
    let sink = log.clone();
    story.observe_variable("x", move |s, name, old, new| {
        sink.borrow_mut()
            .push(format!("{name}:{}->{new}", render(old)));
        if *new == Value::Int(1) {
            s.set_variable("x", 7).unwrap();
        }
    });

    story.set_variable("x", 1).unwrap();
    assert_eq!(*log.borrow(), vec!["x:0->1", "x:1->7"]);
    assert_eq!(story.variable("x"), Some(Value::Int(7)));
}

#[test]
fn removing_a_handle_twice_reports_false() {
    let mut story = Story::new(COUNTER).unwrap();
    let log: Log = Rc::default();
    let handle = watch(&mut story, "once", &log);
    assert!(story.remove_observer(&handle));
    assert!(!story.remove_observer(&handle));

    story.continue_().unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn one_observer_can_watch_several_variables() {
    let json = r##"{
      "inkVersion": 21,
      "root": [
        [
          "ev", 3, {"VAR=": "hp", "re": true}, "/ev",
          "ev", 4, {"VAR=": "gold", "re": true}, "/ev",
          "^ok", "\n",
          "done",
          null
        ],
        "done",
        {"global decl": ["ev", 0, {"VAR=": "hp"}, 0, {"VAR=": "gold"}, "/ev", "end", null]}
      ],
      "listDefs": {}
    }"##;
    let mut story = Story::new(json).unwrap();
    let log: Log = Rc::default();
    let sink = log.clone();
    let handles = story.observe_variables(&["hp", "gold"], move |_, name, _, new| {
        sink.borrow_mut().push(format!("{name}={new}"));
    });
    assert_eq!(handles.len(), 2);
    assert_eq!(handles[1].variable(), "gold");

    assert_eq!(story.continue_().unwrap(), "ok\n");
    assert_eq!(*log.borrow(), vec!["hp=3", "gold=4"]);
}
