use std::cell::RefCell;
use std::rc::Rc;

use weave_runtime::{RngAlgorithm, Story};

const DIE: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["ev", 1, 6, "rnd", "out", "/ev", "\n", "done", null],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const TWO_ROLLS: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["ev", 1, 6, "rnd", "pop", 1, 6, "rnd", "out", "/ev", "\n", "done", null],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const ROLLS: &str = r##"{
  "inkVersion": 21,
  "root": [
    [
      "ev", 1, 100, "rnd", "out", "/ev", "\n",
      "ev", 1, 100, "rnd", "out", "/ev", "\n",
      "ev", 1, 100, "rnd", "out", "/ev", "\n",
      "done",
      null
    ],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const RESEEDED: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["ev", 5, "srnd", "pop", 1, 1000, "rnd", "out", "/ev", "\n", "done", null],
    "done",
    null
  ],
  "listDefs": {}
}"##;

const SHUFFLE: &str = r##"{
  "inkVersion": 21,
  "root": [
    ["ev", 0, 3, "seq", "out", "/ev", "\n", "done", null],
    "done",
    null
  ],
  "listDefs": {}
}"##;

struct Fixed(u64);

impl RngAlgorithm for Fixed {
    fn next_u64(&self, _state: &mut u64) -> u64 {
        self.0
    }
}

/// Returns a constant and remembers the state it was seeded with.
struct Recorder {
    seen: Rc<RefCell<Vec<u64>>>,
}

impl RngAlgorithm for Recorder {
    fn next_u64(&self, state: &mut u64) -> u64 {
        self.seen.borrow_mut().push(*state);
        3
    }
}

fn seeded(json: &str, seed: i64) -> Story {
    let mut story = Story::new(json).unwrap();
    story.set_rng_seed(seed);
    story
}

#[test]
fn random_uses_the_host_algorithm() {
    let mut story = Story::new(DIE).unwrap();
    story.set_rng_algorithm(Fixed(41));
    assert_eq!(story.continue_().unwrap(), "6\n");
}

#[test]
fn draws_are_seeded_from_story_seed_and_previous_draw() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut story = seeded(TWO_ROLLS, 7);
    story.set_rng_algorithm(Recorder { seen: seen.clone() });

    assert_eq!(story.continue_().unwrap(), "4\n");
    assert_eq!(*seen.borrow(), vec![7, 10]);
}

#[test]
fn same_seed_gives_same_rolls() {
    let mut a = seeded(ROLLS, 42);
    let mut b = seeded(ROLLS, 42);
    let first = a.continue_maximally().unwrap();
    assert_eq!(first, b.continue_maximally().unwrap());
    assert_eq!(first.lines().count(), 3);
    for roll in first.lines() {
        let n: i64 = roll.parse().unwrap();
        assert!((1..=100).contains(&n), "{n}");
    }

    a.reset_state().unwrap();
    assert_eq!(a.continue_maximally().unwrap(), first);
}

#[test]
fn seed_random_overrides_the_host_seed() {
    let mut a = seeded(RESEEDED, 1);
    let mut b = seeded(RESEEDED, 99);
    assert_eq!(a.continue_().unwrap(), b.continue_().unwrap());
}

#[test]
fn shuffle_tolerates_seeds_near_the_integer_limit() {
    for seed in [i64::MAX - 5, i64::MIN] {
        let mut story = seeded(SHUFFLE, seed);
        let line = story.continue_().unwrap();
        assert!(["0\n", "1\n", "2\n"].contains(&line.as_str()), "{line:?}");
    }
}
