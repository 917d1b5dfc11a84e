#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use weave_runtime::Story;

/// Routes engine logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_test_writer()
        .without_time()
        .try_init();
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(format!("{name}.json"))
}

pub fn fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("read fixture")
}

pub fn load_fixture(name: &str) -> Story {
    init_tracing();
    Story::new(&fixture(name)).expect("load fixture")
}

pub fn golden_path_for(subdir: &str, name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join(subdir)
        .join(format!("{name}.txt"))
}

pub fn golden_update_enabled() -> bool {
    std::env::var("WEAVE_UPDATE_GOLDEN").is_ok_and(|v| v == "1" || v == "true")
}

pub fn assert_or_update(path: PathBuf, actual: &str) {
    if golden_update_enabled() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, actual).unwrap();
        return;
    }
    let expected = fs::read_to_string(&path).unwrap_or_default();
    assert_eq!(
        actual.trim_end(),
        expected.trim_end(),
        "Golden mismatch for {:?}",
        path
    );
}

/// Plays `story`, taking choices in `picks` order (zero-based), and renders
/// a transcript of the text, the choices offered and the picks made.
pub fn transcript(story: &mut Story, picks: &[usize]) -> String {
    let mut out = String::new();
    let mut picks = picks.iter();
    loop {
        out.push_str(&story.continue_maximally().expect("continue"));
        let choices = story.current_choices();
        if choices.is_empty() {
            break;
        }
        for c in &choices {
            out.push_str(&format!("{}: {}\n", c.index + 1, c.text));
        }
        let Some(&pick) = picks.next() else {
            break;
        };
        out.push_str(&format!("> {}\n", pick + 1));
        story.choose_choice(pick).expect("choose");
    }
    out
}
