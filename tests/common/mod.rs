// tests/common/mod.rs — Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Resolve the compiled binary from the workspace target directory
pub fn lockscan_bin() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("current_exe")
        .parent()
        .expect("parent")
        .to_path_buf();

    if path.ends_with("deps") {
        path.pop();
    }
    path.join("lockscan")
}

/// Execute the lockscan binary with given arguments. The global config
/// directory is pointed at an empty location so a developer's own config
/// cannot leak into the tests.
pub fn run_lockscan(args: &[&str]) -> std::process::Output {
    run_lockscan_in(&std::env::current_dir().expect("current_dir"), args)
}

/// Same as `run_lockscan`, with `dir` as the working directory.
pub fn run_lockscan_in(dir: &Path, args: &[&str]) -> std::process::Output {
    let isolated = TempDir::new().expect("TempDir::new");
    std::process::Command::new(lockscan_bin())
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", isolated.path())
        .env("HOME", isolated.path())
        .output()
        .expect("Failed to execute lockscan binary")
}

/// Create a temporary directory with a set of named files and content.
pub fn make_fixture(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("TempDir::new");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
    dir
}

/// Two processes: 0x1010200 is deadlocked (T 0x101 ⇄ T 0x102) and has one
/// primitive whose query failed; 0x1010300 has a plain wait chain.
pub const TARGET_DUMP: &str = r#"{
  "processes": [
    {
      "pid": "0x1010200",
      "name": "game.self",
      "primitives": [
        { "id": "0x40", "name": "render_mutex", "owner": "0x101", "waiters": ["0x102"] },
        { "id": "0x41", "name": "audio_mutex",  "owner": "0x102", "waiters": ["0x101"] },
        { "id": "0x42", "error": "target busy" }
      ]
    },
    {
      "pid": "0x1010300",
      "name": "tool.self",
      "primitives": [
        { "id": 1, "name": "queue_mutex", "owner": 7, "waiters": [8, 9] },
        { "id": 2, "name": "idle_mutex" }
      ]
    }
  ]
}"#;

/// Fixture directory holding `target.json` with `TARGET_DUMP`.
pub fn target_fixture() -> TempDir {
    make_fixture(&[("target.json", TARGET_DUMP)])
}
