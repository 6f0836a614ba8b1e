// tests/deadlock.rs — Testing end-to-end detection over captured dumps

mod common;
use common::{make_fixture, run_lockscan, target_fixture};

#[test]
fn test_deadlocked_process_exits_three() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&["--no-color", "deadlock", "-s", snap.to_str().unwrap(), "-p", "0x1010200"]);
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[DEADLOCK]"), "stdout:\n{}", stdout);
    assert!(
        stdout.contains("waits on lock 0x40 (render_mutex) held by thread 0x101"),
        "stdout:\n{}",
        stdout
    );
}

#[test]
fn test_wait_chain_is_not_a_deadlock() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&["--no-color", "deadlock", "-s", snap.to_str().unwrap(), "-p", "0x1010300"]);
    assert!(out.status.success(), "status: {:?}", out.status);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("No deadlock detected"));
}

#[test]
fn test_multiple_pids_are_each_reported() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&[
        "--no-color",
        "deadlock",
        "-p",
        "0x1010300",
        "0x1010200",
        "-s",
        snap.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Process 0x1010300 [tool.self]"));
    assert!(stdout.contains("Process 0x1010200 [game.self]"));
}

#[test]
fn test_detailed_lists_skipped_primitives() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&[
        "--no-color",
        "deadlock",
        "-s",
        snap.to_str().unwrap(),
        "-p",
        "0x1010200",
        "--detailed",
    ]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("1 primitive(s) skipped"));
    assert!(stdout.contains("target busy"), "--detailed should imply --show-skipped:\n{}", stdout);
    assert!(stdout.contains("Waiter"));
}

#[test]
fn test_capacity_overflow_aborts_run() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&[
        "--no-color",
        "deadlock",
        "-s",
        snap.to_str().unwrap(),
        "-p",
        "0x1010300",
        "-c",
        "1",
    ]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("more than 1 waiter records"), "stderr:\n{}", stderr);
}

#[test]
fn test_unknown_pid_aborts_its_run() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&["deadlock", "-s", snap.to_str().unwrap(), "-p", "42"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("0x2a"), "stderr:\n{}", stderr);
    // Cause is printed once, not repeated by the outer message
    assert_eq!(stderr.matches("is not known to the source").count(), 1, "stderr:\n{}", stderr);
}

#[test]
fn test_unknown_pid_keeps_other_reports() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&[
        "--no-color",
        "deadlock",
        "-s",
        snap.to_str().unwrap(),
        "-p",
        "0x1010200",
        "42",
    ]);
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[DEADLOCK]"), "stdout:\n{}", stdout);
    assert!(stdout.contains("Process 0x1010200 [game.self]"), "stdout:\n{}", stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("process 0x2a"), "stderr:\n{}", stderr);
}

#[test]
fn test_malformed_dump_is_runtime_error() {
    let fixture = make_fixture(&[("bad.json", "{ \"processes\": [ { \"pid\": \"nope\" } ] }")]);
    let snap = fixture.path().join("bad.json");
    let out = run_lockscan(&["deadlock", "-s", snap.to_str().unwrap(), "-p", "1"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_json_output_on_stdout() {
    let fixture = target_fixture();
    let snap = fixture.path().join("target.json");
    let out = run_lockscan(&[
        "deadlock",
        "-s",
        snap.to_str().unwrap(),
        "-p",
        "0x1010200",
        "--json",
        "--compact",
    ]);
    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim().lines().count(), 1, "compact JSON is one line");
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    assert_eq!(parsed["metadata"]["deadlocks"], 1);
    let report = &parsed["reports"][0];
    assert_eq!(report["pid"], 0x1010200);
    assert_eq!(report["skipped"][0]["id"], 0x42);
    let mut threads: Vec<u64> = report["deadlocked_threads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_u64().unwrap())
        .collect();
    threads.sort_unstable();
    assert_eq!(threads, vec![0x101, 0x102]);
}
