//! Integration tests that run the built `pathwise` binary.

use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("pathwise_cli_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    std::fs::write(&path, value.to_string()).expect("write fixture");
    path.to_string_lossy().into_owned()
}

fn pathwise(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pathwise"))
        .args(args)
        .env("PATHWISE_PRETTY", "false")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn pathwise");

    let mut pipe = child.stdin.take().expect("stdin pipe");
    if let Some(input) = stdin {
        // the child may exit before reading, e.g. on a usage error
        let _ = pipe.write_all(input.as_bytes());
    }
    drop(pipe);

    child.wait_with_output().expect("wait for pathwise")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "expected success (stderr={})",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn help_lists_commands() {
    let output = pathwise(&["--help"], None);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE:"));
    for command in ["get", "set", "unset", "apply", "merge", "collect", "filter", "sort"] {
        assert!(stdout.contains(command), "help must mention {command}");
    }
}

#[test]
fn version_includes_pkg_version() {
    let output = pathwise(&["--version"], None);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn get_from_file_and_missing_exit_code() {
    let dir = temp_dir("get");
    let doc = write_json(&dir, "doc.json", &json!({"user": {"tags": ["a", "b"]}}));

    let found = pathwise(&["get", &doc, "user.tags.1"], None);
    assert_eq!(stdout_json(&found), json!("b"));

    let missing = pathwise(&["get", &doc, "user.name"], None);
    assert_eq!(missing.status.code(), Some(1));
    assert!(missing.stdout.is_empty());
}

#[test]
fn apply_updates_file_to_stdin_document() {
    let dir = temp_dir("apply");
    let updates = write_json(
        &dir,
        "updates.json",
        &json!({"$set": [{"profile.name": "Ada"}], "$unset": [{"legacy": ""}]}),
    );

    let output = pathwise(&["apply", "-", &updates], Some(r#"{"legacy": 1, "id": 7}"#));
    assert_eq!(
        stdout_json(&output),
        json!({"id": 7, "profile": {"name": "Ada"}})
    );
}

#[test]
fn collect_reduces_batches() {
    let dir = temp_dir("collect");
    let first = write_json(&dir, "first.json", &json!({"$set": [{"a.b": 1}, {"c": 2}]}));
    let second = write_json(&dir, "second.json", &json!({"$set": [{"a": {}}], "$unset": [{"c": ""}]}));

    let output = pathwise(&["collect", &first, &second], None);
    assert_eq!(
        stdout_json(&output),
        json!({"$set": [{"a": {}}], "$unset": [{"c": ""}]})
    );
}

#[test]
fn merge_concatenates() {
    let dir = temp_dir("merge");
    let a = write_json(&dir, "a.json", &json!({"$set": [{"x": 1}]}));
    let b = write_json(&dir, "b.json", &json!({"$set": [{"x": 2}]}));

    let output = pathwise(&["merge", &a, &b], None);
    assert_eq!(stdout_json(&output), json!({"$set": [{"x": 1}, {"x": 2}]}));
}

#[test]
fn filter_then_sort_through_pipes() {
    let entities = json!([
        {"title": "b", "due": "2024-03-02", "done": false},
        {"title": "a", "due": "2024-03-01", "done": true},
        {"title": "c", "due": "2024-02-28", "done": false}
    ])
    .to_string();

    let filtered = pathwise(&["filter", "-", "boolean:done=false"], Some(&entities));
    let filtered = stdout_json(&filtered).to_string();

    let sorted = pathwise(&["sort", "-", "date:due:asc"], Some(&filtered));
    let titles: Vec<String> = stdout_json(&sorted)
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["c", "b"]);
}

#[test]
fn errors_exit_with_status_two() {
    let bad_path = pathwise(&["get", "-", "a..b"], Some("{}"));
    assert_eq!(bad_path.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&bad_path.stderr).contains("invalid object path: 'a..b'"));

    let unknown = pathwise(&["frobnicate"], None);
    assert_eq!(unknown.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("USAGE:"));

    let bad_json = pathwise(&["get", "-", "a"], Some("{not json"));
    assert_eq!(bad_json.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&bad_json.stderr).contains("Invalid JSON in <stdin>"));
}

#[test]
fn invalid_pretty_setting_is_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_pathwise"))
        .args(["--version"])
        .env("PATHWISE_PRETTY", "sometimes")
        .output()
        .expect("run pathwise");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PATHWISE_PRETTY"));
}
