//! End-to-end tests of the `sprite` binary for commands that need no
//! network access.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[store]
owner = "me"
repo = "vault"

[capture]
mode = "queue"

[queue]
path = "{}/data/queue.sqlite"
ttl_secs = 3600
"#,
        root.display()
    );

    let config_path = config_dir.join("sprite.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sprite(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_sprite"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .env_remove("AI_API_KEY")
        .output()
        .expect("failed to run sprite binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_queue_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sprite(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Queue initialized"));
    assert!(tmp.path().join("data/queue.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_sprite(&config_path, &["init"]);
    assert!(first, "first init failed");
    let (_, _, second) = run_sprite(&config_path, &["init"]);
    assert!(second, "second init failed (not idempotent)");
}

#[test]
fn test_enqueue_then_list() {
    let (_tmp, config_path) = setup_test_env();
    run_sprite(&config_path, &["init"]);

    let (stdout, stderr, success) = run_sprite(&config_path, &["queue"]);
    assert!(success, "queue failed: {}", stderr);
    assert!(stdout.contains("Queue is empty."));

    let (key, stderr, success) = run_sprite(
        &config_path,
        &["enqueue", "read later", "--url", "https://example.com/post"],
    );
    assert!(success, "enqueue failed: {}", stderr);
    assert!(key.trim().starts_with("inbox:"));

    let (stdout, _, success) = run_sprite(&config_path, &["queue"]);
    assert!(success);
    assert!(stdout.contains(key.trim()));
    assert!(stdout.contains("[url] read later"));
}

#[test]
fn test_drain_requires_model_key() {
    let (_tmp, config_path) = setup_test_env();
    run_sprite(&config_path, &["init"]);

    let (_, stderr, success) = run_sprite(&config_path, &["drain", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("AI_API_KEY"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_sprite(&tmp.path().join("nope.toml"), &["queue"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("sprite.toml");
    fs::write(
        &config_path,
        "[store]\nowner = \"\"\nrepo = \"vault\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_sprite(&config_path, &["queue"]);
    assert!(!success);
    assert!(stderr.contains("store.owner and store.repo must not be empty"));
}
