//! Drives the `ksync` binary against a temp config (SQLite store, hashing
//! embedder).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ksync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ksync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("kb");
    fs::create_dir_all(&root).unwrap();

    fs::write(
        root.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        root.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        root.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();

    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[knowledge]
root = "{}"

[chunking]
max_chars = 120
overlap_chars = 20

[retrieval]
top_k = 3

[store]
backend = "sqlite"
path = "{}/data/vectors.sqlite"

[embedding]
provider = "hashing"
"#,
        root.display(),
        tmp.path().display()
    );
    let config_path = config_dir.join("ksync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, root)
}

fn run_ksync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ksync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ksync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_idempotent() {
    let (tmp, config_path, _root) = setup_test_env();

    let (stdout, stderr, success) = run_ksync(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Initialized"));
    assert!(tmp.path().join("data/vectors.sqlite").exists());

    let (_, _, again) = run_ksync(&config_path, &["init"]);
    assert!(again, "Second init failed (not idempotent)");
}

#[test]
fn test_init_writes_missing_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config/ksync.toml");
    let root = tmp.path().join("kb");

    let (stdout, stderr, success) = run_ksync(
        &config_path,
        &["init", "--root", root.to_str().unwrap()],
    );
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(config_path.exists());
    assert!(root.join("notes").is_dir());
    assert!(root.join(".vectors.sqlite").exists());
}

#[test]
fn test_index_then_reindex_is_unchanged() {
    let (_tmp, config_path, _root) = setup_test_env();

    let (stdout, stderr, success) = run_ksync(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned 3"), "got: {}", stdout);
    assert!(stdout.contains("indexed 3"), "got: {}", stdout);

    let (stdout, _, success) = run_ksync(&config_path, &["index", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("indexed 0"), "got: {}", stdout);
    assert!(stdout.contains("unchanged 3"), "got: {}", stdout);
    assert!(stdout.contains("(+0 / -0 chunks)"), "got: {}", stdout);
}

#[test]
fn test_index_single_file_edit() {
    let (_tmp, config_path, root) = setup_test_env();
    run_ksync(&config_path, &["index", "--progress", "off"]);

    let alpha = root.join("alpha.md");
    fs::write(
        &alpha,
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt now also covers clippy lints.",
    )
    .unwrap();
    let (stdout, stderr, success) = run_ksync(&config_path, &["index", alpha.to_str().unwrap()]);
    assert!(success, "index failed: stderr={}", stderr);
    assert!(stdout.contains("indexed"), "got: {}", stdout);
    assert!(!stdout.contains("+0 upserted"), "got: {}", stdout);

    let (stdout, _, _) = run_ksync(&config_path, &["index", alpha.to_str().unwrap()]);
    assert!(stdout.contains("unchanged"), "got: {}", stdout);
}

#[test]
fn test_query_json_and_deterministic() {
    let (_tmp, config_path, _root) = setup_test_env();
    run_ksync(&config_path, &["index", "--progress", "off"]);

    let (stdout1, stderr, success) =
        run_ksync(&config_path, &["query", "Rust programming cargo", "--json"]);
    assert!(success, "query failed: {}", stderr);
    let blocks: serde_json::Value = serde_json::from_str(&stdout1).unwrap();
    let blocks = blocks.as_array().unwrap();
    assert!(!blocks.is_empty() && blocks.len() <= 3);
    assert_eq!(blocks[0]["title"], "alpha");
    assert_eq!(blocks[0]["kind"], "file");

    let (stdout2, _, _) = run_ksync(&config_path, &["query", "Rust programming cargo", "--json"]);
    assert_eq!(stdout1, stdout2, "Query results should be deterministic across runs");
}

#[test]
fn test_query_empty_store() {
    let (_tmp, config_path, _root) = setup_test_env();
    run_ksync(&config_path, &["init"]);

    let (stdout, _, success) = run_ksync(&config_path, &["query", "anything"]);
    assert!(success, "Empty store query should not fail");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_note_list_and_delete() {
    let (_tmp, config_path, root) = setup_test_env();
    run_ksync(&config_path, &["index", "--progress", "off"]);

    let (stdout, stderr, success) = run_ksync(
        &config_path,
        &["note", "--title", "Release Plan", "--text", "Ship the beta on Monday."],
    );
    assert!(success, "note failed: {}", stderr);
    assert!(stdout.contains("release-plan.md"));

    let (stdout, _, success) = run_ksync(&config_path, &["list", "--json"]);
    assert!(success);
    let docs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let docs = docs.as_array().unwrap();
    assert_eq!(docs.len(), 4);
    assert_eq!(docs[3]["title"], "Release Plan");
    assert_eq!(docs[3]["kind"], "note");

    let (stdout, _, success) = run_ksync(&config_path, &["delete", "--title", "beta"]);
    assert!(success);
    assert!(stdout.starts_with("Deleted"), "got: {}", stdout);
    assert!(root.join("beta.md").exists(), "title-only delete must keep the file");
}

#[test]
fn test_note_requires_body() {
    let (_tmp, config_path, _root) = setup_test_env();
    let (_, _, success) = run_ksync(&config_path, &["note", "--title", "Empty"]);
    assert!(!success);
}

#[test]
fn test_diagnose_and_debug() {
    let (_tmp, config_path, root) = setup_test_env();

    let (stdout, _, success) = run_ksync(&config_path, &["diagnose", "--json"]);
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "warn");
    assert_eq!(report["total_files"], 3);

    run_ksync(&config_path, &["index", "--progress", "off"]);
    let (stdout, _, _) = run_ksync(&config_path, &["diagnose", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "ok");

    fs::remove_file(root.join("gamma.txt")).unwrap();
    let (stdout, _, _) = run_ksync(&config_path, &["diagnose", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "degraded");
    assert_eq!(report["issues"][0]["status"], "manifest_path_missing");

    let gamma = root.join("gamma.txt");
    let (stdout, _, success) =
        run_ksync(&config_path, &["debug", gamma.to_str().unwrap(), "--json"]);
    assert!(success);
    let debug: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(debug["status"], "orphaned_vectors_or_manifest");
    assert_eq!(debug["exists_on_disk"], false);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ksync(&tmp.path().join("nope.toml"), &["list"]);
    assert!(!success);
    assert!(stderr.contains("nope.toml"), "got: {}", stderr);
}

#[test]
fn test_completions() {
    let (_tmp, config_path, _root) = setup_test_env();
    let (stdout, _, success) = run_ksync(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("ksync"));
}
