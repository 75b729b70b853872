use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragflow_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragflow");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        data_dir.join("beta.txt"),
        "Beta plain text file.\n\nContains notes about deployment and infrastructure.",
    )
    .unwrap();
    fs::write(data_dir.join("long.txt"), "x".repeat(1000)).unwrap();
    fs::write(data_dir.join("slides.pptx"), "binary-ish").unwrap();

    let config_content = format!(
        r#"[data]
dir = "{root}/data"

[index]
backend = "local"
path = "{root}/index"

[embedding]
provider = "hash"
dims = 128

[generation]
provider = "disabled"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ragflow.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragflow(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragflow_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragflow binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_ingest_indexes_supported_files() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragflow(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 3"), "got: {}", stdout);
    assert!(stdout.contains("chunks: 4"), "got: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_idempotent_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();

    run_ragflow(&config_path, &["ingest"]);
    let (status1, _, _) = run_ragflow(&config_path, &["status"]);
    run_ragflow(&config_path, &["ingest"]);
    let (status2, _, _) = run_ragflow(&config_path, &["status"]);

    assert!(status1.contains("entries: 4"), "got: {}", status1);
    assert_eq!(status1, status2);
}

#[test]
fn test_ingest_dry_run_does_not_write_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragflow(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry-run failed: {}", stderr);
    assert!(stdout.contains("documents: 3"));
    assert!(stdout.contains("chunks: 4"));

    let (status, _, _) = run_ragflow(&config_path, &["status"]);
    assert!(status.contains("entries: 0"), "got: {}", status);
}

#[test]
fn test_status_reports_collection() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ragflow(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("collection: enterprise_docs"));
}

#[test]
fn test_chunk_prints_windows() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("data/long.txt");

    let (stdout, stderr, success) =
        run_ragflow(&config_path, &["chunk", file.to_str().unwrap()]);
    assert!(success, "chunk failed: {}", stderr);
    assert!(stdout.contains("(2 chunks)"));
    assert!(stdout.contains("[0, 800)  800 chars"));
    assert!(stdout.contains("[700, 1000)  300 chars"));
}

#[test]
fn test_chunk_rejects_unsupported_file() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("data/slides.pptx");

    let (_, stderr, success) = run_ragflow(&config_path, &["chunk", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Unsupported file type"));
}

#[test]
fn test_query_requires_generator() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragflow(&config_path, &["query", "what is alpha?"]);
    assert!(!success, "query should fail without a generator");
    assert!(stderr.contains("generator"), "got: {}", stderr);
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_ragflow(&missing, &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[embedding]\nprovider = \"magic\"\n").unwrap();

    let (_, stderr, success) = run_ragflow(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}
