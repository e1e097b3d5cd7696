use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn hx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let notes_dir = root.join("notes");
    fs::create_dir_all(notes_dir.join("ops")).unwrap();
    fs::write(
        notes_dir.join("alpha.md"),
        "# Alpha\n\nNotes about Rust programming.\n\n## Tooling\n\nUse cargo to build crates.\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join("ops").join("deploy.md"),
        "# Deploy\n\n## Steps\n\n01. build the image\n02. push the image\n03. roll the cluster\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join("gamma.txt"),
        "Gamma plain text.\nKubernetes and Docker are mentioned here.\n",
    )
    .unwrap();
    fs::write(notes_dir.join("ignored.json"), "{\"rust\": true}").unwrap();

    let config_content = r#"[db]
path = "data/kb.sqlite"

[log]
to_console = false
to_file = false

[retrieval]
top_k = 5
"#;

    let config_path = root.join("hx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_hx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn notes_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .join("notes")
        .to_string_lossy()
        .to_string()
}

fn init_and_ingest(config_path: &Path) {
    let (_, stderr, success) = run_hx(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let (stdout, stderr, success) = run_hx(
        config_path,
        &["ingest", &notes_dir(config_path), "--progress", "off"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_hx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("kb.sqlite").exists());

    let (_, _, success) = run_hx(&config_path, &["init"]);
    assert!(success, "Second init failed (not idempotent)");
}

#[test]
fn test_init_config_writes_defaults_once() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("conf").join("hx.toml");

    let (stdout, _, success) = run_hx(&config_path, &["init-config"]);
    assert!(success);
    assert!(stdout.contains("config written"));
    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("policy_version"));

    let (stdout, _, success) = run_hx(&config_path, &["init-config"]);
    assert!(success);
    assert!(stdout.contains("config ready"));
}

#[test]
fn test_commands_fail_before_init() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_hx(&config_path, &["search", "rust"]);
    assert!(!success, "search without a database should fail");
    assert!(
        stderr.contains("hx init"),
        "Should point at hx init, got: {}",
        stderr
    );
}

#[test]
fn test_ingest_reports_counts() {
    let (_tmp, config_path) = setup_test_env();

    run_hx(&config_path, &["init"]);
    let notes = notes_dir(&config_path);
    let (stdout, stderr, success) = run_hx(&config_path, &["ingest", &notes, "--progress", "off"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 3"));
    assert!(stdout.contains("rebuilt files: 3"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.contains("ok"));

    // Nothing changed: everything is skipped
    let (stdout, _, _) = run_hx(&config_path, &["ingest", &notes, "--progress", "off"]);
    assert!(stdout.contains("skipped: 3"), "got: {}", stdout);
    assert!(stdout.contains("rebuilt files: 0"));

    let (stdout, _, _) = run_hx(
        &config_path,
        &["ingest", &notes, "--force", "--progress", "off"],
    );
    assert!(stdout.contains("rebuilt files: 3"), "got: {}", stdout);
}

#[test]
fn test_ingest_json_report() {
    let (_tmp, config_path) = setup_test_env();

    run_hx(&config_path, &["init"]);
    let notes = notes_dir(&config_path);
    let (stdout, _, success) = run_hx(
        &config_path,
        &["ingest", &notes, "--progress", "off", "--json"],
    );
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["scanned"], 3);
    assert_eq!(report["rebuilt_files"], 3);
    assert!(report["run_id"].as_i64().unwrap() >= 1);
    assert!(report["failed"].as_array().unwrap().is_empty());
}

#[test]
fn test_ingest_missing_root_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_hx(&config_path, &["init"]);
    let (_, stderr, success) = run_hx(&config_path, &["ingest", "/definitely/not/here"]);
    assert!(!success);
    assert!(stderr.contains("path not found"), "got: {}", stderr);

    // No run was recorded for the failed invocation
    let (stdout, _, _) = run_hx(&config_path, &["runs"]);
    assert!(stdout.contains("No runs."));
}

#[test]
fn test_search_keyword() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_hx(&config_path, &["search", "cargo"]);
    assert!(success, "search failed");
    assert!(
        stdout.contains("notes/alpha.md"),
        "Expected alpha.md in results, got: {}",
        stdout
    );
    assert!(stdout.contains("Alpha > Tooling"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout1, _, _) = run_hx(&config_path, &["search", "image"]);
    let (stdout2, _, _) = run_hx(&config_path, &["search", "image"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_empty_and_no_results() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_hx(&config_path, &["search", ""]);
    assert!(success, "Empty query should not fail");
    assert!(stdout.contains("No results"));

    let (stdout, _, success) = run_hx(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_json() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_hx(&config_path, &["search", "kubernetes", "--json"]);
    assert!(success);
    let hits: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["path"], "notes/gamma.txt");
    assert_eq!(hits[0]["start_line"], 1);
}

#[test]
fn test_ask_steps_with_citations() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, stderr, success) =
        run_hx(&config_path, &["ask", "image", "--mode", "steps", "--json"]);
    assert!(success, "ask failed: {}", stderr);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let answer = response["answer"].as_str().unwrap();
    assert!(answer.contains("01. build the image"));
    assert!(answer.contains("02. push the image"));
    let citations = response["citations"].as_array().unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0]["path"], "notes/ops/deploy.md");
    assert_eq!(citations[0]["heading_path"], "Deploy > Steps");
}

#[test]
fn test_ask_unknown_mode_errors() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (_, stderr, success) = run_hx(&config_path, &["ask", "rust", "--mode", "essay"]);
    assert!(!success, "Unknown mode should fail");
    assert!(
        stderr.contains("unknown answer mode"),
        "Should mention unknown mode, got: {}",
        stderr
    );
}

#[test]
fn test_ask_no_match() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_hx(&config_path, &["ask", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_show_chunk() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (search_out, _, _) = run_hx(&config_path, &["search", "kubernetes", "--json"]);
    let hits: Vec<serde_json::Value> = serde_json::from_str(&search_out).unwrap();
    let id = hits[0]["chunk_id"].as_i64().unwrap().to_string();

    let (stdout, _, success) = run_hx(&config_path, &["show", &id]);
    assert!(success, "show should succeed");
    assert!(stdout.contains("notes/gamma.txt"));
    assert!(stdout.contains("Docker"));

    let (stdout, _, success) = run_hx(&config_path, &["show", "999999"]);
    assert!(success);
    assert!(stdout.contains("Not found."));
}

#[test]
fn test_stats_and_runs() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, _, success) = run_hx(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["stats"]["file_count"], 3);
    assert_eq!(
        stats["stats"]["chunk_count"],
        stats["stats"]["index_entry_count"]
    );
    assert_eq!(stats["stats"]["open_run_count"], 0);
    assert!(stats["last_run"]["finished_at"].is_i64());

    let (stdout, _, success) = run_hx(&config_path, &["runs"]);
    assert!(success);
    assert!(stdout.contains("md_v1"));
    assert!(!stdout.contains("NOT CLOSED"));
}

#[test]
fn test_doctor() {
    let (_tmp, config_path) = setup_test_env();
    init_and_ingest(&config_path);

    let (stdout, stderr, success) = run_hx(&config_path, &["doctor"]);
    assert!(success, "doctor failed: {}", stderr);
    assert!(stdout.contains("kb.sqlite"));
    assert!(stdout.contains("files:           3"));
}
