//! End-to-end tests for the docforge binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn docforge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docforge").unwrap();
    cmd.current_dir(dir.path()).env("DOCFORGE_ROOT", dir.path());
    cmd
}

fn init(dir: &TempDir) {
    docforge(dir).arg("init").assert().success();
}

fn create_project(dir: &TempDir, name: &str) -> String {
    let output = docforge(dir)
        .args(["--json", "project", "create", name])
        .output()
        .unwrap();
    assert!(output.status.success());
    let project: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    project["id"].as_str().unwrap().to_string()
}

/// Point the collaborator services at `url` and flatten the retry delays
/// so transient faults cannot slow a test down.
fn point_services_at(dir: &TempDir, url: &str) {
    let config = format!(
        "services:\n  retrieval_url: {url}\n  generation_url: {url}\n\
         retry:\n  max_retries: 1\n  base_delay_ms: 1\n  max_delay_ms: 2\n"
    );
    std::fs::write(dir.path().join(".docforge/config.yaml"), config).unwrap();
}

#[test]
fn init_creates_config_and_store() {
    let dir = TempDir::new().unwrap();
    docforge(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .docforge/config.yaml"))
        .stdout(predicate::str::contains("created: .docforge/store.redb"));

    assert!(dir.path().join(".docforge/config.yaml").exists());
    assert!(dir.path().join(".docforge/store.redb").exists());
    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".docforge/store.redb"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    docforge(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .docforge/config.yaml"))
        .stdout(predicate::str::contains("exists:  .docforge/store.redb"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    docforge(&dir)
        .args(["project", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn project_create_list_show() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    let output = docforge(&dir)
        .args(["--json", "project", "create", "Billing Platform"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let project: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(project["name"], "Billing Platform");
    assert_eq!(project["status"], "draft");
    assert_eq!(project["current_step"], 1);
    let id = project["id"].as_str().unwrap();

    docforge(&dir)
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Billing Platform"));

    docforge(&dir)
        .args(["project", "show", id])
        .assert()
        .success()
        .stdout(predicate::str::contains(id))
        .stdout(predicate::str::contains("status:  draft"))
        .stdout(predicate::str::contains("step:    1 of 4"));
}

#[test]
fn unknown_project_id_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    docforge(&dir)
        .args(["project", "show", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found"));
}

#[test]
fn progress_shows_the_pipeline() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Docs Project");

    docforge(&dir)
        .args(["progress", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("business_analysis"))
        .stdout(predicate::str::contains("available"))
        .stdout(predicate::str::contains("locked"));
}

#[test]
fn stage_start_rejects_malformed_input() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Input Check");

    docforge(&dir)
        .args(["stage", "start", &id, "1", "--input", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input must be valid JSON"));
}

#[test]
fn stage_start_enforces_order_and_range() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Order Check");

    docforge(&dir)
        .args(["stage", "start", &id, "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot start stage 3"));

    docforge(&dir)
        .args(["stage", "start", &id, "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid stage number: 9"));
}

#[test]
fn stage_cancel_reports_nothing_active() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Cancel Check");

    docforge(&dir)
        .args(["stage", "cancel", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing active to cancel"));
}

#[test]
fn stage_run_completes_end_to_end() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    let mut server = mockito::Server::new();
    let _search = server
        .mock("POST", "/v1/search")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"results": [{"source": "kb://handbook/1", "content": "notes", "score": 0.8}]}"#,
        )
        .create();
    let _generate = server
        .mock("POST", "/v1/generate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"content": "# Business Analysis\n\nScope and actors.", "confidence_score": 0.92}"#,
        )
        .create();
    point_services_at(&dir, &server.url());

    let id = create_project(&dir, "Billing Platform");

    docforge(&dir)
        .args(["stage", "start", &id, "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("step_start"))
        .stdout(predicate::str::contains("step_complete"))
        .stdout(predicate::str::contains("completed after 1 attempt(s)"));

    docforge(&dir)
        .args(["docs", "show", &id, "business_analysis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scope and actors."));

    docforge(&dir)
        .args(["docs", "list", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("business_analysis"))
        .stdout(predicate::str::contains("v1"));

    docforge(&dir)
        .args(["progress", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"))
        .stdout(predicate::str::contains("v1"));

    docforge(&dir)
        .args(["ledger", "list", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn failed_generation_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    let mut server = mockito::Server::new();
    let _search = server
        .mock("POST", "/v1/search")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"results": []}"#)
        .create();
    let _generate = server
        .mock("POST", "/v1/generate")
        .with_status(400)
        .with_body("brief rejected by content policy")
        .create();
    point_services_at(&dir, &server.url());

    let id = create_project(&dir, "Rejected Brief");

    docforge(&dir)
        .args(["stage", "start", &id, "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage 1 failed"));

    docforge(&dir)
        .args(["ledger", "list", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn docs_show_missing_document_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Docs Check");

    docforge(&dir)
        .args(["docs", "show", &id, "business_analysis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));
}

#[test]
fn docs_show_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let id = create_project(&dir, "Kind Check");

    docforge(&dir)
        .args(["docs", "show", &id, "poetry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid document type"));
}

#[test]
fn ledger_prune_reports_zero_on_fresh_store() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    docforge(&dir)
        .args(["ledger", "prune"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pruned 0 execution(s)"));
}
