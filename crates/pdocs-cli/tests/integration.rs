#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn pdocs(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pdocs").unwrap();
    cmd.current_dir(dir.path()).env("PDOCS_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    pdocs(dir).arg("init").assert().success();
}

const PLAN: &str = "# Auth Plan

## Overview

Move sessions to signed tokens.

## Goals

- No server-side session table.

## Tasks

1. Issue tokens.
2. Verify tokens.

## Risks

Clock skew between nodes.
";

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(dir: &TempDir, rel: &str) -> String {
    fs::read_to_string(dir.path().join(rel)).unwrap()
}

fn json_out(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().unwrap();
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// pdocs init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_layout() {
    let dir = TempDir::new().unwrap();
    pdocs(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized pdocs"));

    assert!(dir.path().join(".pdocs/templates").is_dir());
    assert!(dir.path().join(".pdocs/config.yaml").exists());
    assert!(dir.path().join(".pdocs/registry.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    fs::write(dir.path().join(".pdocs/config.yaml"), "repair:\n  search_depth: 1\n").unwrap();

    pdocs(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already initialized"));
    assert_eq!(read(&dir, ".pdocs/config.yaml"), "repair:\n  search_depth: 1\n");
}

#[test]
fn init_json_lists_created_files() {
    let dir = TempDir::new().unwrap();
    let v = json_out(pdocs(&dir).args(["init", "--json"]));
    let created = v["created"].as_array().unwrap();
    assert!(created.iter().any(|c| c == ".pdocs/registry.yaml"));
}

// ---------------------------------------------------------------------------
// pdocs validate
// ---------------------------------------------------------------------------

#[test]
fn validate_passes_complete_plan() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS  docs/plans/auth.md (plan"));
}

#[test]
fn validate_reports_missing_section_and_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", &PLAN.replace("## Risks", "## Notes"));

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("required-section"))
        .stdout(predicate::str::contains("Risks"))
        .stderr(predicate::str::contains("1 of 1 document(s) failed validation"));
}

#[test]
fn validate_json_has_result_fields() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);

    let v = json_out(pdocs(&dir).args(["validate", "docs/plans/auth.md", "--json"]));
    let doc = &v["documents"][0];
    assert_eq!(doc["path"], "docs/plans/auth.md");
    assert_eq!(doc["type"], "plan");
    assert_eq!(doc["valid"], true);
    assert!(doc["errors"].as_array().unwrap().is_empty());
}

#[test]
fn validate_flags_broken_link_unless_disabled() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "docs/plans/auth.md",
        &PLAN.replace("Clock skew", "See [api](./api.md). Clock skew"),
    );

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("broken-link"));

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md", "--no-links"])
        .assert()
        .success();
}

#[test]
fn validate_fix_adds_section_and_strict_flags_placeholder() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let without_risks = PLAN.split("## Risks").next().unwrap().to_string();
    write(&dir, "docs/plans/auth.md", &without_risks);

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md", "--fix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied [required-section]"));

    let fixed = read(&dir, "docs/plans/auth.md");
    assert!(fixed.contains("## Risks"));
    assert!(fixed.contains("TODO(pdocs)"));

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("placeholder-content"));
}

#[test]
fn validate_dry_run_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let without_risks = PLAN.split("## Risks").next().unwrap().to_string();
    write(&dir, "docs/plans/auth.md", &without_risks);

    pdocs(&dir)
        .args(["validate", "docs/plans/auth.md", "--fix", "--dry-run"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("would apply [required-section]"));
    assert_eq!(read(&dir, "docs/plans/auth.md"), without_risks);
}

#[test]
fn validate_dry_run_requires_fix() {
    let dir = TempDir::new().unwrap();
    pdocs(&dir)
        .args(["validate", "--dry-run"])
        .assert()
        .failure();
}

#[test]
fn validate_unknown_type_asks_for_override() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "notes.md", PLAN);

    pdocs(&dir)
        .args(["validate", "notes.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --type"));

    pdocs(&dir)
        .args(["validate", "notes.md", "--type", "plan"])
        .assert()
        .success();
}

#[test]
fn validate_rejects_unknown_type_name() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "notes.md", PLAN);

    pdocs(&dir)
        .args(["validate", "notes.md", "--type", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown document type"));
}

#[test]
fn validate_missing_file_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .args(["validate", "docs/plans/nope.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn validate_without_documents_succeeds() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("No documents to validate"));
}

#[test]
fn validate_registered_batch_reports_each_document() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/good.md", PLAN);
    write(&dir, "docs/plans/bad.md", "# Bad\n");
    pdocs(&dir).args(["register", "docs/plans/good.md"]).assert().success();
    pdocs(&dir).args(["register", "docs/plans/bad.md"]).assert().success();

    pdocs(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("PASS  docs/plans/good.md"))
        .stdout(predicate::str::contains("FAIL  docs/plans/bad.md"))
        .stdout(predicate::str::contains("1/2 passed"));
}

#[test]
fn validate_directory_skips_unknown_files() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    write(&dir, "docs/notes.md", "# Notes\n");

    pdocs(&dir)
        .args(["validate", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS  docs/plans/auth.md"))
        .stdout(predicate::str::contains("Skipped 1 file(s)"));
}

// ---------------------------------------------------------------------------
// pdocs register / unregister / list
// ---------------------------------------------------------------------------

#[test]
fn register_then_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);

    pdocs(&dir)
        .args(["register", "docs/plans/auth.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("as plan (skill: writing-plans)"));

    pdocs(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/plans/auth.md"))
        .stdout(predicate::str::contains("pending"));
}

#[test]
fn register_twice_needs_force() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    pdocs(&dir).args(["register", "docs/plans/auth.md"]).assert().success();

    pdocs(&dir)
        .args(["register", "docs/plans/auth.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));

    pdocs(&dir)
        .args(["register", "docs/plans/auth.md", "--force", "--type", "spec"])
        .assert()
        .success()
        .stdout(predicate::str::contains("as feature-spec"));
}

#[test]
fn register_resolves_paths_from_cwd() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);

    let mut cmd = pdocs(&dir);
    cmd.current_dir(dir.path().join("docs"));
    cmd.args(["register", "plans/auth.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/plans/auth.md"));
}

#[test]
fn list_filters_by_status() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/good.md", PLAN);
    write(&dir, "docs/plans/bad.md", "# Bad\n");
    pdocs(&dir).args(["register", "docs/plans/good.md"]).assert().success();
    pdocs(&dir).args(["register", "docs/plans/bad.md"]).assert().success();
    pdocs(&dir).arg("validate").assert().failure();

    let v = json_out(pdocs(&dir).args(["list", "--status", "valid", "--json"]));
    let records = v.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["path"], "docs/plans/good.md");

    pdocs(&dir)
        .args(["list", "--status", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown status"));
}

#[test]
fn list_empty_registry() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No documents registered"));
}

#[test]
fn unregister_removes_record() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    pdocs(&dir).args(["register", "docs/plans/auth.md"]).assert().success();

    pdocs(&dir)
        .args(["unregister", "docs/plans/auth.md"])
        .assert()
        .success();
    pdocs(&dir)
        .args(["unregister", "docs/plans/auth.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not registered"));
}

// ---------------------------------------------------------------------------
// pdocs scan / prune
// ---------------------------------------------------------------------------

#[test]
fn scan_registers_known_documents() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    write(&dir, "README.md", "# Tool\n\n## Usage\n");
    write(&dir, "docs/notes.md", "# Notes\n");

    let v = json_out(pdocs(&dir).args(["scan", "--json"]));
    let registered: Vec<&str> = v["registered"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(registered.contains(&"docs/plans/auth.md"));
    assert!(registered.contains(&"README.md"));
    assert_eq!(v["unclassified"][0], "docs/notes.md");

    pdocs(&dir)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 0 new document(s); 2 already registered"));
}

#[test]
fn prune_drops_deleted_files() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    pdocs(&dir).arg("scan").assert().success();
    fs::remove_file(dir.path().join("docs/plans/auth.md")).unwrap();

    pdocs(&dir)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed docs/plans/auth.md"));
    pdocs(&dir)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to prune"));
}

// ---------------------------------------------------------------------------
// pdocs template / create
// ---------------------------------------------------------------------------

#[test]
fn template_without_source_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .args(["template", "plan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no template found"));
}

#[test]
fn template_substitutes_vars() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, ".pdocs/templates/plan.md", "# {{title}}\n\nOwner: {owner}\n");

    pdocs(&dir)
        .args(["template", "plan", "--var", "title=Auth", "--var", "owner=ana"])
        .assert()
        .success()
        .stdout("# Auth\n\nOwner: ana\n");
}

#[test]
fn template_warns_about_unresolved() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, ".pdocs/templates/plan.md", "# {{title}}\n");

    pdocs(&dir)
        .args(["template", "plan"])
        .assert()
        .success()
        .stdout("# {{title}}\n")
        .stderr(predicate::str::contains("unresolved placeholders: title"));
}

#[test]
fn template_rejects_malformed_var() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, ".pdocs/templates/plan.md", "# {{title}}\n");

    pdocs(&dir)
        .args(["template", "plan", "--var", "title"])
        .assert()
        .failure();
}

#[test]
fn template_output_never_overwrites() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, ".pdocs/templates/plan.md", "# {{title}}\n");

    pdocs(&dir)
        .args(["template", "plan", "--var", "title=A", "-o", "out.md"])
        .assert()
        .success();
    assert_eq!(read(&dir, "out.md"), "# A\n");

    pdocs(&dir)
        .args(["template", "plan", "--var", "title=B", "-o", "out.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
    assert_eq!(read(&dir, "out.md"), "# A\n");
}

#[test]
fn create_with_auto_id_uses_sequence() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    pdocs(&dir)
        .args(["create", "plan", "--title", "Auth Rework", "--auto-id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/plans/P-01-auth-rework.md"))
        .stdout(predicate::str::contains("id P-01"));
    pdocs(&dir)
        .args(["create", "plan", "--title", "Auth Rework", "--auto-id"])
        .assert()
        .success()
        .stdout(predicate::str::contains("P-02-auth-rework.md"));

    let created = read(&dir, "docs/plans/P-01-auth-rework.md");
    assert!(created.contains("# Auth Rework"));
    assert!(created.contains("## Risks"));

    pdocs(&dir)
        .args(["list", "--type", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("P-02-auth-rework.md"));
}

#[test]
fn create_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .args(["create", "plan", "--title", "Auth"])
        .assert()
        .success();
    pdocs(&dir)
        .args(["create", "plan", "--title", "Auth"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn create_uses_project_template() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, ".pdocs/templates/readme.md", "# {{title}}\n\n## Usage\n\n{{owner}}\n");

    let v = json_out(pdocs(&dir).args([
        "create", "readme", "--title", "Tool", "--var", "owner=ops", "--json",
    ]));
    assert_eq!(v["path"], "README.md");
    assert_eq!(v["template_source"], "project");
    assert_eq!(read(&dir, "README.md"), "# Tool\n\n## Usage\n\nops\n");
}

// ---------------------------------------------------------------------------
// pdocs id / types / info
// ---------------------------------------------------------------------------

#[test]
fn id_peek_does_not_consume() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    pdocs(&dir).args(["id", "plan", "--peek"]).assert().success().stdout("P-01\n");
    pdocs(&dir).args(["id", "plan", "--peek"]).assert().success().stdout("P-01\n");
    pdocs(&dir).args(["id", "plan"]).assert().success().stdout("P-01\n");
    pdocs(&dir).args(["id", "plan"]).assert().success().stdout("P-02\n");
    pdocs(&dir).args(["id", "inv"]).assert().success().stdout("INV-001\n");
}

#[test]
fn id_for_type_without_sequence_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pdocs(&dir)
        .args(["id", "readme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no id sequence"));
}

#[test]
fn types_lists_every_type() {
    let dir = TempDir::new().unwrap();
    pdocs(&dir)
        .arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("P-{num:2}"))
        .stdout(predicate::str::contains("changelog"));
}

#[test]
fn info_describes_document() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    pdocs(&dir).args(["register", "docs/plans/auth.md"]).assert().success();

    pdocs(&dir)
        .args(["info", "docs/plans/auth.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type:       plan"))
        .stdout(predicate::str::contains("Registered: yes"))
        .stdout(predicate::str::contains("Overview, Goals, Tasks, Risks"));
}

#[test]
fn info_without_path_shows_stats() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "docs/plans/auth.md", PLAN);
    pdocs(&dir).args(["register", "docs/plans/auth.md"]).assert().success();

    let v = json_out(pdocs(&dir).args(["info", "--json"]));
    assert_eq!(v["total"], 1);
    assert_eq!(v["pending"], 1);
    assert_eq!(v["by_type"]["plan"], 1);
}

#[test]
fn bad_config_is_reported() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    fs::write(dir.path().join(".pdocs/config.yaml"), "watch: nope\n").unwrap();

    pdocs(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
