//! Repo command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const MODULES: &str = r#"[
  { "name": "httpserver", "type": "git", "path": "https://example.org/httpserver.git" },
  { "name": "java", "type": "git", "path": "https://example.org/java.git" }
]"#;

fn mirror() -> TestEnv {
  let env = TestEnv::new();
  env.write_file("repository/modules.json", MODULES);
  env
}

#[test]
fn repo_list_prints_names() {
  let env = mirror();

  env
    .modkit_cmd()
    .args(["repo", "list", "--path"])
    .arg(env.temp.path().join("repository"))
    .assert()
    .success()
    .stdout(predicate::str::contains("httpserver\njava\n"));
}

#[test]
fn repo_list_json_output_is_valid() {
  let env = mirror();

  let output = env
    .modkit_cmd()
    .args(["repo", "list", "-o", "json", "--path"])
    .arg(env.temp.path().join("repository"))
    .output()
    .unwrap();
  assert!(output.status.success());

  let entries: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[1]["path"], "https://example.org/java.git");
}

#[test]
fn repo_search_prints_matching_entry() {
  let env = mirror();

  env
    .modkit_cmd()
    .args(["repo", "search", "http", "--path"])
    .arg(env.temp.path().join("repository"))
    .assert()
    .success()
    .stdout(predicate::str::contains("\"name\": \"httpserver\""));
}

#[test]
fn repo_search_without_match_reports_it() {
  let env = mirror();

  env
    .modkit_cmd()
    .args(["repo", "search", "python", "--path"])
    .arg(env.temp.path().join("repository"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No module exists: python"));
}

#[test]
fn repo_path_from_environment() {
  let env = mirror();

  env
    .modkit_cmd()
    .args(["repo", "list"])
    .env("MODKIT_INDEX_PATH", env.temp.path().join("repository"))
    .assert()
    .success()
    .stdout(predicate::str::contains("java"));
}
