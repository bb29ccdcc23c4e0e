//! Assemble command integration tests.

use predicates::prelude::*;
use serde_json::json;

use super::common::{TestEnv, properties};

#[test]
fn assemble_zero_modules_copies_skeleton() {
  let env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Wrote"));

  assert_eq!(env.read_output("usr").as_deref(), Some("SKEL\n"));
}

#[test]
fn assemble_appends_fragments_in_config_order() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("b-src", properties("beta", 1, &[]), &[("usr", "BETA\n")]);
  env.dir_module("a-src", properties("alpha", 1, &[]), &[("usr", "ALPHA\n")]);

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .success()
    .stdout(predicate::str::contains("(2 modules)"))
    .stdout(predicate::str::contains("beta"));

  assert_eq!(env.read_output("usr").as_deref(), Some("SKEL\nBETA\nALPHA\n"));
  assert!(env.work_dir().join("beta").join("properties.json").is_file());
  assert!(env.work_dir().join("alpha").join("properties.json").is_file());
}

#[test]
fn assemble_json_output_lists_modules() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("alpha", properties("alpha", 1, &[]), &[("usr", "FRAG\n")]);

  let output = env
    .modkit_cmd()
    .args(["assemble", "usr", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["build_type"], "usr");
  assert_eq!(result["modules"], json!(["alpha"]));
  assert_eq!(result["fetched"], 1);
  assert_eq!(result["built"], 0);
}

#[test]
fn second_run_reuses_cached_modules() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  let src = env.dir_module("alpha", properties("alpha", 1, &[]), &[("usr", "FRAG\n")]);

  env.modkit_cmd().args(["assemble", "usr"]).assert().success();

  // Sources are gone; only the cache can satisfy the second run.
  std::fs::remove_dir_all(&src).unwrap();

  let output = env
    .modkit_cmd()
    .args(["assemble", "usr", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["fetched"], 0);
  assert_eq!(env.read_output("usr").as_deref(), Some("SKEL\nFRAG\n"));
}

#[test]
#[cfg(unix)]
fn missing_fragment_is_built() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("alpha", properties("alpha", 1, &[]), &[]);

  env
    .modkit_cmd()
    .args(["assemble", "usr", "--build-command", "printf 'BUILT\\n' > usr.manifest"])
    .assert()
    .success();

  assert_eq!(env.read_output("usr").as_deref(), Some("SKEL\nBUILT\n"));
}

#[test]
fn explicit_layout_flags_are_honored() {
  let mut env = TestEnv::new();
  env.write_file("elsewhere/fs.manifest.skel", "FS\n");
  env.write_file("elsewhere/config.json", r#"{ "modules": [] }"#);
  env.dir_module("alpha", properties("alpha", 1, &[]), &[]);

  let elsewhere = env.temp.path().join("elsewhere");
  env
    .modkit_cmd()
    .args(["assemble", "fs"])
    .arg("--config")
    .arg(elsewhere.join("config.json"))
    .arg("--skeleton-dir")
    .arg(&elsewhere)
    .arg("--output-dir")
    .arg(&elsewhere)
    .assert()
    .success();

  assert_eq!(std::fs::read_to_string(elsewhere.join("fs.manifest")).unwrap(), "FS\n");
  assert!(env.read_output("fs").is_none());
}

#[test]
fn missing_skeleton_exits_with_code_3() {
  let env = TestEnv::new();

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .code(3)
    .stderr(predicate::str::contains("usr.manifest.skel"));
}

#[test]
fn unsupported_type_exits_with_code_4() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.descriptor(json!({ "path": "/src/thing", "type": "hg" }));

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .code(4)
    .stderr(predicate::str::contains("hg"));

  assert!(env.read_output("usr").is_none());
}

#[test]
fn source_without_properties_exits_with_code_5() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.write_file("sources/empty/README", "nothing here\n");
  let src = env.temp.path().join("sources").join("empty");
  env.descriptor(json!({ "path": src.to_string_lossy(), "type": "dir" }));

  env.modkit_cmd().args(["assemble", "usr"]).assert().code(5);
}

#[test]
fn unsupported_properties_version_exits_with_code_6() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("alpha", properties("alpha", 2, &[]), &[]);

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .code(6)
    .stderr(predicate::str::contains("alpha"));

  assert!(env.read_output("usr").is_none());
}

#[test]
fn negative_properties_version_exits_with_code_6() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("alpha", properties("alpha", -1, &[]), &[]);

  env.modkit_cmd().args(["assemble", "usr"]).assert().code(6);

  assert!(env.read_output("usr").is_none());
}

#[test]
fn missing_dependency_exits_with_code_7() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.dir_module("alpha", properties("alpha", 1, &["java_home"]), &[]);

  env
    .modkit_cmd()
    .args(["assemble", "usr"])
    .assert()
    .code(7)
    .stderr(predicate::str::contains("java_home"));
}

#[test]
fn missing_dir_source_exits_with_code_8() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.descriptor(json!({ "path": "/nonexistent/module", "type": "dir" }));

  env.modkit_cmd().args(["assemble", "usr"]).assert().code(8);
}

#[test]
#[cfg(unix)]
fn failing_build_exits_with_code_9_and_removes_old_output() {
  let mut env = TestEnv::new();
  env.skeleton("usr", "SKEL\n");
  env.write_file("build/usr.manifest", "STALE\n");
  env.dir_module("alpha", properties("alpha", 1, &[]), &[]);

  env
    .modkit_cmd()
    .args(["assemble", "usr", "--build-command", "exit 3"])
    .assert()
    .code(9);

  assert!(env.read_output("usr").is_none());
}

#[test]
fn invalid_build_type_exits_with_code_2() {
  let env = TestEnv::new();

  env.modkit_cmd().args(["assemble", "../usr"]).assert().code(2);
}
