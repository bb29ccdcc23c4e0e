//! Trace command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const PREFIX: &str = "[0.123456] thread 0xffff8000 cpu0 sample: ";

fn sample_log(stacks: &[&str]) -> String {
  stacks
    .iter()
    .map(|stack| format!("{}{}\n", PREFIX, stack))
    .collect()
}

#[test]
fn trace_reports_most_common_stack_first() {
  let env = TestEnv::new();
  let common = "#0 0x0000000000401000 #1 0x0000000000402000";
  let rare = "#0 0x0000000000500000";
  env.write_file("gdb.txt", &sample_log(&[rare, common, common]));

  env
    .modkit_cmd()
    .arg("trace")
    .arg(env.temp.path().join("gdb.txt"))
    .assert()
    .success()
    .stdout(predicate::str::starts_with(
      "2 Times\n0x0000000000401000\n0x0000000000402000\n-----\n1 Times\n",
    ));
}

#[test]
fn trace_top_limits_report() {
  let env = TestEnv::new();
  env.write_file("gdb.txt", &sample_log(&["a", "b", "c"]));

  let output = env
    .modkit_cmd()
    .args(["trace", "--top", "1", "-o", "json"])
    .arg(env.temp.path().join("gdb.txt"))
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["total"], 3);
  assert_eq!(report["entries"].as_array().unwrap().len(), 1);
  assert_eq!(report["entries"][0]["stack"], "a");
}

#[test]
fn trace_json_frames_carry_resolution() {
  let env = TestEnv::new();
  env.write_file("gdb.txt", &sample_log(&["#0 0x0000000000401000"]));

  let output = env
    .modkit_cmd()
    .args(["trace", "-o", "json", "--binary", "/nonexistent/loader.elf"])
    .arg(env.temp.path().join("gdb.txt"))
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let frame = &report["entries"][0]["frames"][0];
  assert_eq!(frame["pc"], "0x0000000000401000");
  // addresses the binary cannot resolve stay unresolved rather than failing
  assert_eq!(frame["function"], serde_json::Value::Null);
}
