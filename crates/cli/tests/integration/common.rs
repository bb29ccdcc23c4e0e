//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Isolated assembly environment.
///
/// ```text
/// <temp>/
///   sources/<dir>/              dir-type module sources
///   build/config.json
///   build/<type>.manifest.skel
///   build/modules/              work dir
/// ```
pub struct TestEnv {
  pub temp: TempDir,
  modules: Vec<Value>,
}

impl TestEnv {
  /// Create an environment with an empty module list.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("build").join("modules")).unwrap();
    let env = Self {
      temp,
      modules: Vec::new(),
    };
    env.write_config();
    env
  }

  pub fn build_dir(&self) -> PathBuf {
    self.temp.path().join("build")
  }

  pub fn work_dir(&self) -> PathBuf {
    self.build_dir().join("modules")
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn skeleton(&self, build_type: &str, content: &str) {
    self.write_file(&format!("build/{}.manifest.skel", build_type), content);
  }

  /// Add a dir-type module whose sources hold `properties` and the given
  /// prebuilt fragments.
  pub fn dir_module(&mut self, dir: &str, properties: Value, fragments: &[(&str, &str)]) -> PathBuf {
    self.write_file(
      &format!("sources/{}/properties.json", dir),
      &serde_json::to_string_pretty(&properties).unwrap(),
    );
    for (build_type, content) in fragments {
      self.write_file(&format!("sources/{}/{}.manifest", dir, build_type), content);
    }

    let src = self.temp.path().join("sources").join(dir);
    self.descriptor(json!({ "path": src.to_string_lossy(), "type": "dir" }));
    src
  }

  /// Append a raw descriptor to `config.json`.
  pub fn descriptor(&mut self, descriptor: Value) {
    self.modules.push(descriptor);
    self.write_config();
  }

  fn write_config(&self) {
    let config = json!({ "modules": self.modules });
    std::fs::write(
      self.build_dir().join("config.json"),
      serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
  }

  pub fn output_path(&self, build_type: &str) -> PathBuf {
    self.build_dir().join(format!("{}.manifest", build_type))
  }

  pub fn read_output(&self, build_type: &str) -> Option<String> {
    std::fs::read_to_string(self.output_path(build_type)).ok()
  }

  /// `modkit` running inside this environment's work dir.
  pub fn modkit_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("modkit");
    cmd.current_dir(self.work_dir());
    cmd.env_remove("MODKIT_WORK_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

/// A properties record with the given version and dependencies.
pub fn properties(name: &str, version: i64, dependencies: &[&str]) -> Value {
  json!({
    "name": name,
    "properties_version": version,
    "dependencies": dependencies,
  })
}
