//! Test utilities for modkit-lib.
//!
//! Fixture builders for module trees plus a fetcher that counts how often it
//! is asked to fetch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use crate::config::ModuleSource;
use crate::fetch::{FetchError, Fetcher, SourceFetcher};

/// Shell command that creates an empty file in the working directory.
#[cfg(unix)]
pub fn touch_script(filename: &str) -> String {
  format!("touch {}", filename)
}

#[cfg(windows)]
pub fn touch_script(filename: &str) -> String {
  format!("type nul > {}", filename)
}

/// Shell command that writes `line` followed by a newline to `filename`.
#[cfg(unix)]
pub fn write_line_script(filename: &str, line: &str) -> String {
  format!("printf '%s\\n' '{}' > {}", line, filename)
}

#[cfg(windows)]
pub fn write_line_script(filename: &str, line: &str) -> String {
  format!("echo {}> {}", line, filename)
}

/// Minimal valid properties for a module called `name`.
pub fn properties(name: &str) -> Value {
  json!({
    "name": name,
    "properties_version": 1,
    "dependencies": []
  })
}

/// Create a module source tree at `dir` containing `properties.json`.
pub fn write_module_source(dir: &Path, properties: &Value) -> PathBuf {
  fs::create_dir_all(dir).unwrap();
  fs::write(
    dir.join("properties.json"),
    serde_json::to_string_pretty(properties).unwrap(),
  )
  .unwrap();
  dir.to_path_buf()
}

/// A fetcher that delegates to [`SourceFetcher`] and counts invocations.
#[derive(Debug, Default)]
pub struct CountingFetcher {
  calls: AtomicUsize,
}

impl CountingFetcher {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Fetcher for CountingFetcher {
  fn fetch(&self, source: &ModuleSource, dest: &Path) -> Result<(), FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    SourceFetcher.fetch(source, dest)
  }
}
