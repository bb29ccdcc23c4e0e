//! Implementation of the `modkit repo` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};

use modkit_lib::index::{ModuleIndex, UpdateOutcome};

use crate::output::{OutputFormat, print_info, print_json, print_success};

fn open_index(url: Option<String>, path: Option<PathBuf>) -> ModuleIndex {
  let mut index = ModuleIndex::from_env();
  if let Some(url) = url {
    index = index.with_url(url);
  }
  if let Some(path) = path {
    index = index.with_path(path);
  }
  index
}

/// Clone or refresh the local index mirror.
pub fn cmd_repo_update(url: Option<String>, path: Option<PathBuf>) -> Result<()> {
  let index = open_index(url, path);

  let outcome = index
    .update()
    .with_context(|| format!("Failed to update module index from {}", index.url()))?;

  let verb = match outcome {
    UpdateOutcome::Cloned => "Cloned",
    UpdateOutcome::Refreshed => "Refreshed",
  };
  print_success(&format!("{} module index at {}", verb, index.path().display()));
  Ok(())
}

/// Print the first module whose name contains `name` as JSON.
pub fn cmd_repo_search(name: &str, path: Option<PathBuf>) -> Result<()> {
  let index = open_index(None, path);

  match index.search(name)? {
    Some(entry) => print_json(&entry)?,
    None => print_info(&format!("No module exists: {}", name)),
  }
  Ok(())
}

/// Print every module name in the index.
pub fn cmd_repo_list(path: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let index = open_index(None, path);
  let entries = index.entries()?;

  if output.is_json() {
    print_json(&entries)?;
  } else {
    for entry in &entries {
      println!("{}", entry.name);
    }
  }
  Ok(())
}
