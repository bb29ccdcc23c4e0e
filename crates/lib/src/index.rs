//! Local mirror of the remote module index.
//!
//! The index is a git repository whose `modules.json` lists every published
//! module:
//!
//! ```json
//! [
//!   { "name": "httpserver", "path": "https://github.com/org/httpserver.git", "type": "git" },
//!   { "name": "java", "path": "https://github.com/org/java.git", "type": "git" }
//! ]
//! ```
//!
//! Updating re-clones into a scratch sibling and swaps it in, so a failed
//! update never leaves a half-written mirror behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEFAULT_INDEX_PATH, DEFAULT_INDEX_URL, INDEX_FILENAME, INDEX_PATH_ENV, INDEX_URL_ENV};
use crate::fetch::{FetchError, clone_repo};

/// Errors that can occur while working with the module index.
#[derive(Debug, Error)]
pub enum IndexError {
  /// The mirror has not been cloned yet.
  #[error("module index not found at '{0}', run `modkit repo update` first")]
  NotFetched(PathBuf),

  #[error("failed to fetch module index: {0}")]
  Fetch(#[from] FetchError),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to replace '{path}': {source}")]
  Replace {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// One published module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
  pub name: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// What `update` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOutcome {
  Cloned,
  Refreshed,
}

/// A local mirror of the module index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIndex {
  url: String,
  path: PathBuf,
}

impl ModuleIndex {
  pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      url: url.into(),
      path: path.into(),
    }
  }

  /// Index from `$MODKIT_INDEX_URL` / `$MODKIT_INDEX_PATH`, falling back to
  /// the defaults.
  pub fn from_env() -> Self {
    let url = std::env::var(INDEX_URL_ENV).unwrap_or_else(|_| DEFAULT_INDEX_URL.to_string());
    let path = std::env::var(INDEX_PATH_ENV).unwrap_or_else(|_| DEFAULT_INDEX_PATH.to_string());
    Self::new(url, path)
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = url.into();
    self
  }

  pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.path = path.into();
    self
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_fetched(&self) -> bool {
    self.path.join(INDEX_FILENAME).is_file()
  }

  /// Clone the index, or replace an existing mirror with a fresh clone.
  pub fn update(&self) -> Result<UpdateOutcome, IndexError> {
    if !self.path.exists() {
      if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IndexError::Replace {
          path: parent.to_path_buf(),
          source,
        })?;
      }
      clone_repo(&self.url, None, &self.path)?;
      info!(path = %self.path.display(), "module index cloned");
      return Ok(UpdateOutcome::Cloned);
    }

    let fresh = self.sibling("new");
    let old = self.sibling("old");
    remove_if_exists(&fresh)?;
    remove_if_exists(&old)?;

    if let Err(e) = clone_repo(&self.url, None, &fresh) {
      remove_if_exists(&fresh)?;
      return Err(e.into());
    }

    let replace_err = |source| IndexError::Replace {
      path: self.path.clone(),
      source,
    };
    fs::rename(&self.path, &old).map_err(replace_err)?;
    fs::rename(&fresh, &self.path).map_err(replace_err)?;
    remove_if_exists(&old)?;

    info!(path = %self.path.display(), "module index refreshed");
    Ok(UpdateOutcome::Refreshed)
  }

  /// Every entry of `modules.json`, in file order.
  pub fn entries(&self) -> Result<Vec<IndexEntry>, IndexError> {
    let file = self.path.join(INDEX_FILENAME);
    if !file.is_file() {
      return Err(IndexError::NotFetched(self.path.clone()));
    }

    let content = fs::read_to_string(&file).map_err(|source| IndexError::Read {
      path: file.clone(),
      source,
    })?;
    let entries: Vec<IndexEntry> =
      serde_json::from_str(&content).map_err(|source| IndexError::Parse { path: file, source })?;

    debug!(count = entries.len(), "loaded module index");
    Ok(entries)
  }

  /// First entry whose name contains `query`.
  pub fn search(&self, query: &str) -> Result<Option<IndexEntry>, IndexError> {
    Ok(self.entries()?.into_iter().find(|entry| entry.name.contains(query)))
  }

  fn sibling(&self, suffix: &str) -> PathBuf {
    let name = self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "repository".to_string());
    self.path.with_file_name(format!(".{}.{}", name, suffix))
  }
}

fn remove_if_exists(path: &Path) -> Result<(), IndexError> {
  if path.exists() {
    fs::remove_dir_all(path).map_err(|source| IndexError::Replace {
      path: path.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}
