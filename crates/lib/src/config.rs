//! Assembler configuration (`config.json`).
//!
//! ```json
//! {
//!   "modules": [
//!     { "path": "https://github.com/org/httpserver.git", "type": "git", "branch": "master" },
//!     { "path": "svn://example.org/modules/java", "type": "svn" },
//!     { "path": "../../apps/hello", "type": "dir" }
//!   ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read config '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The configuration file is not valid JSON or has the wrong shape.
  #[error("failed to parse config '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// The ordered list of modules to assemble.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
  #[serde(default)]
  pub modules: Vec<ModuleDescriptor>,
}

impl Configuration {
  /// Load and parse a configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: Configuration = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), modules = config.modules.len(), "loaded config");
    Ok(config)
  }
}

/// One configured module.
///
/// `type` is kept as written; it is only interpreted when the module has to be
/// fetched, so a cached module never fails on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
  /// Filesystem path, URL, or VCS location. Also the cache identity.
  pub path: String,

  /// Fetch mechanism: `git`, `svn` or `dir`.
  #[serde(rename = "type")]
  pub kind: String,

  /// Branch to clone (git only).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
}

impl ModuleDescriptor {
  /// Interpret the descriptor as a fetchable source.
  ///
  /// Returns `None` for an unsupported `type`.
  pub fn source(&self) -> Option<ModuleSource> {
    match self.kind.as_str() {
      "git" => Some(ModuleSource::Git {
        url: self.path.clone(),
        branch: self.branch.clone(),
      }),
      "svn" => Some(ModuleSource::Svn { url: self.path.clone() }),
      "dir" => Some(ModuleSource::Dir {
        path: PathBuf::from(&self.path),
      }),
      _ => None,
    }
  }
}

/// A module source with its fetch mechanism selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
  /// Clone `branch` (or the default branch) of a git repository.
  Git { url: String, branch: Option<String> },
  /// Check out a subversion URL.
  Svn { url: String },
  /// Recursively copy a local directory.
  Dir { path: PathBuf },
}

impl fmt::Display for ModuleSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModuleSource::Git { url, branch: Some(branch) } => write!(f, "git:{}#{}", url, branch),
      ModuleSource::Git { url, branch: None } => write!(f, "git:{}", url),
      ModuleSource::Svn { url } => write!(f, "svn:{}", url),
      ModuleSource::Dir { path } => write!(f, "dir:{}", path.display()),
    }
  }
}
