//! Module properties record (`properties.json`).
//!
//! Every module ships a properties file at the root of its tree:
//!
//! ```json
//! {
//!   "name": "httpserver",
//!   "properties_version": 1,
//!   "dependencies": ["java_home"],
//!   "java_home": "/usr/lib/jvm/java"
//! }
//! ```
//!
//! Each `dependencies` entry names another key of the same record that must be
//! present before the module can be built.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::consts::PROPERTIES_VERSION;

/// Errors that can occur when reading a properties file.
#[derive(Debug, Error)]
pub enum PropertiesError {
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
}

/// Why a record cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("unsupported properties version {found} (expected {expected})")]
  UnsupportedVersion { found: i64, expected: i64 },

  #[error("requires {0}")]
  MissingDependency(String),
}

/// A fetched module's self-declared metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProperties {
  /// Unique module name, also its directory name in the work dir.
  pub name: String,

  /// Signed so that any integer reaches the version check.
  pub properties_version: i64,

  #[serde(default)]
  pub dependencies: Vec<String>,

  /// Every other key, typically resolved dependency values.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ModuleProperties {
  /// Read and parse a properties file. Symlinks are followed.
  pub fn load(path: &Path) -> Result<Self, PropertiesError> {
    let content = fs::read_to_string(path).map_err(|source| PropertiesError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| PropertiesError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Whether `key` is a top-level key of the record.
  pub fn has_key(&self, key: &str) -> bool {
    matches!(key, "name" | "properties_version" | "dependencies") || self.extra.contains_key(key)
  }

  /// Check the record can be built: version first, then dependencies in order.
  pub fn check_buildable(&self) -> Result<(), ValidationError> {
    if self.properties_version != PROPERTIES_VERSION {
      return Err(ValidationError::UnsupportedVersion {
        found: self.properties_version,
        expected: PROPERTIES_VERSION,
      });
    }

    match self.dependencies.iter().find(|dep| !self.has_key(dep)) {
      Some(missing) => Err(ValidationError::MissingDependency(missing.clone())),
      None => Ok(()),
    }
  }
}
