//! Content-addressed module cache.
//!
//! Each configured module is fetched at most once per unique source location.
//! The cache lives in the work dir and keeps the on-disk contract that module
//! build tooling relies on:
//!
//! ```text
//! <work>/
//!   5eb63bbbe01eeed093cb22bb8f5acdc3.properties -> httpserver/properties.json
//!   httpserver/
//!     properties.json
//!     ...
//! ```
//!
//! The marker is named after the MD5 of the descriptor's `path`; its existence
//! means "already fetched". A fetch lands in a per-key scratch directory
//! (`.tmp-<key>`) and is renamed to the module's declared name once its
//! properties have been read.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ModuleDescriptor;
use crate::consts::{MARKER_SUFFIX, PROPERTIES_FILENAME, SCRATCH_PREFIX};
use crate::fetch::{FetchError, Fetcher, SourceFetcher, create_symlink};
use crate::layout::is_single_component;
use crate::properties::{ModuleProperties, PropertiesError};
use crate::util::hash::md5_hex;

/// Errors that can occur while resolving a module through the cache.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The descriptor's `type` is not `git`, `svn` or `dir`.
  #[error("{path}: '{kind}' is an unknown module type")]
  UnsupportedModuleType { path: String, kind: String },

  /// The fetch mechanism failed.
  #[error("{path}: fetch failed: {source}")]
  FetchFailed {
    path: String,
    #[source]
    source: FetchError,
  },

  /// The fetched tree has no readable `properties.json`.
  #[error("{path}: missing or invalid {PROPERTIES_FILENAME}: {source}")]
  MissingProperties {
    path: String,
    #[source]
    source: PropertiesError,
  },

  /// The module's declared name cannot be used as a directory name.
  #[error("{path}: invalid module name '{name}'")]
  InvalidModuleName { path: String, name: String },

  /// A cache marker exists but its target cannot be read.
  #[error("cache marker '{marker}' is unreadable: {source}")]
  CorruptMarker {
    marker: PathBuf,
    #[source]
    source: PropertiesError,
  },

  /// A filesystem operation on the cache failed.
  #[error("failed to {action} '{path}': {source}")]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The blocking fetch task panicked or was cancelled.
  #[error("{path}: fetch task failed: {message}")]
  Task { path: String, message: String },
}

/// Cache identity of a module: the MD5 hex digest of its source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(pub String);

impl CacheKey {
  pub fn for_path(path: &str) -> Self {
    CacheKey(md5_hex(path.as_bytes()))
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A resolved module and whether this call had to fetch it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub properties: ModuleProperties,
  pub fetched: bool,
}

/// The module cache of one work dir.
///
/// Cache misses are serialized per key so concurrent resolutions of the same
/// source fetch once; different keys proceed in parallel.
pub struct ModuleCache {
  work_dir: PathBuf,
  fetcher: Arc<dyn Fetcher>,
  locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl fmt::Debug for ModuleCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModuleCache").field("work_dir", &self.work_dir).finish()
  }
}

impl ModuleCache {
  /// Create a cache in `work_dir` using the real fetch mechanisms.
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    Self::with_fetcher(work_dir, Arc::new(SourceFetcher))
  }

  /// Create a cache with a custom fetcher.
  pub fn with_fetcher(work_dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
    Self {
      work_dir: work_dir.into(),
      fetcher,
      locks: Mutex::new(HashMap::new()),
    }
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  /// `<work>/<key>.properties`
  pub fn marker_path(&self, key: &CacheKey) -> PathBuf {
    self.work_dir.join(format!("{}{}", key, MARKER_SUFFIX))
  }

  fn scratch_path(&self, key: &CacheKey) -> PathBuf {
    self.work_dir.join(format!("{}{}", SCRATCH_PREFIX, key))
  }

  /// Read the record behind `key`'s marker, if the module was fetched before.
  pub fn lookup(&self, key: &CacheKey) -> Result<Option<ModuleProperties>, CacheError> {
    let marker = self.marker_path(key);

    // symlink_metadata so a dangling marker is reported instead of ignored
    if marker.symlink_metadata().is_err() {
      return Ok(None);
    }

    let properties =
      ModuleProperties::load(&marker).map_err(|source| CacheError::CorruptMarker { marker, source })?;

    debug!(key = %key, module = %properties.name, "cache hit");
    Ok(Some(properties))
  }

  /// Point `key`'s marker at `<name>/properties.json`, replacing any old marker.
  pub fn store(&self, key: &CacheKey, name: &str) -> Result<(), CacheError> {
    let marker = self.marker_path(key);

    if marker.symlink_metadata().is_ok() {
      fs::remove_file(&marker).map_err(|source| CacheError::Io {
        action: "remove stale marker",
        path: marker.clone(),
        source,
      })?;
    }

    let target = Path::new(name).join(PROPERTIES_FILENAME);
    create_symlink(&target, &marker).map_err(|source| CacheError::Io {
      action: "create marker",
      path: marker.clone(),
      source,
    })?;

    debug!(key = %key, target = %target.display(), "stored cache marker");
    Ok(())
  }

  /// Resolve a descriptor to its properties, fetching it on a cache miss.
  pub async fn resolve(&self, descriptor: &ModuleDescriptor) -> Result<Resolved, CacheError> {
    let key = CacheKey::for_path(&descriptor.path);

    let lock = self.key_lock(&key);
    let _guard = lock.lock().await;

    if let Some(properties) = self.lookup(&key)? {
      return Ok(Resolved {
        properties,
        fetched: false,
      });
    }

    let properties = self.fetch_and_store(&key, descriptor).await?;
    Ok(Resolved {
      properties,
      fetched: true,
    })
  }

  fn key_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(key.clone()).or_default().clone()
  }

  async fn fetch_and_store(&self, key: &CacheKey, descriptor: &ModuleDescriptor) -> Result<ModuleProperties, CacheError> {
    let path = descriptor.path.clone();

    let source = descriptor.source().ok_or_else(|| CacheError::UnsupportedModuleType {
      path: path.clone(),
      kind: descriptor.kind.clone(),
    })?;

    let scratch = self.scratch_path(key);
    remove_dir_if_exists(&scratch)?;

    info!(module = %path, source = %source, "fetching module");

    let fetcher = self.fetcher.clone();
    let dest = scratch.clone();
    tokio::task::spawn_blocking(move || fetcher.fetch(&source, &dest))
      .await
      .map_err(|e| CacheError::Task {
        path: path.clone(),
        message: e.to_string(),
      })?
      .map_err(|source| CacheError::FetchFailed {
        path: path.clone(),
        source,
      })?;

    let properties = match ModuleProperties::load(&scratch.join(PROPERTIES_FILENAME)) {
      Ok(properties) => properties,
      Err(source) => {
        remove_dir_if_exists(&scratch)?;
        return Err(CacheError::MissingProperties { path, source });
      }
    };

    if !is_single_component(&properties.name) {
      remove_dir_if_exists(&scratch)?;
      return Err(CacheError::InvalidModuleName {
        path,
        name: properties.name,
      });
    }

    let name = properties.name.clone();
    let module_dir = self.work_dir.join(&name);
    let properties = if install_tree(&scratch, &module_dir)? {
      properties
    } else {
      warn!(
        module = %name,
        source = %path,
        "module directory already exists, reusing it"
      );
      remove_dir_if_exists(&scratch)?;
      // the marker will point at the record on disk, so that is what callers see
      ModuleProperties::load(&module_dir.join(PROPERTIES_FILENAME))
        .map_err(|source| CacheError::MissingProperties { path, source })?
    };

    self.store(key, &name)?;

    info!(module = %name, key = %key, "module cached");
    Ok(properties)
  }
}

/// Move a fetched tree into place.
///
/// Returns `false`, leaving `scratch` untouched, when `module_dir` is already
/// occupied, including when a concurrent fetch of another source declaring
/// the same name got there first.
fn install_tree(scratch: &Path, module_dir: &Path) -> Result<bool, CacheError> {
  // rename refuses a non-empty target, so this also settles concurrent installs
  match fs::rename(scratch, module_dir) {
    Ok(()) => Ok(true),
    Err(_) if module_dir.join(PROPERTIES_FILENAME).exists() => Ok(false),
    Err(source) => Err(CacheError::Io {
      action: "rename fetched tree to",
      path: module_dir.to_path_buf(),
      source,
    }),
  }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), CacheError> {
  if path.symlink_metadata().is_ok() {
    fs::remove_dir_all(path).map_err(|source| CacheError::Io {
      action: "remove scratch directory",
      path: path.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}
