//! On-disk layout of an assembly run.
//!
//! ```text
//! build/
//!   config.json                 # module list
//!   usr.manifest.skel           # skeleton per build type
//!   usr.manifest                # assembled output
//!   modules/                    # work dir
//!     0b5f...e1.properties      # cache marker -> httpserver/properties.json
//!     httpserver/
//!       properties.json
//!       usr.manifest            # fragment
//! ```
//!
//! Everything except the work dir defaults to the work dir's parent.

use std::path::{Component, Path, PathBuf};

use crate::consts::{CONFIG_FILENAME, MANIFEST_SUFFIX, SKELETON_SUFFIX, WORK_DIR_ENV};

/// Resolved locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  /// Module tree: fetched modules and cache markers.
  pub work_dir: PathBuf,
  /// The configuration file.
  pub config_path: PathBuf,
  /// Directory holding `<build_type>.manifest.skel`.
  pub skeleton_dir: PathBuf,
  /// Directory receiving `<build_type>.manifest`.
  pub output_dir: PathBuf,
}

impl Layout {
  /// Default layout rooted at `work_dir`.
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    let work_dir = work_dir.into();
    let work_dir = dunce::canonicalize(&work_dir).unwrap_or(work_dir);
    let parent = work_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| work_dir.clone());

    Self {
      config_path: parent.join(CONFIG_FILENAME),
      skeleton_dir: parent.clone(),
      output_dir: parent,
      work_dir,
    }
  }

  /// Layout rooted at `$MODKIT_WORK_DIR`, or the current directory.
  pub fn from_env() -> std::io::Result<Self> {
    let work_dir = match std::env::var(WORK_DIR_ENV) {
      Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
      _ => std::env::current_dir()?,
    };
    Ok(Self::new(work_dir))
  }

  pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.config_path = path.into();
    self
  }

  pub fn with_skeleton_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.skeleton_dir = dir.into();
    self
  }

  pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = dir.into();
    self
  }

  pub fn skeleton_path(&self, build_type: &str) -> PathBuf {
    self.skeleton_dir.join(format!("{}{}", build_type, SKELETON_SUFFIX))
  }

  pub fn output_path(&self, build_type: &str) -> PathBuf {
    self.output_dir.join(format!("{}{}", build_type, MANIFEST_SUFFIX))
  }

  pub fn module_dir(&self, name: &str) -> PathBuf {
    self.work_dir.join(name)
  }

  /// `<work>/<name>/<build_type>.manifest`
  pub fn fragment_path(&self, name: &str, build_type: &str) -> PathBuf {
    self.module_dir(name).join(format!("{}{}", build_type, MANIFEST_SUFFIX))
  }
}

/// Whether `name` can be used as exactly one path component.
pub fn is_single_component(name: &str) -> bool {
  if name.is_empty() || name.contains(['/', '\\']) {
    return false;
  }
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(_)), None)
  )
}
