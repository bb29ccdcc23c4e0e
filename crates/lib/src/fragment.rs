//! Per-module manifest fragments.
//!
//! A fragment (`<module>/<build_type>.manifest`) is produced by the module's
//! own build step. An existing fragment is always reused as is; no staleness
//! check is made against the module's sources.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::DEFAULT_BUILD_COMMAND;
use crate::layout::Layout;
use crate::properties::{ModuleProperties, ValidationError};
use crate::util::shell::{output_summary, run_shell};

/// Errors that can occur while ensuring a fragment exists.
#[derive(Debug, Error)]
pub enum FragmentError {
  #[error("[{module}] unsupported properties version {found} (expected {expected})")]
  UnsupportedPropertiesVersion { module: String, found: i64, expected: i64 },

  #[error("[{module}] requires {dependency}")]
  MissingDependency { module: String, dependency: String },

  #[error("[{module}] build command '{command}' failed: {message}")]
  BuildFailed {
    module: String,
    command: String,
    message: String,
  },
}

impl FragmentError {
  fn from_validation(module: &str, err: ValidationError) -> Self {
    match err {
      ValidationError::UnsupportedVersion { found, expected } => FragmentError::UnsupportedPropertiesVersion {
        module: module.to_string(),
        found,
        expected,
      },
      ValidationError::MissingDependency(dependency) => FragmentError::MissingDependency {
        module: module.to_string(),
        dependency,
      },
    }
  }
}

/// How module builds are invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  /// Command run in the module directory.
  pub command: String,
  /// Shell override; the platform shell when `None`.
  pub shell: Option<String>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      command: DEFAULT_BUILD_COMMAND.to_string(),
      shell: None,
    }
  }
}

/// A fragment that is known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentOutcome {
  pub path: PathBuf,
  /// Whether the build command ran to produce it.
  pub built: bool,
}

/// Make sure `<module>/<build_type>.manifest` exists, building it if missing.
///
/// The record is validated before anything runs: the properties version first,
/// then every dependency in declaration order.
pub async fn ensure_fragment(
  properties: &ModuleProperties,
  build_type: &str,
  layout: &Layout,
  build: &BuildConfig,
) -> Result<FragmentOutcome, FragmentError> {
  let module = properties.name.as_str();
  let path = layout.fragment_path(module, build_type);

  if path.exists() {
    debug!(module, path = %path.display(), "fragment exists, skipping build");
    return Ok(FragmentOutcome { path, built: false });
  }

  properties
    .check_buildable()
    .map_err(|e| FragmentError::from_validation(module, e))?;

  let module_dir = layout.module_dir(module);
  info!(module, cmd = %build.command, "building module");

  let build_failed = |message: String| FragmentError::BuildFailed {
    module: module.to_string(),
    command: build.command.clone(),
    message,
  };

  let output = run_shell(&build.command, &module_dir, build.shell.as_deref())
    .await
    .map_err(|e| build_failed(e.to_string()))?;

  if !output.status.success() {
    let summary = output_summary(&output);
    let message = match output.status.code() {
      Some(code) => format!("exit code {}: {}", code, summary),
      None => format!("terminated by signal: {}", summary),
    };
    return Err(build_failed(message));
  }

  if !path.exists() {
    return Err(build_failed(format!("did not produce {}", path.display())));
  }

  Ok(FragmentOutcome { path, built: true })
}
