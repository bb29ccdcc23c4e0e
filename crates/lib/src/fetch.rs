//! Fetching module source trees.
//!
//! This module handles:
//! - Cloning a git branch (through `gix`, no `git` binary needed)
//! - Checking out a subversion URL (through the `svn` tool)
//! - Copying a local directory, preserving symlinks
//!
//! Every mechanism materializes the full tree at a destination that must not
//! exist yet. Relative local sources are resolved against the destination's
//! parent, which is the work dir.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ModuleSource;

/// Errors that can occur during fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Failed to clone a git repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to check out the cloned worktree.
  #[error("failed to checkout '{url}': {source}")]
  Checkout {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// An external tool could not be started.
  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// An external tool exited unsuccessfully.
  #[error("'{command}' exited with status {code:?}: {stderr}")]
  CommandFailed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The local source directory does not exist.
  #[error("path does not exist: {0}")]
  PathNotFound(PathBuf),

  /// Failed to copy a local source directory.
  #[error("failed to copy '{from}' to '{to}': {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Materializes a module source tree at a destination path.
///
/// Implementations are blocking; callers run them on a blocking thread.
pub trait Fetcher: Send + Sync {
  fn fetch(&self, source: &ModuleSource, dest: &Path) -> Result<(), FetchError>;
}

/// The real fetch mechanisms.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFetcher;

impl Fetcher for SourceFetcher {
  fn fetch(&self, source: &ModuleSource, dest: &Path) -> Result<(), FetchError> {
    let base = dest.parent().unwrap_or(Path::new("."));

    match source {
      ModuleSource::Git { url, branch } => {
        let url = anchor_local(url, base);
        clone_repo(&url, branch.as_deref(), dest)
      }
      ModuleSource::Svn { url } => checkout_svn(url, dest, base),
      ModuleSource::Dir { path } => {
        let path = if path.is_relative() { base.join(path) } else { path.clone() };
        copy_tree(&path, dest)
      }
    }
  }
}

/// Clone a git repository to `dest`, checking out `branch` when given.
pub fn clone_repo(url: &str, branch: Option<&str>, dest: &Path) -> Result<(), FetchError> {
  info!(url, branch, path = %dest.display(), "cloning repository");

  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| FetchError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  if let Some(branch) = branch {
    prepared = prepared.with_ref_name(Some(branch)).map_err(|e| FetchError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;
  }

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Checkout {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(())
}

/// `svn co <url> <dest>`, run from `cwd`.
fn checkout_svn(url: &str, dest: &Path, cwd: &Path) -> Result<(), FetchError> {
  info!(url, path = %dest.display(), "checking out subversion source");

  let output = Command::new("svn")
    .arg("co")
    .arg(url)
    .arg(dest)
    .current_dir(cwd)
    .output()
    .map_err(|source| FetchError::Spawn {
      program: "svn".to_string(),
      source,
    })?;

  if !output.status.success() {
    return Err(FetchError::CommandFailed {
      command: format!("svn co {} {}", url, dest.display()),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }

  Ok(())
}

/// Recursively copy `src` to `dest`, keeping symlinks as symlinks.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), FetchError> {
  if !src.is_dir() {
    return Err(FetchError::PathNotFound(src.to_path_buf()));
  }

  info!(from = %src.display(), to = %dest.display(), "copying directory");

  let copy_err = |from: &Path, to: &Path, source: io::Error| FetchError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  };

  for entry in WalkDir::new(src).follow_links(false) {
    let entry = entry.map_err(|e| copy_err(src, dest, io::Error::other(e)))?;
    let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
    let target = dest.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(|e| copy_err(entry.path(), &target, e))?;
    } else if file_type.is_symlink() {
      let link = fs::read_link(entry.path()).map_err(|e| copy_err(entry.path(), &target, e))?;
      create_symlink(&link, &target).map_err(|e| copy_err(entry.path(), &target, e))?;
    } else {
      fs::copy(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
    }
  }

  debug!(path = %dest.display(), "copy complete");
  Ok(())
}

/// Resolve a relative local git path against `base`; URLs are left alone.
fn anchor_local(url: &str, base: &Path) -> String {
  let candidate = Path::new(url);
  if url.contains("://") || candidate.is_absolute() {
    return url.to_string();
  }
  let anchored = base.join(candidate);
  if anchored.exists() {
    anchored.to_string_lossy().into_owned()
  } else {
    url.to_string()
  }
}

#[cfg(unix)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  let resolved = link.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf());
  if resolved.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
