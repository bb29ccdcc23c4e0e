//! Manifest assembly.
//!
//! `assemble` is the single entry point that turns a configuration into
//! `<build_type>.manifest`:
//! 1. Checks the skeleton exists and discards a previous output
//! 2. Resolves every configured module through the [`ModuleCache`]
//! 3. Deduplicates by module name, keeping first-resolution order
//! 4. Ensures every module's fragment exists, building missing ones
//! 5. Writes skeleton + fragments through a temporary file and renames it
//!
//! Resolution and fragment building run concurrently, bounded by
//! `parallelism`. Any error aborts the whole run and no output is written.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cache::{CacheError, ModuleCache, Resolved};
use crate::config::{ConfigError, Configuration};
use crate::consts::DEFAULT_PARALLELISM;
use crate::fetch::Fetcher;
use crate::fragment::{BuildConfig, FragmentError, FragmentOutcome, ensure_fragment};
use crate::layout::{Layout, is_single_component};
use crate::properties::ModuleProperties;

#[cfg(unix)]
const MANIFEST_MODE: u32 = 0o644;

/// Errors that abort an assembly run.
#[derive(Debug, Error)]
pub enum AssembleError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("invalid build type '{0}'")]
  InvalidBuildType(String),

  #[error("skeleton not found: {0}")]
  SkeletonNotFound(PathBuf),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Fragment(#[from] FragmentError),

  #[error("failed to write manifest '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("assembly task failed: {0}")]
  Task(String),
}

impl AssembleError {
  /// Process exit code for this failure kind.
  pub fn exit_code(&self) -> i32 {
    match self {
      AssembleError::Config(_) | AssembleError::InvalidBuildType(_) => 2,
      AssembleError::SkeletonNotFound(_) => 3,
      AssembleError::Cache(CacheError::UnsupportedModuleType { .. }) => 4,
      AssembleError::Cache(CacheError::MissingProperties { .. } | CacheError::InvalidModuleName { .. }) => 5,
      AssembleError::Fragment(FragmentError::UnsupportedPropertiesVersion { .. }) => 6,
      AssembleError::Fragment(FragmentError::MissingDependency { .. }) => 7,
      AssembleError::Cache(CacheError::FetchFailed { .. }) => 8,
      AssembleError::Fragment(FragmentError::BuildFailed { .. }) => 9,
      AssembleError::Cache(_) | AssembleError::Write { .. } | AssembleError::Task(_) => 1,
    }
  }
}

/// Options for an assembly run.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
  /// Maximum number of modules fetched or built at once.
  pub parallelism: usize,
  pub build: BuildConfig,
}

impl Default for AssembleOptions {
  fn default() -> Self {
    Self {
      parallelism: DEFAULT_PARALLELISM,
      build: BuildConfig::default(),
    }
  }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembleResult {
  pub build_type: String,
  pub output: PathBuf,
  /// Module names in the order their fragments were appended.
  pub modules: Vec<String>,
  /// Modules fetched during this run (cache misses).
  pub fetched: usize,
  /// Fragments produced by running the build command.
  pub built: usize,
}

/// Assembles manifests for one work dir.
#[derive(Debug, Clone)]
pub struct Assembler {
  layout: Arc<Layout>,
  cache: Arc<ModuleCache>,
  options: AssembleOptions,
}

impl Assembler {
  pub fn new(layout: Layout, options: AssembleOptions) -> Self {
    let cache = Arc::new(ModuleCache::new(&layout.work_dir));
    Self {
      layout: Arc::new(layout),
      cache,
      options,
    }
  }

  /// Use a custom fetcher for cache misses.
  pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
    self.cache = Arc::new(ModuleCache::with_fetcher(&self.layout.work_dir, fetcher));
    self
  }

  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  /// Load the configuration from the layout and assemble `build_type`.
  pub async fn assemble_from_config(&self, build_type: &str) -> Result<AssembleResult, AssembleError> {
    let config = Configuration::load(&self.layout.config_path)?;
    self.assemble(build_type, &config).await
  }

  /// Assemble `<output_dir>/<build_type>.manifest` from `config`.
  pub async fn assemble(&self, build_type: &str, config: &Configuration) -> Result<AssembleResult, AssembleError> {
    if !is_single_component(build_type) {
      return Err(AssembleError::InvalidBuildType(build_type.to_string()));
    }

    let skeleton = self.layout.skeleton_path(build_type);
    if !skeleton.is_file() {
      return Err(AssembleError::SkeletonNotFound(skeleton));
    }

    let output = self.layout.output_path(build_type);
    if output.exists() {
      debug!(path = %output.display(), "removing previous manifest");
      fs::remove_file(&output).map_err(|source| AssembleError::Write {
        path: output.clone(),
        source,
      })?;
    }

    info!(build_type, modules = config.modules.len(), "assembling manifest");

    let resolved = self.resolve_all(config).await?;
    let fetched = resolved.iter().filter(|r| r.fetched).count();

    let mut records: IndexMap<String, ModuleProperties> = IndexMap::new();
    for Resolved { properties, .. } in resolved {
      records.insert(properties.name.clone(), properties);
    }

    let fragments = self.ensure_all(build_type, &records).await?;
    let built = fragments.iter().filter(|f| f.built).count();

    let paths: Vec<PathBuf> = fragments.into_iter().map(|f| f.path).collect();
    let out = output.clone();
    tokio::task::spawn_blocking(move || write_manifest(&skeleton, &paths, &out))
      .await
      .map_err(|e| AssembleError::Task(e.to_string()))??;

    info!(path = %output.display(), fetched, built, "manifest written");

    Ok(AssembleResult {
      build_type: build_type.to_string(),
      output,
      modules: records.into_keys().collect(),
      fetched,
      built,
    })
  }

  /// Resolve every descriptor, returning results in configuration order.
  async fn resolve_all(&self, config: &Configuration) -> Result<Vec<Resolved>, AssembleError> {
    let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for (idx, descriptor) in config.modules.iter().enumerate() {
      let cache = self.cache.clone();
      let descriptor = descriptor.clone();
      let semaphore = semaphore.clone();

      join_set.spawn(async move {
        let _permit = semaphore
          .acquire_owned()
          .await
          .map_err(|e| AssembleError::Task(e.to_string()))?;
        let resolved = cache.resolve(&descriptor).await?;
        Ok::<_, AssembleError>((idx, resolved))
      });
    }

    collect_ordered(join_set, config.modules.len()).await
  }

  /// Ensure each record's fragment, returning outcomes in record order.
  async fn ensure_all(
    &self,
    build_type: &str,
    records: &IndexMap<String, ModuleProperties>,
  ) -> Result<Vec<FragmentOutcome>, AssembleError> {
    let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for (idx, properties) in records.values().enumerate() {
      let properties = properties.clone();
      let layout = self.layout.clone();
      let build = self.options.build.clone();
      let build_type = build_type.to_string();
      let semaphore = semaphore.clone();

      join_set.spawn(async move {
        let _permit = semaphore
          .acquire_owned()
          .await
          .map_err(|e| AssembleError::Task(e.to_string()))?;
        let outcome = ensure_fragment(&properties, &build_type, &layout, &build).await?;
        Ok::<_, AssembleError>((idx, outcome))
      });
    }

    collect_ordered(join_set, records.len()).await
  }
}

/// Drain a join set of indexed results, failing on the first error.
///
/// Returning early drops the join set, which aborts the remaining tasks.
async fn collect_ordered<T: 'static>(
  mut join_set: JoinSet<Result<(usize, T), AssembleError>>,
  len: usize,
) -> Result<Vec<T>, AssembleError> {
  let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();

  while let Some(joined) = join_set.join_next().await {
    let (idx, value) = joined.map_err(|e| AssembleError::Task(e.to_string()))??;
    slots[idx] = Some(value);
  }

  slots
    .into_iter()
    .map(|slot| slot.ok_or_else(|| AssembleError::Task("task result missing".to_string())))
    .collect()
}

/// Write `skeleton` followed by every fragment to `output`.
///
/// Content goes to a temporary file next to `output` that is renamed into
/// place only once everything was copied.
pub fn write_manifest(skeleton: &Path, fragments: &[PathBuf], output: &Path) -> Result<(), AssembleError> {
  let write_err = |source: io::Error| AssembleError::Write {
    path: output.to_path_buf(),
    source,
  };

  let dir = output.parent().unwrap_or(Path::new("."));
  let temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;

  {
    let mut writer = BufWriter::new(temp.as_file());

    let mut skel = File::open(skeleton).map_err(|source| AssembleError::Write {
      path: skeleton.to_path_buf(),
      source,
    })?;
    io::copy(&mut skel, &mut writer).map_err(write_err)?;

    for fragment in fragments {
      debug!(fragment = %fragment.display(), output = %output.display(), "appending fragment");
      let mut file = File::open(fragment).map_err(|source| AssembleError::Write {
        path: fragment.clone(),
        source,
      })?;
      io::copy(&mut file, &mut writer).map_err(write_err)?;
    }

    writer.flush().map_err(write_err)?;
  }

  // temp files are created owner-only; the manifest is read by later build steps
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    temp
      .as_file()
      .set_permissions(fs::Permissions::from_mode(MANIFEST_MODE))
      .map_err(write_err)?;
  }

  temp.persist(output).map_err(|e| write_err(e.error))?;
  Ok(())
}
