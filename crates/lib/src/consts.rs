//! Fixed names shared across the crate.

pub const APP_NAME: &str = "modkit";

/// The only properties format this assembler understands.
pub const PROPERTIES_VERSION: i64 = 1;

/// Properties file written by a module's own tooling at the root of its tree.
pub const PROPERTIES_FILENAME: &str = "properties.json";

pub const CONFIG_FILENAME: &str = "config.json";

/// Suffix of the cache marker `<md5>.properties`.
pub const MARKER_SUFFIX: &str = ".properties";

/// Prefix of per-key scratch directories used while fetching.
pub const SCRATCH_PREFIX: &str = ".tmp-";

pub const SKELETON_SUFFIX: &str = ".manifest.skel";
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// Command run inside a module directory to produce its fragments.
pub const DEFAULT_BUILD_COMMAND: &str = "make module";

pub const DEFAULT_PARALLELISM: usize = 4;

pub const WORK_DIR_ENV: &str = "MODKIT_WORK_DIR";
pub const INDEX_URL_ENV: &str = "MODKIT_INDEX_URL";
pub const INDEX_PATH_ENV: &str = "MODKIT_INDEX_PATH";

pub const DEFAULT_INDEX_URL: &str = "https://github.com/syuu1228/osv-module-repository.git";
pub const DEFAULT_INDEX_PATH: &str = "build/repository";
pub const INDEX_FILENAME: &str = "modules.json";
