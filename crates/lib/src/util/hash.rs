//! Hashing utilities for the module cache.
//!
//! Cache markers are named after the MD5 digest of a module's source location.
//! MD5 is not used for integrity here, only as a stable identity that other
//! tooling reading the work dir already understands.

use md5::{Digest, Md5};

/// Lowercase hex MD5 digest of `data`.
pub fn md5_hex(data: &[u8]) -> String {
  let mut hasher = Md5::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}
