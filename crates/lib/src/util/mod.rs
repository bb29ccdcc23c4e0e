//! Shared utilities.
//!
//! Hashing for cache keys and the shell used to run external build commands.

pub mod hash;
pub mod shell;

#[cfg(test)]
pub mod testutil;
