//! modkit-lib: module fetching and manifest assembly
//!
//! This crate provides the building blocks of `modkit`:
//! - `ModuleCache`: fetches each module once, keyed by its source location
//! - `ensure_fragment`: builds a module's per-build-type manifest fragment
//! - `Assembler`: concatenates a skeleton and every fragment into a manifest
//! - `ModuleIndex`: a local mirror of the published module index
//! - `SampleReport`: frequency reports over debugger stack samples

pub mod assemble;
pub mod cache;
pub mod config;
pub mod consts;
pub mod fetch;
pub mod fragment;
pub mod index;
pub mod layout;
pub mod properties;
pub mod trace;
pub mod util;
