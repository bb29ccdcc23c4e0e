//! CLI integration tests.

mod common;

mod assemble_tests;
mod repo_tests;
mod trace_tests;
