//! Implementation of the `modkit trace` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use modkit_lib::trace::{Addr2Line, SampleReport};

use crate::output::{OutputFormat, print_json};

/// Print the most common stacks of a sample log.
///
/// With `binary`, frames are resolved to function names in both text and JSON
/// output.
pub fn cmd_trace(
  log: &Path,
  top: usize,
  prefix_width: usize,
  binary: Option<PathBuf>,
  output: OutputFormat,
) -> Result<()> {
  let mut report = SampleReport::from_file(log, prefix_width, top)?;

  if let Some(binary) = binary {
    report.symbolize(&Addr2Line::new(binary));
  }

  if output.is_json() {
    print_json(&report)
  } else {
    print!("{}", report.render());
    Ok(())
  }
}
