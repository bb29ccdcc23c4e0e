//! Implementation of the `modkit assemble` command.
//!
//! Resolves every configured module, makes sure each has a fragment for the
//! requested build type, and writes `<build_type>.manifest`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use modkit_lib::assemble::{AssembleOptions, Assembler};
use modkit_lib::fragment::BuildConfig;
use modkit_lib::layout::Layout;

use crate::output::{OutputFormat, count_noun, format_duration, print_item, print_json, print_stat, print_success};

/// Arguments of the assemble command.
pub struct AssembleArgs {
  pub build_type: String,
  pub work_dir: Option<PathBuf>,
  pub config: Option<PathBuf>,
  pub skeleton_dir: Option<PathBuf>,
  pub output_dir: Option<PathBuf>,
  pub jobs: usize,
  pub build_command: Option<String>,
  pub output: OutputFormat,
}

/// Execute the assemble command.
///
/// Every failure aborts the run; the returned error wraps an
/// [`modkit_lib::assemble::AssembleError`] carrying the exit code.
pub fn cmd_assemble(args: AssembleArgs) -> Result<()> {
  let start = Instant::now();

  let mut layout = match args.work_dir {
    Some(dir) => Layout::new(dir),
    None => Layout::from_env().context("Failed to determine the work directory")?,
  };
  if let Some(config) = args.config {
    layout = layout.with_config_path(config);
  }
  if let Some(dir) = args.skeleton_dir {
    layout = layout.with_skeleton_dir(dir);
  }
  if let Some(dir) = args.output_dir {
    layout = layout.with_output_dir(dir);
  }

  let mut build = BuildConfig::default();
  if let Some(command) = args.build_command {
    build.command = command;
  }

  let options = AssembleOptions {
    parallelism: args.jobs,
    build,
  };
  let assembler = Assembler::new(layout, options);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt
    .block_on(assembler.assemble_from_config(&args.build_type))
    .with_context(|| format!("Failed to assemble {}.manifest", args.build_type))?;

  if args.output.is_json() {
    print_json(&result)?;
  } else {
    print_success(&format!(
      "Wrote {} ({})",
      result.output.display(),
      count_noun(result.modules.len(), "module")
    ));
    for module in &result.modules {
      print_item(module);
    }
    print_stat("Fetched", &result.fetched.to_string());
    print_stat("Built", &result.built.to_string());
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
